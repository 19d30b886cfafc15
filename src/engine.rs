//! Engine: owner of the expression arena, the domain registry, the oracle
//! and the queue of deferred work.
//!
//! Everything the scheduler mutates is threaded explicitly through
//! `&mut Engine`; there is no global state.

use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::domain::{DomainId, DomainRegistry};
use crate::error::WorkflowError;
use crate::oracle::DomainOracle;
use crate::tree::{ExprArena, NodeId};
use crate::workflow::{partition, Hint, Solution, Solver, Workflow};

/// Progress of a deferred workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredStatus {
    /// Queued, never attempted
    Pending,
    /// Evaluated after its blocking domain became available
    Resolved,
    /// `resume` found the blocking domain still unavailable
    Unresolved { attempts: u32 },
}

/// Work split off a workflow because it depends on a domain that is not
/// available yet.
#[derive(Debug, Clone)]
pub struct Deferred {
    pub workflow: Workflow,
    pub blocked_on: DomainId,
    pub status: DeferredStatus,
}

pub struct Engine {
    pub(crate) arena: ExprArena,
    pub(crate) registry: DomainRegistry,
    pub(crate) oracle: Box<dyn DomainOracle>,
    config: EngineConfig,
    deferred: Vec<Deferred>,
    frame_uid: u32,
}

impl Engine {
    pub fn new(oracle: impl DomainOracle + 'static, config: EngineConfig) -> Self {
        Self::with_registry(DomainRegistry::new(), oracle, config)
    }

    /// Engine over domains registered ahead of time
    pub fn with_registry(
        registry: DomainRegistry,
        oracle: impl DomainOracle + 'static,
        config: EngineConfig,
    ) -> Self {
        Engine {
            arena: ExprArena::new(),
            registry,
            oracle: Box::new(oracle),
            config,
            deferred: Vec::new(),
            frame_uid: 0,
        }
    }

    /// Replace the arena, e.g. with a tree built before the engine
    pub fn with_arena(mut self, arena: ExprArena) -> Self {
        self.arena = arena;
        self
    }

    pub fn arena(&self) -> &ExprArena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut ExprArena {
        &mut self.arena
    }

    pub fn registry(&self) -> &DomainRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut DomainRegistry {
        &mut self.registry
    }

    pub fn oracle(&self) -> &dyn DomainOracle {
        self.oracle.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Split borrow used by the scheduling passes
    pub(crate) fn parts(&mut self) -> (&mut ExprArena, &mut DomainRegistry, &dyn DomainOracle) {
        (&mut self.arena, &mut self.registry, self.oracle.as_ref())
    }

    /// Fresh id for frames opened without an explicit name
    pub(crate) fn next_frame_uid(&mut self) -> u32 {
        self.frame_uid += 1;
        self.frame_uid
    }

    /// Decompose `root` into a workflow. Nothing is evaluated.
    pub fn partition(&mut self, root: NodeId, hint: Hint) -> Workflow {
        partition(self, root, hint)
    }

    /// Run the evaluator loop over `workflow`
    pub fn evaluate(
        &mut self,
        workflow: &mut Workflow,
        solver: &mut dyn Solver,
    ) -> Result<Option<Solution>, WorkflowError> {
        workflow.each(self, solver)
    }

    /// Partition and evaluate a top-level expression
    pub fn submit(
        &mut self,
        root: NodeId,
        hint: Hint,
        solver: &mut dyn Solver,
    ) -> Result<Option<Solution>, WorkflowError> {
        let mut workflow = self.partition(root, hint);
        self.evaluate(&mut workflow, solver)
    }

    /// Queue the leaves exported towards `blocked_on` as a new workflow
    pub(crate) fn resubmit(&mut self, leaves: Vec<NodeId>, blocked_on: DomainId) {
        let mut workflow = Workflow::new();
        for leaf in leaves {
            let part = partition(self, leaf, Hint::default());
            workflow.merge(self, part);
        }
        debug!(
            domain = %self.registry.label(Some(blocked_on)),
            buckets = workflow.len(),
            "queued deferred workflow"
        );
        self.deferred.push(Deferred {
            workflow,
            blocked_on,
            status: DeferredStatus::Pending,
        });
    }

    /// Evaluate deferred workflows whose blocking domain is now available.
    ///
    /// Workflows still blocked are marked [`DeferredStatus::Unresolved`].
    /// Returns the solutions produced by this call.
    pub fn resume(&mut self, solver: &mut dyn Solver) -> Result<Vec<Solution>, WorkflowError> {
        let mut queue = std::mem::take(&mut self.deferred);
        let mut solved = Vec::new();
        let mut failure = None;

        for entry in queue.iter_mut() {
            if entry.status == DeferredStatus::Resolved {
                continue;
            }
            if !self.oracle.is_available(&self.registry, entry.blocked_on) {
                let attempts = match entry.status {
                    DeferredStatus::Unresolved { attempts } => attempts + 1,
                    _ => 1,
                };
                warn!(
                    domain = %self.registry.label(Some(entry.blocked_on)),
                    attempts,
                    "deferred workflow still blocked"
                );
                entry.status = DeferredStatus::Unresolved { attempts };
                continue;
            }
            match entry.workflow.each(self, solver) {
                Ok(solution) => {
                    entry.status = DeferredStatus::Resolved;
                    solved.extend(solution);
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        // work deferred while resuming goes behind the existing queue
        queue.append(&mut self.deferred);
        self.deferred = queue;

        match failure {
            Some(e) => Err(e),
            None => Ok(solved),
        }
    }

    pub fn deferred(&self) -> &[Deferred] {
        &self.deferred
    }

    /// Deferred workflows that `resume` could not run
    pub fn unresolved(&self) -> impl Iterator<Item = &Deferred> {
        self.deferred
            .iter()
            .filter(|d| matches!(d.status, DeferredStatus::Unresolved { .. }))
    }

    /// Drop deferred workflows that have been resolved
    pub fn clear_resolved(&mut self) {
        self.deferred
            .retain(|d| d.status != DeferredStatus::Resolved);
    }
}
