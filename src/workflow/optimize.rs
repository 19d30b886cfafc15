//! Reshaping of the pending buckets before evaluation.
//!
//! `optimize` runs `compact`, then `connect` (followed by another `compact`
//! if buckets were folded), then `defer`. Only buckets past the cursor are
//! touched.

use tracing::debug;

use super::wrap::collect_variables;
use super::Workflow;
use crate::domain::DomainId;
use crate::engine::Engine;

/// Variable shared by two buckets of the same domain name bound to
/// different frames. Such buckets are not folded together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossFrameLink {
    pub variable: String,
    pub earlier: DomainId,
    pub later: DomainId,
}

impl Workflow {
    pub fn optimize(&mut self, engine: &mut Engine) {
        self.compact(engine);
        if self.connect(engine) {
            self.compact(engine);
        }
        if self.defer(engine) > 0 {
            self.compact(engine);
        }
    }

    /// Drop empty pending buckets and stamp every pending problem with the
    /// domain of its bucket. Buckets and read leaves still naming a
    /// collapsed domain are moved to its survivor first.
    pub fn compact(&mut self, engine: &mut Engine) {
        self.forward_collapsed(&engine.registry);
        let mut i = self.buckets.len();
        while i > self.evaluated {
            i -= 1;
            if self.buckets[i].is_empty() {
                self.remove_bucket(i);
                continue;
            }
            let domain = self.buckets[i].domain;
            for &problem in &self.buckets[i].problems {
                for leaf in engine.arena.leaves(problem) {
                    let stale = engine.arena.header(leaf).domain;
                    if let Some(id) = stale {
                        engine.arena.header_mut(leaf).domain = Some(engine.registry.resolve(id));
                    }
                }
                engine.arena.header_mut(problem).domain = domain;
            }
        }
    }

    /// Fold later buckets into earlier ones of the same domain name and
    /// frame when they share a variable. Returns whether anything was folded.
    pub fn connect(&mut self, engine: &mut Engine) -> bool {
        let (arena, registry, oracle) = engine.parts();
        let mut connected = false;

        let mut i = self.buckets.len();
        while i > self.evaluated {
            i -= 1;
            let domain = self.buckets[i].domain;
            let mut variables =
                collect_variables(arena, registry, oracle, &self.buckets[i].problems, domain);
            self.buckets[i].variables = variables.clone();

            let mut j = self.buckets.len();
            while j > i + 1 {
                j -= 1;
                let Some(vars) = variables.as_ref() else {
                    break;
                };
                let later = self.buckets[j].domain;
                let (Some(d), Some(o)) = (domain, later) else {
                    continue;
                };
                if !registry.same_name(domain, later) {
                    continue;
                }
                let Some(shared) = self.buckets[j]
                    .variables()
                    .and_then(|theirs| theirs.iter().find(|v| vars.contains(v)))
                    .cloned()
                else {
                    continue;
                };

                if registry[d].frame == registry[o].frame {
                    let absorbed = self.remove_bucket(j);
                    debug!(
                        variable = %shared,
                        into = i,
                        domain = %registry.label(domain),
                        "connected buckets"
                    );
                    self.buckets[i].problems.extend(absorbed.problems);
                    variables =
                        collect_variables(arena, registry, oracle, &self.buckets[i].problems, domain);
                    self.buckets[i].variables = variables.clone();
                    connected = true;
                } else {
                    debug!(
                        variable = %shared,
                        earlier = %registry.label(domain),
                        later = %registry.label(later),
                        "variable shared across frames"
                    );
                    let link = CrossFrameLink {
                        variable: shared,
                        earlier: d,
                        later: o,
                    };
                    if !self.cross_frame.contains(&link) {
                        self.cross_frame.push(link);
                    }
                }
            }
        }
        connected
    }

    /// Split off pending problems that feed an operation waiting in the
    /// bucket of an unavailable remote domain. Each one is exported towards
    /// that domain and queued on the engine as a deferred workflow.
    /// Returns the number of problems deferred.
    pub fn defer(&mut self, engine: &mut Engine) -> usize {
        let mut deferred = 0;

        let mut i = self.buckets.len();
        while i > self.evaluated {
            i -= 1;
            for j in i + 1..self.buckets.len() {
                let Some(blocker) = self.buckets[j].domain else {
                    continue;
                };
                let remote = engine.registry.get(blocker).is_some_and(|d| d.is_remote());
                if !remote || engine.oracle.is_available(&engine.registry, blocker) {
                    continue;
                }

                let mut p = self.buckets[i].problems.len();
                while p > 0 {
                    p -= 1;
                    let problem = self.buckets[i].problems[p];
                    let blocked = engine
                        .arena
                        .ancestors(problem)
                        .any(|a| self.buckets[j].contains(a));
                    if !blocked {
                        continue;
                    }
                    self.buckets[i].problems.remove(p);
                    let leaves = self.unwrap(engine, problem, Some(blocker));
                    debug!(
                        problem = %engine.arena.render(problem),
                        domain = %engine.registry.label(Some(blocker)),
                        leaves = leaves.len(),
                        "deferred"
                    );
                    engine.resubmit(leaves, blocker);
                    deferred += 1;
                }
            }
        }
        deferred
    }
}
