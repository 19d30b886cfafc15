//! Bottom-up decomposition of an expression into domain buckets.

use tracing::trace;

use super::Workflow;
use crate::domain::DomainId;
use crate::engine::Engine;
use crate::tree::{NodeId, Value};

/// Context inherited by the operands of the node being partitioned
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hint {
    /// Domain for operands that do not resolve to one of their own
    pub domain: Option<DomainId>,
    /// Execution frame opened by an enclosing framed operation
    pub frame: Option<String>,
}

impl Hint {
    pub fn domain(domain: DomainId) -> Self {
        Hint {
            domain: Some(domain),
            frame: None,
        }
    }

    pub fn frame(frame: impl Into<String>) -> Self {
        Hint {
            domain: None,
            frame: Some(frame.into()),
        }
    }
}

/// Decompose `root` into a fresh workflow.
///
/// Operands are walked left to right; reads are routed to the domain the
/// oracle assigns them, nested operations are partitioned recursively and
/// merged, and finally `root` is wrapped around its operands. A read at the
/// top level is a single bucket. Nothing is evaluated.
pub fn partition(engine: &mut Engine, root: NodeId, hint: Hint) -> Workflow {
    if engine.arena.is_read(root) {
        let domain = resolve_read(engine, root, &hint);
        return Workflow::single(domain, vec![root]);
    }
    build(engine, root, &hint)
}

fn build(engine: &mut Engine, problem: NodeId, hint: &Hint) -> Workflow {
    let mut workflow: Option<Workflow> = None;
    let operands = engine.arena.operands(problem).to_vec();

    for operand in operands {
        let workload = if engine.arena.is_read(operand) {
            if engine.arena.header(operand).exported {
                continue;
            }
            let domain = resolve_read(engine, operand, hint);
            Workflow::single(domain, vec![operand])
        } else if engine.arena.is_operation(operand) {
            let nested = engine
                .arena
                .operands(operand)
                .iter()
                .any(|&o| engine.arena.is_operation(o));
            if nested {
                let child = child_hint(engine, operand, hint);
                build(engine, operand, &child)
            } else {
                Workflow::single(hint.domain, vec![operand])
            }
        } else {
            continue;
        };

        match workflow.as_mut() {
            Some(existing) => existing.merge(engine, workload),
            None => workflow = Some(workload),
        }
    }

    match workflow {
        Some(mut workflow) => {
            workflow.wrap(engine, problem);
            trace!(
                problem = %engine.arena.render(problem),
                buckets = workflow.len(),
                "partitioned"
            );
            workflow
        }
        None => Workflow::single(hint.domain, vec![problem]),
    }
}

/// Ask the oracle for the owner of a read and stamp it on the node.
/// A speculative owner adopts the enclosing frame.
fn resolve_read(engine: &mut Engine, node: NodeId, hint: &Hint) -> Option<DomainId> {
    let (arena, registry, oracle) = engine.parts();
    let domain = oracle.resolve_domain(arena, registry, node);
    if let (Some(frame), Some(resolved)) = (&hint.frame, domain.and_then(|d| registry.get_mut(d))) {
        if resolved.maybe {
            resolved.frame = Some(frame.clone());
        }
    }
    arena.header_mut(node).domain = domain;
    domain
}

/// Framed operations open a frame named by their first string operand,
/// or by a fresh uid.
fn child_hint(engine: &mut Engine, operation: NodeId, hint: &Hint) -> Hint {
    if engine.arena.tag(operation) != Some(engine.config().engine.framed_tag.as_str()) {
        return hint.clone();
    }
    let named = engine
        .arena
        .operands(operation)
        .first()
        .and_then(|&first| match engine.arena.get(first).literal() {
            Some(Value::String(name)) => Some(name.clone()),
            _ => None,
        });
    let frame = match named {
        Some(name) => name,
        None => format!("frame-{}", engine.next_frame_uid()),
    };
    Hint::frame(frame)
}

impl Workflow {
    /// Partition `node`, discovered while this workflow is being solved,
    /// and merge the result into the buckets still pending.
    pub fn request(&mut self, engine: &mut Engine, node: NodeId, hint: Hint) {
        let nested = partition(engine, node, hint);
        trace!(node = %engine.arena.render(node), buckets = nested.len(), "request");
        self.merge(engine, nested);
    }
}
