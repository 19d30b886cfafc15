//! Back-substitution of resolved values into waiting buckets.

use tracing::{debug, trace};

use super::{Bucket, Workflow};
use crate::engine::Engine;
use crate::tree::{ExprArena, NodeId, Value};

impl Workflow {
    /// Feed the value produced for `operation` back into the workflow.
    ///
    /// If the operation consuming it is assigned to a domain, that domain's
    /// root operation is (re)scheduled in a pending bucket so the domain
    /// picks the new value up. Otherwise the leaf is replaced by a literal
    /// in every bucket holding one of its ancestors. Returns whether
    /// anything changed.
    pub fn provide(&mut self, engine: &mut Engine, operation: NodeId, value: Value) -> bool {
        let Some(link) = engine.arena.origin(operation) else {
            trace!(node = %operation, "provided value has no consumer");
            return false;
        };
        let parent = link.parent;

        if let Some(domain) = engine.arena.header(parent).domain {
            let root = engine.oracle.root_operation(&engine.arena, parent);
            let index = match self.position_of(Some(domain), self.evaluated) {
                Some(index) => index,
                None => self.push_bucket(Bucket::new(Some(domain), Vec::new())),
            };
            if self.buckets[index].contains(root) {
                return false;
            }
            debug!(
                root = %engine.arena.render(root),
                domain = %engine.registry.label(Some(domain)),
                "rescheduled root operation"
            );
            self.buckets[index].problems.push(root);
            return true;
        }

        let chain: Vec<NodeId> = std::iter::once(operation)
            .chain(engine.arena.ancestors(parent))
            .collect();
        let mut changed = false;
        for bucket in self.buckets.iter_mut() {
            for &ancestor in &chain {
                if let Some(slot) = bucket.problems.iter().position(|&p| p == ancestor) {
                    changed |= substitute(&mut engine.arena, bucket, slot, operation, &value);
                }
            }
        }
        changed
    }
}

/// Replace `operation` inside the bucket member at `slot` with a literal
/// carrying `value`. A member that is the operation itself is replaced in
/// the bucket.
fn substitute(
    arena: &mut ExprArena,
    bucket: &mut Bucket,
    slot: usize,
    operation: NodeId,
    value: &Value,
) -> bool {
    let member = bucket.problems[slot];
    if member == operation {
        bucket.problems[slot] = arena.literal(value.clone());
        return true;
    }
    let Some(link) = arena.origin(operation) else {
        return false;
    };
    if arena.operands(link.parent).get(link.index) != Some(&operation)
        || !arena.contains(member, link.parent)
    {
        return false;
    }
    let literal = arena.literal(value.clone());
    arena.replace_operand(link.parent, link.index, literal);
    trace!(node = %operation, value = %value, "substituted");
    true
}
