//! Bubbling of operations into the bucket of their operands, and export
//! stamping of sub-problems handed to another domain.

use itertools::Itertools;
use tracing::{debug, trace, warn};

use super::{Bucket, Workflow};
use crate::domain::{DomainId, DomainRegistry};
use crate::engine::Engine;
use crate::oracle::DomainOracle;
use crate::tree::{ExprArena, NodeId};

impl Workflow {
    /// Fold `problem` into the bucket that holds its last operation operand.
    ///
    /// When the operands are spread over two incomplete domains those may
    /// be collapsed into one first. If the oracle routes `problem` to a
    /// domain with another name it is appended to that domain's bucket,
    /// otherwise it takes the place of its operand. Returns whether an
    /// operand of `problem` was found.
    pub fn wrap(&mut self, engine: &mut Engine, problem: NodeId) -> bool {
        let (arena, registry, oracle) = engine.parts();
        let operands = arena.operands(problem).to_vec();
        let mut bubbled = false;

        for index in (0..self.buckets.len()).rev() {
            let mut i = 0;
            while i < self.buckets[index].problems.len() {
                let exp = self.buckets[index].problems[i];
                i += 1;
                let Some(j) = operands.iter().position(|&o| o == exp) else {
                    continue;
                };
                if operands[j + 1..].iter().any(|&o| arena.is_operation(o)) {
                    continue;
                }

                // bucket and position standing in for `problem`
                let mut current = index;
                let mut slot = i - 1;
                let mut other = self.buckets[current].domain;

                let previous = operands[..j]
                    .iter()
                    .rev()
                    .copied()
                    .find(|&o| arena.is_operation(o) && !self.buckets[current].contains(o));
                let holder = previous.and_then(|prev| {
                    (0..self.buckets.len())
                        .rev()
                        .filter(|&n| n != current)
                        .find_map(|n| {
                            let pos = self.buckets[n].problems.iter().position(|&p| p == prev)?;
                            Some((n, pos))
                        })
                });

                if let Some((mut n, pos)) = holder {
                    let domain = self.buckets[n].domain;
                    let mut adopt = true;

                    if domain != other
                        && registry.priority(domain) < 0
                        && registry.priority(other) < 0
                        && registry.is_speculative(domain) == registry.is_speculative(other)
                    {
                        let (pd, po) = (registry.priority(domain), registry.priority(other));
                        let keep_current = if pd == po { current < n } else { po < pd };
                        if keep_current {
                            absorb(&mut self.buckets, registry, current, n);
                            self.remove_bucket(n);
                            if n < current {
                                current -= 1;
                            }
                        } else {
                            absorb(&mut self.buckets, registry, n, current);
                            self.remove_bucket(current);
                            if current < n {
                                n -= 1;
                            }
                            current = n;
                            slot = pos;
                            other = domain;
                        }
                        adopt = false;
                    }

                    if adopt
                        && registry.priority(domain) < 0
                        && (registry.priority(domain) > registry.priority(other)
                            || registry.priority(other) > 0)
                    {
                        trace!(from = %registry.label(other), to = %registry.label(domain), "adopting bucket");
                        current = n;
                        slot = pos;
                        other = domain;
                    }
                }

                let opdomain = oracle.resolve_operation_domain(arena, registry, problem, other);
                let rerouted = opdomain.filter(|&d| registry.display_name(Some(d)) != registry.display_name(other));

                if let Some(target) = rerouted {
                    match self.position_of(Some(target), 0) {
                        Some(t) => self.buckets[t].problems.push(problem),
                        None => {
                            self.push_bucket(Bucket::new(Some(target), vec![problem]));
                        }
                    }
                    let strong = registry.is_confirmed(arena.header(exp).domain)
                        || arena
                            .operands(exp)
                            .iter()
                            .any(|&a| registry.is_confirmed(arena.header(a).domain));
                    if !strong {
                        self.buckets[current].problems.remove(slot);
                    }
                    debug!(
                        problem = %arena.render(problem),
                        from = %registry.label(other),
                        to = %registry.label(Some(target)),
                        "rerouted operation"
                    );
                } else if !bubbled {
                    bubbled = true;
                    self.buckets[current].problems[slot] = problem;
                }

                // operands are now covered by `problem`
                let other_speculative = registry.is_speculative(other);
                for bucket in self.buckets.iter_mut() {
                    if bucket.domain == other && !bubbled {
                        continue;
                    }
                    let same_context = (other_speculative && registry.is_speculative(bucket.domain))
                        || registry.display_name(bucket.domain) == registry.display_name(other);
                    if same_context {
                        bucket.problems.retain(|p| !operands.contains(p));
                    }
                }

                set_variables(arena, registry, oracle, problem, opdomain.or(other));
                return true;
            }
        }
        false
    }

    /// Hand the subtree at `node` over to `domain`: composites are stamped
    /// with it, read leaves are exported and detached. Returns the leaves.
    pub fn unwrap(&mut self, engine: &mut Engine, node: NodeId, domain: Option<DomainId>) -> Vec<NodeId> {
        let mut leaves = Vec::new();
        self.unwrap_into(engine, node, domain, &mut leaves);
        leaves
    }

    fn unwrap_into(
        &mut self,
        engine: &mut Engine,
        node: NodeId,
        domain: Option<DomainId>,
        leaves: &mut Vec<NodeId>,
    ) {
        if engine.arena.is_read(node) {
            let (arena, _, oracle) = engine.parts();
            let path = oracle.canonical_path(arena, node);
            arena.header_mut(node).exported = true;
            arena.detach(node);
            trace!(path = %path, "exported");
            self.exports.entry(path).or_default().push(domain);
            leaves.push(node);
        } else if engine.arena.is_operation(node) {
            engine.arena.header_mut(node).domain = domain;
            let operands = engine.arena.operands(node).to_vec();
            for operand in operands {
                self.unwrap_into(engine, operand, domain, leaves);
            }
        }
    }
}

/// Move the exports of `from`'s domain and its problems into bucket `into`,
/// then unregister that domain and forward it to the survivor. The emptied
/// bucket is left for the caller.
fn absorb(buckets: &mut [Bucket], registry: &mut DomainRegistry, into: usize, from: usize) {
    let loser = buckets[from].domain;
    let exports = loser
        .and_then(|d| registry.get_mut(d))
        .map(|d| d.take_exports())
        .unwrap_or_default();
    let problems = std::mem::take(&mut buckets[from].problems);
    debug!(
        into = %registry.label(buckets[into].domain),
        from = %registry.label(loser),
        "collapsing domains"
    );
    buckets[into].problems.extend(exports);
    buckets[into].problems.extend(problems);
    if let Some(id) = loser {
        if registry.remove(id).is_none() {
            warn!(domain = %id, "collapsed domain was not registered");
        }
        if let Some(survivor) = buckets[into].domain {
            registry.forward(id, survivor);
        }
    }
}

/// Recompute the variables `node` depends on from the point of view of
/// `domain` and cache them in its header.
///
/// A read contributes its path unless it is owned by a confirmed domain
/// with a different name. Composites contribute their cached variables,
/// computed on demand.
pub(crate) fn set_variables(
    arena: &mut ExprArena,
    registry: &DomainRegistry,
    oracle: &dyn DomainOracle,
    node: NodeId,
    domain: Option<DomainId>,
) -> Option<Vec<String>> {
    let operands = arena.operands(node).to_vec();
    let variables = collect_variables(arena, registry, oracle, &operands, domain);
    arena.header_mut(node).variables = variables.clone();
    variables
}

/// Variables of a list of sibling nodes, e.g. a bucket's problems
pub(crate) fn collect_variables(
    arena: &mut ExprArena,
    registry: &DomainRegistry,
    oracle: &dyn DomainOracle,
    members: &[NodeId],
    domain: Option<DomainId>,
) -> Option<Vec<String>> {
    let mut variables = Vec::new();
    for &member in members {
        if arena.is_read(member) {
            let owner = arena.header(member).domain;
            if owner.is_none() || registry.is_speculative(owner) || registry.same_name(owner, domain) {
                variables.push(oracle.canonical_path(arena, member));
            }
        } else if arena.is_operation(member) {
            let cached = match arena.header(member).variables.clone() {
                Some(cached) => Some(cached),
                None => set_variables(arena, registry, oracle, member, domain),
            };
            variables.extend(cached.into_iter().flatten());
        }
    }
    if variables.is_empty() {
        None
    } else {
        Some(variables.into_iter().unique().collect())
    }
}
