//! Priority-preserving union of two workflows.

use std::cmp::Ordering;

use tracing::{debug, trace};

use super::{Bucket, Workflow};
use crate::domain::DomainRegistry;
use crate::engine::Engine;
use crate::tree::NodeId;

impl Workflow {
    /// Merge every bucket of `other` into the buckets not evaluated yet,
    /// keeping them ordered by domain rank.
    pub fn merge(&mut self, engine: &Engine, other: Workflow) {
        self.forward_collapsed(&engine.registry);
        for (path, domains) in other.exports {
            self.exports.entry(path).or_default().extend(domains);
        }
        for mut bucket in other.buckets {
            bucket.domain = bucket.domain.map(|id| engine.registry.resolve(id));
            self.merge_bucket(engine, bucket);
        }
    }

    /// Point pending buckets of collapsed domains at their survivor. A
    /// bucket whose survivor already has a pending bucket is appended to it.
    /// Returns whether any bucket changed.
    pub(crate) fn forward_collapsed(&mut self, registry: &DomainRegistry) -> bool {
        let mut changed = false;
        let mut i = self.evaluated;
        while i < self.buckets.len() {
            let Some(id) = self.buckets[i].domain else {
                i += 1;
                continue;
            };
            let survivor = registry.resolve(id);
            if survivor == id {
                i += 1;
                continue;
            }
            changed = true;
            debug!(
                from = %id,
                into = %registry.label(Some(survivor)),
                "forwarding collapsed domain"
            );
            self.buckets[i].domain = Some(survivor);

            let target = (self.evaluated..self.buckets.len())
                .find(|&t| t != i && self.buckets[t].domain == Some(survivor));
            let Some(target) = target else {
                i += 1;
                continue;
            };
            let moved = self.remove_bucket(i);
            let target = if target > i { target - 1 } else { target };
            for problem in moved.problems {
                if !self.buckets[target].contains(problem) {
                    self.buckets[target].problems.push(problem);
                }
            }
        }
        changed
    }

    /// A pending bucket with the same domain absorbs the incoming problems.
    /// Otherwise the bucket is inserted before the first pending bucket that
    /// ranks after it within a compatible frame, or appended.
    fn merge_bucket(&mut self, engine: &Engine, incoming: Bucket) {
        let from = self.evaluated;

        if let Some(position) = self.position_of(incoming.domain, from) {
            for problem in incoming.problems {
                if self.buckets[position].contains(problem) {
                    continue;
                }
                if engine.arena.header(problem).exported
                    && self.buckets[position]
                        .problems
                        .iter()
                        .any(|&existing| same_export(engine, existing, problem))
                {
                    trace!(problem = %problem, "skipping duplicate export");
                    continue;
                }
                self.buckets[position].problems.push(problem);
            }
            return;
        }

        let registry = &engine.registry;
        let insert_at = incoming
            .domain
            .and_then(|id| registry.get(id))
            .and_then(|domain| {
                (from..self.buckets.len()).find(|&p| {
                    self.buckets[p]
                        .domain
                        .and_then(|id| registry.get(id))
                        .is_some_and(|existing| {
                            existing.rank_cmp(domain) == Ordering::Greater
                                && existing.frame_compatible(domain)
                        })
                })
            });

        match insert_at {
            Some(position) => self.insert_bucket(position, incoming),
            None => {
                self.push_bucket(incoming);
            }
        }
    }
}

/// Two exported leaves for the same path feeding operations in the same domain
fn same_export(engine: &Engine, existing: NodeId, incoming: NodeId) -> bool {
    let arena = &engine.arena;
    if !arena.header(existing).exported {
        return false;
    }
    let consumer = |node: NodeId| arena.origin(node).map(|l| arena.header(l.parent).domain);
    engine.oracle.canonical_path(arena, existing) == engine.oracle.canonical_path(arena, incoming)
        && consumer(existing) == consumer(incoming)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::domain::{Domain, DomainId, DomainRegistry};
    use crate::oracle::StaticOracle;

    fn setup() -> (Engine, DomainId, DomainId, DomainId) {
        let mut registry = DomainRegistry::new();
        let low = registry.register(Domain::new("low", -1));
        let mid = registry.register(Domain::new("mid", 0));
        let high = registry.register(Domain::new("high", 2));
        let engine = Engine::with_registry(registry, StaticOracle::new(), EngineConfig::default());
        (engine, low, mid, high)
    }

    fn reads(engine: &mut Engine, n: usize) -> Vec<NodeId> {
        (0..n)
            .map(|i| engine.arena_mut().read(format!("v{}", i)))
            .collect()
    }

    #[test]
    fn test_merge_same_domain_absorbs() {
        let (mut engine, _, mid, _) = setup();
        let n = reads(&mut engine, 2);
        let mut wf = Workflow::single(Some(mid), vec![n[0]]);
        wf.merge(&engine, Workflow::single(Some(mid), vec![n[1]]));
        assert_eq!(wf.snapshot(), vec![(Some(mid), vec![n[0], n[1]])]);
    }

    #[test]
    fn test_merge_inserts_by_rank() {
        let (mut engine, low, mid, high) = setup();
        let n = reads(&mut engine, 3);
        let mut wf = Workflow::single(Some(high), vec![n[0]]);
        wf.merge(&engine, Workflow::single(Some(low), vec![n[1]]));
        wf.merge(&engine, Workflow::single(Some(mid), vec![n[2]]));
        assert_eq!(
            wf.domains().collect::<Vec<_>>(),
            vec![Some(low), Some(mid), Some(high)]
        );
    }

    #[test]
    fn test_merge_speculative_after_confirmed_of_same_priority() {
        let (mut engine, _, mid, _) = setup();
        let maybe = engine.registry_mut().register(Domain::new("maybe", 0).speculative());
        let n = reads(&mut engine, 2);
        let mut wf = Workflow::single(Some(maybe), vec![n[0]]);
        wf.merge(&engine, Workflow::single(Some(mid), vec![n[1]]));
        assert_eq!(wf.domains().collect::<Vec<_>>(), vec![Some(mid), Some(maybe)]);
    }

    #[test]
    fn test_merge_respects_frames() {
        let (mut engine, low, _, _) = setup();
        let framed = engine
            .registry_mut()
            .register(Domain::new("framed", 3).with_frame("popup"));
        let n = reads(&mut engine, 2);
        let mut wf = Workflow::single(Some(framed), vec![n[0]]);
        wf.merge(&engine, Workflow::single(Some(low), vec![n[1]]));
        assert_eq!(
            wf.domains().collect::<Vec<_>>(),
            vec![Some(framed), Some(low)],
            "a bucket bound to another frame is not a valid anchor"
        );
    }

    #[test]
    fn test_local_buckets_merge_only_with_local() {
        let (mut engine, low, _, _) = setup();
        let n = reads(&mut engine, 3);
        let mut wf = Workflow::single(None, vec![n[0]]);
        wf.merge(&engine, Workflow::single(Some(low), vec![n[1]]));
        wf.merge(&engine, Workflow::single(None, vec![n[2]]));
        assert_eq!(
            wf.snapshot(),
            vec![(None, vec![n[0], n[2]]), (Some(low), vec![n[1]])]
        );
    }

    #[test]
    fn test_merge_never_touches_evaluated_buckets() {
        let (mut engine, low, mid, _) = setup();
        let n = reads(&mut engine, 3);
        let mut wf = Workflow::from_buckets(vec![
            Bucket::new(Some(mid), vec![n[0]]),
            Bucket::new(Some(mid), vec![n[1]]),
        ]);
        wf.evaluated = 1;
        wf.merge(&engine, Workflow::single(Some(low), vec![n[2]]));
        assert_eq!(wf.domains().collect::<Vec<_>>(), vec![Some(mid), Some(low), Some(mid)]);

        let m = reads(&mut engine, 1);
        wf.merge(&engine, Workflow::single(Some(mid), vec![m[0]]));
        assert_eq!(wf.buckets()[2].problems, vec![n[1], m[0]]);
    }

    #[test]
    fn test_merge_skips_duplicate_exports() {
        let (mut engine, low, mid, _) = setup();
        let arena = engine.arena_mut();
        let x1 = arena.read("x");
        let x2 = arena.read("x");
        let f = arena.composite("f", [x1]);
        let g = arena.composite("g", [x2]);
        arena.header_mut(f).domain = Some(mid);
        arena.header_mut(g).domain = Some(mid);
        for x in [x1, x2] {
            arena.header_mut(x).exported = true;
            arena.detach(x);
        }

        let mut wf = Workflow::single(Some(low), vec![x1]);
        wf.merge(&engine, Workflow::single(Some(low), vec![x2]));
        assert_eq!(wf.buckets()[0].problems, vec![x1]);
    }

    #[test]
    fn test_merge_forwards_collapsed_domains() {
        let (mut engine, low, mid, _) = setup();
        let n = reads(&mut engine, 3);
        let mut wf = Workflow::from_buckets(vec![
            Bucket::new(Some(low), vec![n[0]]),
            Bucket::new(Some(mid), vec![n[1]]),
        ]);
        engine.registry_mut().remove(low);
        engine.registry_mut().forward(low, mid);

        wf.merge(&engine, Workflow::single(Some(low), vec![n[2]]));
        assert_eq!(wf.snapshot(), vec![(Some(mid), vec![n[1], n[0], n[2]])]);
    }

    #[test]
    fn test_merge_unions_exports() {
        let (engine, low, mid, _) = setup();
        let mut wf = Workflow::new();
        wf.exports.insert("x".to_string(), vec![Some(low)]);
        let mut other = Workflow::new();
        other.exports.insert("x".to_string(), vec![Some(mid)]);
        wf.merge(&engine, other);
        assert_eq!(wf.exports()["x"], vec![Some(low), Some(mid)]);
    }
}
