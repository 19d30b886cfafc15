//! Decomposition, scheduling and recomposition of expression trees.
//!
//! A [`Workflow`] is the scheduling state of one expression: an ordered list
//! of buckets, each holding the sub-problems assigned to one domain, plus a
//! cursor over the buckets already evaluated and the solution accumulated so
//! far.
//!
//! # Pipeline
//!
//! ```text
//! tree -> partition -> wrap/merge -> optimize (compact, connect, defer) -> each -> Solution
//!                                                                         |
//!                                          provide (back-substitution) <--+
//! ```
//!
//! - [`partition`]: bottom-up grouping of operands by owning domain
//! - [`wrap`](Workflow::wrap): bubbling of a parent into its children's bucket
//! - [`merge`](Workflow::merge): priority-preserving union of two workflows
//! - [`optimize`](Workflow::optimize): drop empty buckets, connect buckets
//!   sharing variables, defer work blocked by unloaded remote domains
//! - [`each`](Workflow::each): evaluator loop driving a [`Solver`]
//! - [`provide`](Workflow::provide): splice a resolved value back into the
//!   buckets still waiting for it

pub mod evaluate;
pub mod merge;
pub mod optimize;
pub mod partition;
pub mod provide;
pub mod wrap;

use std::collections::{BTreeMap, HashMap};

use itertools::Itertools;

use crate::domain::{DomainId, DomainRegistry};
use crate::tree::{ExprArena, NodeId, Value};

pub use evaluate::{SolveOutput, Solver, Step};
pub use optimize::CrossFrameLink;
pub use partition::{partition, Hint};

/// Ordered group of sub-problems assigned to one domain.
/// A `None` domain is the local (unresolved) context.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub domain: Option<DomainId>,
    pub problems: Vec<NodeId>,
    variables: Option<Vec<String>>,
}

impl Bucket {
    pub fn new(domain: Option<DomainId>, problems: Vec<NodeId>) -> Self {
        Bucket {
            domain,
            problems,
            variables: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.problems.contains(&node)
    }

    /// Variables computed by the last `connect` pass
    pub fn variables(&self) -> Option<&[String]> {
        self.variables.as_deref()
    }
}

/// Combined result of a workflow
#[derive(Debug, Clone, PartialEq)]
pub enum Solution {
    /// Key/value results folded from every bucket, last write wins
    Bindings(BTreeMap<String, Value>),
    /// Raw result of the last bucket when no bucket produced bindings
    Value(Value),
}

impl Solution {
    pub fn bindings(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Solution::Bindings(map) => Some(map),
            Solution::Value(_) => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.bindings().and_then(|map| map.get(key))
    }
}

/// Scheduling state for one expression.
#[derive(Debug, Clone, Default)]
pub struct Workflow {
    buckets: Vec<Bucket>,
    /// Number of buckets already evaluated; the cursor sits at `evaluated - 1`
    evaluated: usize,
    solution: Option<Solution>,
    solutions: Vec<Option<SolveOutput>>,
    exports: HashMap<String, Vec<Option<DomainId>>>,
    cross_frame: Vec<CrossFrameLink>,
}

impl Workflow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Workflow with a single bucket
    pub fn single(domain: Option<DomainId>, problems: Vec<NodeId>) -> Self {
        Self::from_buckets(vec![Bucket::new(domain, problems)])
    }

    pub fn from_buckets(buckets: Vec<Bucket>) -> Self {
        Workflow {
            buckets,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn bucket(&self, index: usize) -> Option<&Bucket> {
        self.buckets.get(index)
    }

    /// Domains in bucket order
    pub fn domains(&self) -> impl Iterator<Item = Option<DomainId>> + '_ {
        self.buckets.iter().map(|b| b.domain)
    }

    /// Index of the last evaluated bucket, `None` before the first step
    pub fn cursor(&self) -> Option<usize> {
        self.evaluated.checked_sub(1)
    }

    /// Buckets not evaluated yet
    pub fn pending(&self) -> &[Bucket] {
        &self.buckets[self.evaluated.min(self.buckets.len())..]
    }

    pub fn is_finished(&self) -> bool {
        self.evaluated >= self.buckets.len()
    }

    pub fn solution(&self) -> Option<&Solution> {
        self.solution.as_ref()
    }

    /// Raw solver output per evaluated bucket
    pub fn solutions(&self) -> &[Option<SolveOutput>] {
        &self.solutions
    }

    /// Export table: canonical path -> domains that exported it
    pub fn exports(&self) -> &HashMap<String, Vec<Option<DomainId>>> {
        &self.exports
    }

    /// Shared variables seen across frames by `connect`
    pub fn cross_frame_links(&self) -> &[CrossFrameLink] {
        &self.cross_frame
    }

    /// Copy of the (domain, problems) pairs
    pub fn snapshot(&self) -> Vec<(Option<DomainId>, Vec<NodeId>)> {
        self.buckets
            .iter()
            .map(|b| (b.domain, b.problems.clone()))
            .collect()
    }

    /// Bucket holding `node`, if any
    pub fn bucket_of(&self, node: NodeId) -> Option<usize> {
        self.buckets.iter().position(|b| b.contains(node))
    }

    /// Leaves reachable from the buckets in schedule order, each counted once
    pub fn leaf_sequence(&self, arena: &ExprArena) -> Vec<NodeId> {
        self.buckets
            .iter()
            .flat_map(|b| b.problems.iter())
            .flat_map(|&p| arena.leaves(p))
            .unique()
            .collect()
    }

    /// One line per bucket, e.g. `0 solver: (get x) (+ (get y) 1)`
    pub fn describe(&self, arena: &ExprArena, registry: &DomainRegistry) -> String {
        self.buckets
            .iter()
            .enumerate()
            .map(|(i, b)| {
                let marker = if i < self.evaluated { "*" } else { " " };
                format!(
                    "{}{} {}: {}",
                    marker,
                    i,
                    registry.label(b.domain),
                    b.problems.iter().map(|&p| arena.render(p)).join(" ")
                )
            })
            .join("\n")
    }

    /// First bucket at or after `from` whose domain is `domain`
    pub(crate) fn position_of(&self, domain: Option<DomainId>, from: usize) -> Option<usize> {
        self.buckets
            .iter()
            .skip(from)
            .position(|b| b.domain == domain)
            .map(|p| p + from)
    }

    /// Remove a bucket, keeping the cursor on the same evaluated bucket
    pub(crate) fn remove_bucket(&mut self, index: usize) -> Bucket {
        if index < self.evaluated {
            self.evaluated -= 1;
        }
        self.buckets.remove(index)
    }

    pub(crate) fn push_bucket(&mut self, bucket: Bucket) -> usize {
        self.buckets.push(bucket);
        self.buckets.len() - 1
    }

    pub(crate) fn insert_bucket(&mut self, index: usize, bucket: Bucket) {
        debug_assert!(index >= self.evaluated, "cannot insert before the cursor");
        self.buckets.insert(index, bucket);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Domain;

    fn ids(n: u32) -> Vec<NodeId> {
        (0..n).map(NodeId).collect()
    }

    #[test]
    fn test_new_workflow_has_no_cursor() {
        let wf = Workflow::new();
        assert_eq!(wf.cursor(), None);
        assert!(wf.is_finished());
        assert!(wf.pending().is_empty());
    }

    #[test]
    fn test_remove_bucket_below_cursor_shifts_cursor() {
        let n = ids(3);
        let mut wf = Workflow::from_buckets(vec![
            Bucket::new(None, vec![n[0]]),
            Bucket::new(None, vec![n[1]]),
            Bucket::new(None, vec![n[2]]),
        ]);
        wf.evaluated = 2;
        assert_eq!(wf.cursor(), Some(1));

        wf.remove_bucket(0);
        assert_eq!(wf.cursor(), Some(0));
        assert_eq!(wf.pending().len(), 1);

        wf.remove_bucket(1);
        assert_eq!(wf.cursor(), Some(0), "removing past the cursor leaves it");
    }

    #[test]
    fn test_position_of_skips_evaluated() {
        let n = ids(3);
        let mut registry = DomainRegistry::new();
        let a = registry.register(Domain::new("a", 0));
        let wf = Workflow::from_buckets(vec![
            Bucket::new(Some(a), vec![n[0]]),
            Bucket::new(None, vec![n[1]]),
            Bucket::new(Some(a), vec![n[2]]),
        ]);
        assert_eq!(wf.position_of(Some(a), 0), Some(0));
        assert_eq!(wf.position_of(Some(a), 1), Some(2));
        assert_eq!(wf.position_of(None, 2), None);
        assert_eq!(wf.bucket_of(n[1]), Some(1));
    }

    #[test]
    fn test_solution_accessors() {
        let mut map = BTreeMap::new();
        map.insert("x".to_string(), Value::Long(1));
        let solution = Solution::Bindings(map);
        assert_eq!(solution.get("x"), Some(&Value::Long(1)));
        assert_eq!(Solution::Value(Value::Nil).get("x"), None);
    }
}
