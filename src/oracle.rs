//! Domain resolution.
//!
//! The scheduler never decides by itself which domain owns a node: it asks a
//! [`DomainOracle`]. Answers must be deterministic for a given tree shape
//! within one optimize pass.

use std::collections::HashMap;

use crate::domain::{DomainId, DomainRegistry};
use crate::tree::{ExprArena, NodeId, NodeKind};

/// External collaborator that tells the scheduler who owns what.
pub trait DomainOracle {
    /// Domain owning a read leaf, or `None` when it is unknown/local.
    ///
    /// The registry is mutable so oracles may register domains lazily.
    fn resolve_domain(
        &self,
        arena: &ExprArena,
        registry: &mut DomainRegistry,
        node: NodeId,
    ) -> Option<DomainId>;

    /// Domain that should evaluate the operation rooted at `subtree`, given
    /// the domain its operands were grouped under.
    fn resolve_operation_domain(
        &self,
        arena: &ExprArena,
        registry: &mut DomainRegistry,
        subtree: NodeId,
        candidate: Option<DomainId>,
    ) -> Option<DomainId>;

    /// Key used for variable dependency comparisons and the export table
    fn canonical_path(&self, arena: &ExprArena, node: NodeId) -> String {
        default_path(arena, node)
    }

    /// Whether a domain can take work right now. Remote domains become
    /// available once their resource is loaded.
    fn is_available(&self, registry: &DomainRegistry, domain: DomainId) -> bool {
        registry.get(domain).is_some_and(|d| !d.awaiting_load())
    }

    /// Top-level operation containing `node` within the domain `node` is
    /// assigned to: climbs while the parent shares that domain.
    fn root_operation(&self, arena: &ExprArena, node: NodeId) -> NodeId {
        let domain = arena.header(node).domain;
        let mut current = node;
        while let Some(parent) = arena.parent(current) {
            if arena.header(parent).domain != domain {
                break;
            }
            current = parent;
        }
        current
    }
}

/// `scope[property]` for scoped reads, `property` otherwise; other nodes
/// use their rendering.
pub fn default_path(arena: &ExprArena, node: NodeId) -> String {
    match &arena.get(node).kind {
        NodeKind::Read {
            scope: Some(scope),
            property,
        } => format!("{}[{}]", scope, property),
        NodeKind::Read {
            scope: None,
            property,
        } => property.clone(),
        _ => arena.render(node),
    }
}

/// Table-driven oracle: variables are looked up by canonical path,
/// operations by tag.
#[derive(Debug, Clone, Default)]
pub struct StaticOracle {
    variables: HashMap<String, DomainId>,
    operations: HashMap<String, DomainId>,
    fallback: Option<DomainId>,
}

impl StaticOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route reads of `path` to `domain`
    pub fn with_variable(mut self, path: impl Into<String>, domain: DomainId) -> Self {
        self.variables.insert(path.into(), domain);
        self
    }

    /// Route operations tagged `tag` to `domain`
    pub fn with_operation(mut self, tag: impl Into<String>, domain: DomainId) -> Self {
        self.operations.insert(tag.into(), domain);
        self
    }

    /// Domain for reads that have no entry
    pub fn with_fallback(mut self, domain: DomainId) -> Self {
        self.fallback = Some(domain);
        self
    }
}

impl DomainOracle for StaticOracle {
    fn resolve_domain(
        &self,
        arena: &ExprArena,
        registry: &mut DomainRegistry,
        node: NodeId,
    ) -> Option<DomainId> {
        let path = self.canonical_path(arena, node);
        self.variables
            .get(&path)
            .copied()
            .or(self.fallback)
            .filter(|&d| registry.contains(d))
    }

    fn resolve_operation_domain(
        &self,
        arena: &ExprArena,
        registry: &mut DomainRegistry,
        subtree: NodeId,
        candidate: Option<DomainId>,
    ) -> Option<DomainId> {
        arena
            .tag(subtree)
            .and_then(|tag| self.operations.get(tag))
            .copied()
            .filter(|&d| registry.contains(d))
            .or(candidate)
    }
}
