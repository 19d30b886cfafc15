use std::collections::HashMap;
use std::ops::Index;

use itertools::Itertools;

use super::node::{Node, NodeHeader, NodeId, NodeKind, Operands, Value};

/// Position of a node among its parent's operands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub parent: NodeId,
    pub index: usize,
}

/// Arena of expression nodes addressed by stable [`NodeId`]s.
///
/// Parent links are kept in a table next to the nodes instead of inside
/// them, so replacing a node is an indexed overwrite of its parent's operand
/// slot. For every attached node `operands(parent)[index] == node`.
///
/// Exported read leaves are detached from their parent during scheduling;
/// the link they had is kept as their *origin* so a value produced for them
/// can still be spliced into the operation that referenced them.
#[derive(Debug, Clone, Default)]
pub struct ExprArena {
    nodes: Vec<Node>,
    links: Vec<Option<Link>>,
    origins: HashMap<NodeId, Link>,
}

impl ExprArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(kind));
        self.links.push(None);
        id
    }

    /// Allocate a literal node
    pub fn literal(&mut self, value: impl Into<Value>) -> NodeId {
        self.alloc(NodeKind::Literal(value.into()))
    }

    /// Allocate an unscoped read node
    pub fn read(&mut self, property: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Read {
            scope: None,
            property: property.into(),
        })
    }

    /// Allocate a read node scoped to `scope`
    pub fn scoped_read(&mut self, scope: impl Into<String>, property: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Read {
            scope: Some(scope.into()),
            property: property.into(),
        })
    }

    /// Allocate a composite node and attach `operands` to it.
    ///
    /// # Panics
    ///
    /// Panics if an operand is already attached to another node.
    pub fn composite(
        &mut self,
        tag: impl Into<String>,
        operands: impl IntoIterator<Item = NodeId>,
    ) -> NodeId {
        let operands: Operands = operands.into_iter().collect();
        let id = self.alloc(NodeKind::Composite {
            tag: tag.into(),
            operands: operands.clone(),
        });
        for (index, operand) in operands.into_iter().enumerate() {
            self.attach(operand, Link { parent: id, index });
        }
        id
    }

    fn attach(&mut self, node: NodeId, link: Link) {
        let slot = &mut self.links[node.index()];
        assert!(
            slot.is_none(),
            "node {} is already attached to {}",
            node,
            slot.map(|l| l.parent.to_string()).unwrap_or_default()
        );
        *slot = Some(link);
    }

    /// # Panics
    ///
    /// Panics if `id` does not belong to this arena.
    #[inline]
    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    #[inline]
    pub fn header(&self, id: NodeId) -> &NodeHeader {
        &self.get(id).header
    }

    #[inline]
    pub fn header_mut(&mut self, id: NodeId) -> &mut NodeHeader {
        &mut self.get_mut(id).header
    }

    #[inline]
    pub fn operands(&self, id: NodeId) -> &[NodeId] {
        self.get(id).operands()
    }

    #[inline]
    pub fn is_operation(&self, id: NodeId) -> bool {
        self.get(id).is_operation()
    }

    #[inline]
    pub fn is_read(&self, id: NodeId) -> bool {
        self.get(id).is_read()
    }

    #[inline]
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.get(id).tag()
    }

    /// Live link of an attached node
    #[inline]
    pub fn link(&self, id: NodeId) -> Option<Link> {
        self.links[id.index()]
    }

    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.link(id).map(|l| l.parent)
    }

    /// Live link, or the link a detached node had before it was detached
    pub fn origin(&self, id: NodeId) -> Option<Link> {
        self.link(id).or_else(|| self.origins.get(&id).copied())
    }

    /// Iterate from `id` up to its root, `id` included
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            arena: self,
            next: Some(id),
        }
    }

    /// Clear the live parent link of `id`, remembering it as the origin.
    /// The parent's operand slot is left untouched.
    pub fn detach(&mut self, id: NodeId) -> Option<Link> {
        let link = self.links[id.index()].take()?;
        self.origins.insert(id, link);
        Some(link)
    }

    /// Overwrite operand slot `index` of `parent` with `replacement`.
    /// Returns the node that occupied the slot; it ends up fully unlinked.
    ///
    /// # Panics
    ///
    /// Panics if `replacement` is already attached or `index` is out of range.
    pub fn replace_operand(&mut self, parent: NodeId, index: usize, replacement: NodeId) -> NodeId {
        let old = match &mut self.get_mut(parent).kind {
            NodeKind::Composite { operands, .. } => {
                std::mem::replace(&mut operands[index], replacement)
            }
            other => panic!("cannot replace operand of non-composite node {:?}", other),
        };
        self.links[old.index()] = None;
        self.origins.remove(&old);
        self.attach(replacement, Link { parent, index });
        old
    }

    /// Whether `needle` occurs in the subtree rooted at `root`
    pub fn contains(&self, root: NodeId, needle: NodeId) -> bool {
        root == needle
            || self
                .operands(root)
                .iter()
                .any(|&child| self.contains(child, needle))
    }

    /// Reads and literals of the subtree, left to right
    pub fn leaves(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_leaves(root, &mut out);
        out
    }

    fn collect_leaves(&self, id: NodeId, out: &mut Vec<NodeId>) {
        match &self.get(id).kind {
            NodeKind::Composite { operands, .. } => {
                for &operand in operands {
                    self.collect_leaves(operand, out);
                }
            }
            _ => out.push(id),
        }
    }

    /// Check the link invariant over a whole subtree
    pub fn links_consistent(&self, root: NodeId) -> bool {
        self.operands(root).iter().enumerate().all(|(index, &child)| {
            let linked = match self.link(child) {
                Some(link) => link == Link { parent: root, index },
                // exported leaves keep their slot but lose the live link
                None => self.origins.get(&child) == Some(&Link { parent: root, index }),
            };
            linked && self.links_consistent(child)
        })
    }

    /// S-expression rendering, used by logs and the CLI
    pub fn render(&self, id: NodeId) -> String {
        match &self.get(id).kind {
            NodeKind::Composite { tag, operands } => {
                if operands.is_empty() {
                    format!("({})", tag)
                } else {
                    format!(
                        "({} {})",
                        tag,
                        operands.iter().map(|&o| self.render(o)).join(" ")
                    )
                }
            }
            NodeKind::Read { scope: Some(scope), property } => {
                format!("(get {} {})", scope, property)
            }
            NodeKind::Read { scope: None, property } => format!("(get {})", property),
            NodeKind::Literal(value) => value.to_string(),
        }
    }
}

impl Index<NodeId> for ExprArena {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        self.get(id)
    }
}

/// Iterator over a node and its live ancestors
pub struct Ancestors<'a> {
    arena: &'a ExprArena,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.arena.parent(current);
        Some(current)
    }
}
