use std::fmt;

use smallvec::SmallVec;

use crate::domain::DomainId;

/// Stable handle of a node inside an [`ExprArena`](super::ExprArena).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Position of the node in its arena
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Literal payload carried by literal nodes, substitutions and solutions
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A boolean literal
    Bool(bool),
    /// An integer literal
    Long(i64),
    /// A floating point literal
    Float(f64),
    /// A string literal
    String(String),
    /// Nil/empty
    Nil,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Long(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Nil => write!(f, "nil"),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Long(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Long(n as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

/// Operand list of a composite node. Most operations take at most four operands.
pub type Operands = SmallVec<[NodeId; 4]>;

/// Attributes attached while a tree is being scheduled.
///
/// None of these are part of the parsed expression; they are written by the
/// partitioner, by `compact` and by `unwrap`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeHeader {
    /// Domain this node has been assigned to
    pub domain: Option<DomainId>,
    /// Canonical paths of the variables this node (or its descendants) reads
    pub variables: Option<Vec<String>>,
    /// Set once a read leaf has been handed to another domain; terminal
    pub exported: bool,
}

/// Shape of an expression node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// An operation: a tag followed by its operands
    Composite { tag: String, operands: Operands },
    /// A request to read a variable, optionally scoped
    Read {
        scope: Option<String>,
        property: String,
    },
    /// A literal operand
    Literal(Value),
}

/// One node of an expression tree
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub header: NodeHeader,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Node {
            header: NodeHeader::default(),
            kind,
        }
    }

    /// Operation nodes are the ones the scheduler moves between buckets:
    /// composites and reads. Literals are never scheduled on their own.
    #[inline]
    pub fn is_operation(&self) -> bool {
        !matches!(self.kind, NodeKind::Literal(_))
    }

    #[inline]
    pub fn is_read(&self) -> bool {
        matches!(self.kind, NodeKind::Read { .. })
    }

    /// Operands of a composite; empty for reads and literals
    pub fn operands(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Composite { operands, .. } => operands,
            _ => &[],
        }
    }

    /// Tag of a composite node
    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Composite { tag, .. } => Some(tag),
            _ => None,
        }
    }

    /// Literal payload, if this node is a literal
    pub fn literal(&self) -> Option<&Value> {
        match &self.kind {
            NodeKind::Literal(value) => Some(value),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_is_not_operation() {
        let node = Node::new(NodeKind::Literal(Value::Long(1)));
        assert!(!node.is_operation());
        assert!(node.operands().is_empty());
        assert_eq!(node.literal(), Some(&Value::Long(1)));
    }

    #[test]
    fn test_read_is_operation_without_operands() {
        let node = Node::new(NodeKind::Read {
            scope: None,
            property: "width".to_string(),
        });
        assert!(node.is_operation());
        assert!(node.is_read());
        assert!(node.tag().is_none());
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::from(3).to_string(), "3");
        assert_eq!(Value::from("a").to_string(), "\"a\"");
        assert_eq!(Value::Nil.to_string(), "nil");
    }
}
