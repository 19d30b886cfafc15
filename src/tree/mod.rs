//! Expression trees.
//!
//! Trees are stored in an [`ExprArena`]: nodes are addressed by [`NodeId`]
//! and parent links live in a side table, so the scheduler can splice
//! sub-trees without aliasing problems.

pub mod arena;
pub mod node;

pub use arena::{Ancestors, ExprArena, Link};
pub use node::{Node, NodeHeader, NodeId, NodeKind, Operands, Value};
