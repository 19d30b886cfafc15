//! Evaluation domains.
//!
//! A [`Domain`] is an evaluation context able to solve a bucket of
//! sub-problems: a solver instance, an execution frame, or a remote context
//! that is not loaded yet. Domains live in a [`DomainRegistry`] owned by the
//! engine and are referred to by [`DomainId`].

pub mod registry;

use std::cmp::Ordering;
use std::fmt;

use crate::tree::NodeId;

pub use registry::DomainRegistry;

/// Stable handle of a domain inside a [`DomainRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomainId(pub(crate) u32);

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.0)
    }
}

/// An evaluation context
#[derive(Debug, Clone, PartialEq)]
pub struct Domain {
    /// Logical identity: two domains with the same name address the same context
    pub display_name: String,
    /// Ordering key; negative priorities mark incomplete domains that may collapse
    pub priority: i32,
    /// Speculative: not yet confirmed as distinct from another domain
    pub maybe: bool,
    /// Execution frame the domain is bound to
    pub frame: Option<String>,
    /// Set for external domains that have to be loaded before they can solve
    pub url: Option<String>,
    /// Whether the external resource behind `url` has been loaded
    pub loaded: bool,
    /// Operations the domain carries and hands over when it is collapsed
    exports: Vec<NodeId>,
}

impl Domain {
    pub fn new(display_name: impl Into<String>, priority: i32) -> Self {
        Domain {
            display_name: display_name.into(),
            priority,
            maybe: false,
            frame: None,
            url: None,
            loaded: false,
            exports: Vec::new(),
        }
    }

    /// Mark the domain as speculative
    pub fn speculative(mut self) -> Self {
        self.maybe = true;
        self
    }

    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.frame = Some(frame.into());
        self
    }

    pub fn remote(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    #[inline]
    pub fn is_remote(&self) -> bool {
        self.url.is_some()
    }

    /// Remote domain whose resource has not been loaded yet
    #[inline]
    pub fn awaiting_load(&self) -> bool {
        self.is_remote() && !self.loaded
    }

    /// Incomplete domains (negative priority) may be collapsed into a sibling
    #[inline]
    pub fn is_incomplete(&self) -> bool {
        self.priority < 0
    }

    /// Same logical context: same name, same frame
    pub fn same_context(&self, other: &Domain) -> bool {
        self.display_name == other.display_name && self.frame == other.frame
    }

    /// Frames are compatible when this domain is unbound or bound to the same frame
    pub fn frame_compatible(&self, other: &Domain) -> bool {
        self.frame.is_none() || self.frame == other.frame
    }

    /// Ordering between domains: priority first, speculative after confirmed
    pub fn rank_cmp(&self, other: &Domain) -> Ordering {
        (self.priority, self.maybe).cmp(&(other.priority, other.maybe))
    }

    pub fn push_export(&mut self, node: NodeId) {
        self.exports.push(node);
    }

    pub fn exports(&self) -> &[NodeId] {
        &self.exports
    }

    /// Drain the operations this domain carries
    pub fn take_exports(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.exports)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name)?;
        if let Some(frame) = &self.frame {
            write!(f, "@{}", frame)?;
        }
        if self.maybe {
            write!(f, "?")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_orders_priority_then_speculation() {
        let a = Domain::new("a", 0);
        let b = Domain::new("b", -1);
        let c = Domain::new("c", 0).speculative();

        assert_eq!(b.rank_cmp(&a), Ordering::Less);
        assert_eq!(a.rank_cmp(&c), Ordering::Less, "confirmed before speculative");
        assert_eq!(a.rank_cmp(&Domain::new("z", 0)), Ordering::Equal);
    }

    #[test]
    fn test_same_context_requires_frame() {
        let a = Domain::new("solver", 0).with_frame("main");
        let b = Domain::new("solver", 3).with_frame("main");
        let c = Domain::new("solver", 0).with_frame("popup");
        assert!(a.same_context(&b));
        assert!(!a.same_context(&c));
    }

    #[test]
    fn test_take_exports_drains() {
        let mut d = Domain::new("d", 0);
        d.push_export(NodeId(3));
        assert_eq!(d.take_exports(), vec![NodeId(3)]);
        assert!(d.exports().is_empty());
    }

    #[test]
    fn test_awaiting_load() {
        let mut d = Domain::new("frame", 0).remote("https://example.org/frame");
        assert!(d.awaiting_load());
        d.loaded = true;
        assert!(!d.awaiting_load());
        assert!(!Domain::new("local", 0).awaiting_load());
    }

    #[test]
    fn test_display() {
        let d = Domain::new("solver", 0).with_frame("main").speculative();
        assert_eq!(d.to_string(), "solver@main?");
    }
}
