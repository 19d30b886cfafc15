use std::collections::HashMap;
use std::ops::{Index, IndexMut};

use super::{Domain, DomainId};

/// Engine-wide list of live domains.
///
/// Slots are never reused, so a [`DomainId`] stays unambiguous after its
/// domain has been removed: lookups of a removed id simply return `None`.
/// A domain collapsed into another one keeps a forward to its survivor.
#[derive(Debug, Clone, Default)]
pub struct DomainRegistry {
    slots: Vec<Option<Domain>>,
    merged_into: HashMap<DomainId, DomainId>,
}

impl DomainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a domain and return its handle
    pub fn register(&mut self, domain: Domain) -> DomainId {
        let id = DomainId(self.slots.len() as u32);
        self.slots.push(Some(domain));
        id
    }

    /// Remove a domain. Returns `None` if it was not registered.
    pub fn remove(&mut self, id: DomainId) -> Option<Domain> {
        self.slots.get_mut(id.0 as usize)?.take()
    }

    /// Record that `from` was collapsed into `into`
    pub(crate) fn forward(&mut self, from: DomainId, into: DomainId) {
        if from != into {
            self.merged_into.insert(from, into);
        }
    }

    /// Follow collapse forwards from `id` to the domain that absorbed it.
    /// Ids that were never collapsed resolve to themselves.
    pub fn resolve(&self, mut id: DomainId) -> DomainId {
        while let Some(&next) = self.merged_into.get(&id) {
            id = next;
        }
        id
    }

    pub fn contains(&self, id: DomainId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: DomainId) -> Option<&Domain> {
        self.slots.get(id.0 as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, id: DomainId) -> Option<&mut Domain> {
        self.slots.get_mut(id.0 as usize)?.as_mut()
    }

    /// First live domain registered under `name`
    pub fn find_by_name(&self, name: &str) -> Option<DomainId> {
        self.iter()
            .find(|(_, d)| d.display_name == name)
            .map(|(id, _)| id)
    }

    /// Live domains in registration order
    pub fn iter(&self) -> impl Iterator<Item = (DomainId, &Domain)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|d| (DomainId(i as u32), d)))
    }

    /// Number of live domains
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Helpers over optional handles; a `None` domain is the local context.

    pub fn display_name(&self, id: Option<DomainId>) -> Option<&str> {
        id.and_then(|id| self.get(id))
            .map(|d| d.display_name.as_str())
    }

    pub fn is_speculative(&self, id: Option<DomainId>) -> bool {
        id.and_then(|id| self.get(id)).is_some_and(|d| d.maybe)
    }

    /// Priority of a domain; the local context counts as 0
    pub fn priority(&self, id: Option<DomainId>) -> i32 {
        id.and_then(|id| self.get(id)).map_or(0, |d| d.priority)
    }

    /// Both handles resolve to domains with the same display name
    pub fn same_name(&self, a: Option<DomainId>, b: Option<DomainId>) -> bool {
        match (self.display_name(a), self.display_name(b)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Domain carrying a confirmed (non-speculative) assignment
    pub fn is_confirmed(&self, id: Option<DomainId>) -> bool {
        id.and_then(|id| self.get(id)).is_some_and(|d| !d.maybe)
    }

    pub fn label(&self, id: Option<DomainId>) -> String {
        match id.and_then(|id| self.get(id)) {
            Some(domain) => domain.to_string(),
            None => "local".to_string(),
        }
    }
}

impl Index<DomainId> for DomainRegistry {
    type Output = Domain;

    /// # Panics
    ///
    /// Panics if the domain was never registered or has been removed.
    fn index(&self, id: DomainId) -> &Domain {
        self.get(id)
            .unwrap_or_else(|| panic!("domain {} is not registered", id))
    }
}

impl IndexMut<DomainId> for DomainRegistry {
    fn index_mut(&mut self, id: DomainId) -> &mut Domain {
        self.get_mut(id)
            .unwrap_or_else(|| panic!("domain {} is not registered", id))
    }
}
