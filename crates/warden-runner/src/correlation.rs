//! Pending outbound requests keyed by correlation id.

use std::collections::HashMap;
use std::fmt;

use warden_protocol::CorrelationId;

use crate::api::Continuation;

/// Issues correlation ids and holds the continuations awaiting replies.
///
/// Ids are drawn from a counter that starts at `1` and only ever increases,
/// so no two requests issued by one runner share an id. A continuation is
/// removed when it is resolved, which makes invocation at-most-once.
#[derive(Default)]
pub struct CorrelationRegistry {
    last_id: u64,
    pending: HashMap<CorrelationId, Continuation>,
}

impl CorrelationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a fresh id, strictly greater than every id issued before.
    pub fn next_id(&mut self) -> CorrelationId {
        self.last_id = self.last_id.saturating_add(1);
        CorrelationId::from(self.last_id)
    }

    /// Records the continuation to run when a reply carrying `id` arrives.
    pub fn register(&mut self, id: CorrelationId, continuation: Continuation) {
        self.pending.insert(id, continuation);
    }

    /// Removes and returns the continuation registered for `id`.
    pub fn resolve(&mut self, id: &CorrelationId) -> Option<Continuation> {
        self.pending.remove(id)
    }

    /// Number of requests still awaiting a reply.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

impl fmt::Debug for CorrelationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrelationRegistry")
            .field("last_id", &self.last_id)
            .field("pending", &self.pending.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn noop() -> Continuation {
        Box::new(|_, _| {})
    }

    #[test]
    fn ids_start_at_one_and_increase() {
        let mut registry = CorrelationRegistry::new();
        assert_eq!(registry.next_id().as_str(), "1");
        assert_eq!(registry.next_id().as_str(), "2");
        assert_eq!(registry.next_id().as_str(), "3");
    }

    #[test]
    fn ids_are_pairwise_distinct() {
        let mut registry = CorrelationRegistry::new();
        let ids: HashSet<_> = (0..500).map(|_| registry.next_id()).collect();
        assert_eq!(ids.len(), 500);
    }

    #[test]
    fn resolve_is_one_shot() {
        let mut registry = CorrelationRegistry::new();
        let id = registry.next_id();
        registry.register(id.clone(), noop());
        assert_eq!(registry.pending_len(), 1);

        assert!(registry.resolve(&id).is_some());
        assert!(registry.resolve(&id).is_none());
        assert_eq!(registry.pending_len(), 0);
    }

    #[test]
    fn unknown_ids_resolve_to_nothing() {
        let mut registry = CorrelationRegistry::new();
        let id = registry.next_id();
        registry.register(id, noop());
        assert!(registry.resolve(&CorrelationId::from("99")).is_none());
        assert_eq!(registry.pending_len(), 1);
    }
}
