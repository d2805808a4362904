//! Edit-resolution collaborator.
//!
//! The engine never owns edits. It asks whether a revision is locally
//! parsed, and applies peer judgements through this trait; what an edit
//! actually is (diff, page, scoring internals) stays on the other side.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use vandal_proto::{Identity, RevId};

/// A local edit as the engine refers to it when announcing: just enough
/// to pick a channel and build a command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRef {
    /// Site the edit belongs to.
    pub site: String,
    /// Revision id of the edit.
    pub rev: RevId,
}

impl EditRef {
    pub fn new(site: impl Into<String>, rev: RevId) -> Self {
        Self { site: site.into(), rev }
    }
}

/// Mutation and resolution interface over the local edit working set.
///
/// Implementations must tolerate repeated lookups; the correlation cache
/// guarantees each queued judgement is applied at most once.
pub trait EditStore: Send + Sync {
    /// Whether the revision is currently parsed and can take judgements.
    fn is_parsed(&self, rev: RevId) -> bool;
    /// Mark an edit as reviewed-good, attributed to a peer.
    fn mark_good(&self, rev: RevId, by: &Identity);
    /// Mark an edit as reverted, attributed to a peer.
    fn mark_reverted(&self, rev: RevId, by: &Identity);
    /// Mark an edit as suspicious, attributed to a peer.
    fn mark_suspicious(&self, rev: RevId, by: &Identity);
    /// Add a peer's score contribution to an edit.
    fn add_score(&self, rev: RevId, delta: i64);
    /// Record that a wiki user received a warning at the given level.
    fn record_warning(&self, user: &str, level: u8);
}

/// Review status of an edit in the in-memory store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditStatus {
    #[default]
    None,
    Good,
    Reverted,
    Suspicious,
}

#[derive(Debug, Default, Clone)]
struct EditRecord {
    status: EditStatus,
    score: i64,
    reviewed_by: Option<String>,
}

/// In-memory [`EditStore`] backing the binary and the tests.
///
/// Edits enter the working set through [`MemoryEditStore::insert`] as the
/// fetch pipeline parses them; the mutex keeps that pipeline and the
/// engine task from racing.
#[derive(Default)]
pub struct MemoryEditStore {
    inner: Mutex<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    edits: HashMap<RevId, EditRecord>,
    warnings: Vec<(String, u8)>,
}

impl MemoryEditStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make a revision resolvable. Call `Engine::edit_resolved` afterwards
    /// so deferred judgements drain onto it.
    pub fn insert(&self, rev: RevId) {
        self.inner.lock().edits.entry(rev).or_default();
    }

    pub fn status(&self, rev: RevId) -> Option<EditStatus> {
        self.inner.lock().edits.get(&rev).map(|e| e.status)
    }

    pub fn score(&self, rev: RevId) -> Option<i64> {
        self.inner.lock().edits.get(&rev).map(|e| e.score)
    }

    pub fn reviewed_by(&self, rev: RevId) -> Option<String> {
        self.inner.lock().edits.get(&rev).and_then(|e| e.reviewed_by.clone())
    }

    pub fn warnings(&self) -> Vec<(String, u8)> {
        self.inner.lock().warnings.clone()
    }

    fn set_status(&self, rev: RevId, status: EditStatus, by: &Identity) {
        let mut inner = self.inner.lock();
        if let Some(edit) = inner.edits.get_mut(&rev) {
            edit.status = status;
            edit.reviewed_by = Some(by.nick.clone());
        }
    }
}

impl EditStore for MemoryEditStore {
    fn is_parsed(&self, rev: RevId) -> bool {
        self.inner.lock().edits.contains_key(&rev)
    }

    fn mark_good(&self, rev: RevId, by: &Identity) {
        self.set_status(rev, EditStatus::Good, by);
    }

    fn mark_reverted(&self, rev: RevId, by: &Identity) {
        self.set_status(rev, EditStatus::Reverted, by);
    }

    fn mark_suspicious(&self, rev: RevId, by: &Identity) {
        self.set_status(rev, EditStatus::Suspicious, by);
    }

    fn add_score(&self, rev: RevId, delta: i64) {
        let mut inner = self.inner.lock();
        if let Some(edit) = inner.edits.get_mut(&rev) {
            edit.score += delta;
        }
    }

    fn record_warning(&self, user: &str, level: u8) {
        self.inner.lock().warnings.push((user.to_string(), level));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_revision_is_not_parsed() {
        let store = MemoryEditStore::new();
        assert!(!store.is_parsed(1));
        store.insert(1);
        assert!(store.is_parsed(1));
    }

    #[test]
    fn test_mutations_attribute_reviewer() {
        let store = MemoryEditStore::new();
        store.insert(7);
        store.mark_good(7, &Identity::new("Alice", "a", "h"));
        assert_eq!(store.status(7), Some(EditStatus::Good));
        assert_eq!(store.reviewed_by(7), Some("Alice".into()));
    }

    #[test]
    fn test_score_accumulates() {
        let store = MemoryEditStore::new();
        store.insert(7);
        store.add_score(7, -100);
        store.add_score(7, 30);
        assert_eq!(store.score(7), Some(-70));
    }

    #[test]
    fn test_warnings_recorded_in_order() {
        let store = MemoryEditStore::new();
        store.record_warning("Vandal", 1);
        store.record_warning("Vandal", 2);
        assert_eq!(store.warnings(), vec![("Vandal".into(), 1), ("Vandal".into(), 2)]);
    }
}
