//! Correlation cache for judgements that arrived ahead of their edit.
//!
//! A peer with a faster feed can announce a judgement before the local
//! client has parsed the revision it refers to. Those notices wait here,
//! one ordered queue per kind, and drain in insertion order once the
//! revision becomes resolvable. Removal on apply is what makes
//! application exactly-once; the store never has to defend against
//! replays.

use std::collections::VecDeque;

use tracing::warn;
use vandal_proto::{Identity, RevId};

use crate::edits::EditStore;

/// Default per-queue capacity. The original surface left these queues
/// unbounded; a cap with oldest-first drop bounds memory when a revision
/// never resolves.
pub const DEFAULT_QUEUE_CAP: usize = 4096;

/// The three judgement kinds that share the plain-item queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Good,
    Rollback,
    Suspicious,
}

/// A remote judgement waiting for its edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerItem {
    /// Site the referenced edit belongs to.
    pub site: String,
    /// Revision the judgement applies to.
    pub rev: RevId,
    /// Peer the judgement is attributed to.
    pub from: Identity,
}

/// A remote score contribution waiting for its edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerScore {
    pub item: PeerItem,
    /// Signed contribution added to the local score on apply.
    pub score: i64,
}

/// Deferred-application buffer reconciling remote judgements with
/// not-yet-parsed local edits.
#[derive(Debug)]
pub struct CorrelationCache {
    good: VecDeque<PeerItem>,
    rollback: VecDeque<PeerItem>,
    suspicious: VecDeque<PeerItem>,
    rescore: VecDeque<PeerScore>,
    queue_cap: usize,
}

impl Default for CorrelationCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAP)
    }
}

impl CorrelationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(queue_cap: usize) -> Self {
        Self {
            good: VecDeque::new(),
            rollback: VecDeque::new(),
            suspicious: VecDeque::new(),
            rescore: VecDeque::new(),
            queue_cap: queue_cap.max(1),
        }
    }

    /// Offer a judgement. Applied immediately when the revision is already
    /// parsed (returns true); queued otherwise.
    pub fn offer(&mut self, kind: ItemKind, item: PeerItem, store: &dyn EditStore) -> bool {
        if store.is_parsed(item.rev) {
            apply_item(kind, &item, store);
            return true;
        }
        let queue = match kind {
            ItemKind::Good => &mut self.good,
            ItemKind::Rollback => &mut self.rollback,
            ItemKind::Suspicious => &mut self.suspicious,
        };
        push_capped(queue, item, self.queue_cap, kind_name(kind));
        false
    }

    /// Offer a score contribution, same contract as [`CorrelationCache::offer`].
    pub fn offer_score(&mut self, score: PeerScore, store: &dyn EditStore) -> bool {
        if store.is_parsed(score.item.rev) {
            store.add_score(score.item.rev, score.score);
            return true;
        }
        push_capped(&mut self.rescore, score, self.queue_cap, "rescore");
        false
    }

    /// Drain every queued judgement for a now-parsed revision, in insertion
    /// order, preserving the relative order of everything else. Returns the
    /// number of entries applied.
    pub fn drain_for(&mut self, rev: RevId, store: &dyn EditStore) -> usize {
        let mut applied = 0;
        for (kind, queue) in [
            (ItemKind::Good, &mut self.good),
            (ItemKind::Rollback, &mut self.rollback),
            (ItemKind::Suspicious, &mut self.suspicious),
        ] {
            queue.retain(|item| {
                if item.rev == rev {
                    apply_item(kind, item, store);
                    applied += 1;
                    false
                } else {
                    true
                }
            });
        }
        self.rescore.retain(|entry| {
            if entry.item.rev == rev {
                store.add_score(rev, entry.score);
                applied += 1;
                false
            } else {
                true
            }
        });
        applied
    }

    /// Total entries currently deferred across all queues.
    pub fn len(&self) -> usize {
        self.good.len() + self.rollback.len() + self.suspicious.len() + self.rescore.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub(crate) fn queued(&self, kind: ItemKind) -> &VecDeque<PeerItem> {
        match kind {
            ItemKind::Good => &self.good,
            ItemKind::Rollback => &self.rollback,
            ItemKind::Suspicious => &self.suspicious,
        }
    }
}

fn apply_item(kind: ItemKind, item: &PeerItem, store: &dyn EditStore) {
    match kind {
        ItemKind::Good => store.mark_good(item.rev, &item.from),
        ItemKind::Rollback => store.mark_reverted(item.rev, &item.from),
        ItemKind::Suspicious => store.mark_suspicious(item.rev, &item.from),
    }
}

fn push_capped<T>(queue: &mut VecDeque<T>, entry: T, cap: usize, kind: &str) {
    if queue.len() >= cap {
        queue.pop_front();
        warn!(kind, cap, "correlation queue full, dropping oldest entry");
    }
    queue.push_back(entry);
}

fn kind_name(kind: ItemKind) -> &'static str {
    match kind {
        ItemKind::Good => "good",
        ItemKind::Rollback => "rollback",
        ItemKind::Suspicious => "suspicious",
    }
}
