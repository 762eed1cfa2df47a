use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::watch;

use crate::model::{ConsensusSnapshot, ProviderId, ProviderResult};

pub type ProviderResults = BTreeMap<ProviderId, ProviderResult>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedSnapshot {
    pub snapshot: ConsensusSnapshot,
    pub published_at_ms: u64,
}

/// Process-wide holder of the latest snapshot and per-provider results.
///
/// Created empty at startup and shared behind an `Arc`. Every write swaps
/// a whole value in, so readers see either the previous value or the new
/// one, never a mix. The poller writes both slots; the push endpoint only
/// writes the snapshot slot.
#[derive(Debug)]
pub struct SnapshotStore {
    created_at_ms: u64,
    snapshot_tx: watch::Sender<Option<Arc<PublishedSnapshot>>>,
    providers_tx: watch::Sender<Arc<ProviderResults>>,
}

impl SnapshotStore {
    pub fn new(created_at_ms: u64) -> Self {
        let (snapshot_tx, _) = watch::channel(None);
        let (providers_tx, _) = watch::channel(Arc::new(ProviderResults::new()));

        Self {
            created_at_ms,
            snapshot_tx,
            providers_tx,
        }
    }

    pub fn created_at_ms(&self) -> u64 {
        self.created_at_ms
    }

    pub fn latest(&self) -> Option<Arc<PublishedSnapshot>> {
        self.snapshot_tx.borrow().clone()
    }

    pub fn last_updated_ms(&self) -> Option<u64> {
        self.snapshot_tx
            .borrow()
            .as_ref()
            .map(|published| published.published_at_ms)
    }

    pub fn publish(
        &self,
        snapshot: ConsensusSnapshot,
        published_at_ms: u64,
    ) -> Arc<PublishedSnapshot> {
        let published = Arc::new(PublishedSnapshot {
            snapshot,
            published_at_ms,
        });
        self.snapshot_tx.send_replace(Some(Arc::clone(&published)));
        published
    }

    pub fn providers(&self) -> Arc<ProviderResults> {
        Arc::clone(&self.providers_tx.borrow())
    }

    pub fn replace_providers(&self, results: ProviderResults) {
        self.providers_tx.send_replace(Arc::new(results));
    }

    /// Receiver that wakes on every published snapshot. Only the latest
    /// value is retained for slow readers.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<PublishedSnapshot>>> {
        self.snapshot_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{ProviderResults, SnapshotStore};
    use crate::model::{ConsensusSnapshot, Item, ProviderResult, SourceLabel};

    fn snapshot(name: &str, ts: u64) -> ConsensusSnapshot {
        ConsensusSnapshot {
            gear: vec![Item::new(name, 1)],
            seed: vec![],
            reported_at_ms: ts,
            source: SourceLabel::Aggregated,
        }
    }

    #[test]
    fn new_store_is_empty() {
        let store = SnapshotStore::new(42);

        assert!(store.latest().is_none());
        assert!(store.last_updated_ms().is_none());
        assert!(store.providers().is_empty());
        assert_eq!(store.created_at_ms(), 42);
    }

    #[test]
    fn publish_replaces_snapshot_wholesale() {
        let store = SnapshotStore::new(0);
        store.publish(snapshot("Rake", 1), 10);
        let held_by_reader = store.latest().unwrap();

        store.publish(snapshot("Hoe", 2), 20);

        assert_eq!(held_by_reader.snapshot.gear[0].name, "Rake");
        assert_eq!(store.latest().unwrap().snapshot.gear[0].name, "Hoe");
        assert_eq!(store.last_updated_ms(), Some(20));
    }

    #[test]
    fn replace_providers_swaps_the_whole_map() {
        let store = SnapshotStore::new(0);
        let mut first = ProviderResults::new();
        first.insert(
            "a".into(),
            ProviderResult::from_lists("a".into(), vec![Item::new("Rake", 1)], vec![], 1),
        );
        store.replace_providers(first);
        let before = store.providers();

        store.replace_providers(ProviderResults::new());

        assert_eq!(before.len(), 1);
        assert!(store.providers().is_empty());
    }

    #[tokio::test]
    async fn subscribers_observe_published_snapshots() {
        let store = SnapshotStore::new(0);
        let mut rx = store.subscribe();

        let published = store.publish(snapshot("Rake", 1), 5);
        rx.changed().await.unwrap();

        let seen = rx.borrow_and_update().clone().unwrap();
        assert!(Arc::ptr_eq(&seen, &published));
    }
}
