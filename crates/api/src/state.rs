use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use stock_core::{
    ConsensusSnapshot, FailureKind, Item, ProviderRegistry, PublishedSnapshot, SnapshotStore,
    SourceLabel,
};
use tokio::sync::watch;
use tracing::info;

pub const WAITING_MESSAGE: &str = "waiting for first poll";

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct StockView {
    pub gear: Vec<Item>,
    pub seed: Vec<Item>,
    #[serde(rename = "reportedAt")]
    pub reported_at_ms: u64,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStatus {
    pub id: String,
    pub name: String,
    pub is_valid: bool,
    pub gear_count: usize,
    pub seed_count: usize,
    pub error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FailureKind>,
    pub message: Option<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum PushRejection {
    #[error("Invalid JSON")]
    InvalidJson,
    #[error("Invalid data format. Expected gear and seed arrays.")]
    InvalidFormat,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum StockEvent {
    Snapshot(ConsensusSnapshot),
}

/// Read side of the snapshot store plus the push endpoint's write path.
#[derive(Clone, Debug)]
pub struct AppState {
    store: Arc<SnapshotStore>,
    registry: Arc<ProviderRegistry>,
    clock: fn() -> u64,
}

impl AppState {
    pub fn new(store: Arc<SnapshotStore>, registry: Arc<ProviderRegistry>) -> Self {
        Self::with_clock(store, registry, runtime::clock::unix_now_ms)
    }

    pub fn with_clock(
        store: Arc<SnapshotStore>,
        registry: Arc<ProviderRegistry>,
        clock: fn() -> u64,
    ) -> Self {
        Self {
            store,
            registry,
            clock,
        }
    }

    /// Latest snapshot, or an empty one stamped with the store's creation
    /// time before anything was published.
    pub fn latest_stock(&self) -> StockView {
        match self.store.latest() {
            Some(published) => StockView {
                gear: published.snapshot.gear.clone(),
                seed: published.snapshot.seed.clone(),
                reported_at_ms: published.snapshot.reported_at_ms,
            },
            None => StockView {
                gear: Vec::new(),
                seed: Vec::new(),
                reported_at_ms: self.store.created_at_ms(),
            },
        }
    }

    /// One entry per configured provider, in registry order.
    pub fn source_statuses(&self) -> Vec<SourceStatus> {
        let providers = self.store.providers();

        self.registry
            .iter()
            .map(|spec| match providers.get(&spec.id) {
                Some(result) => SourceStatus {
                    id: spec.id.to_string(),
                    name: spec.name.clone(),
                    is_valid: result.is_valid,
                    gear_count: result.gear.len(),
                    seed_count: result.seed.len(),
                    error: result.errored,
                    error_kind: result.error_kind,
                    message: result.error_message.clone(),
                },
                None => SourceStatus {
                    id: spec.id.to_string(),
                    name: spec.name.clone(),
                    is_valid: false,
                    gear_count: 0,
                    seed_count: 0,
                    error: false,
                    error_kind: None,
                    message: Some(WAITING_MESSAGE.to_string()),
                },
            })
            .collect()
    }

    /// Installs an externally aggregated snapshot. Rejected bodies leave
    /// the store untouched.
    pub fn push_snapshot(&self, body: &[u8]) -> Result<Arc<PublishedSnapshot>, PushRejection> {
        let doc: Value = serde_json::from_slice(body).map_err(|_| PushRejection::InvalidJson)?;

        let gear = doc.get("gear").and_then(Value::as_array);
        let seed = doc.get("seed").and_then(Value::as_array);
        let (Some(gear), Some(seed)) = (gear, seed) else {
            return Err(PushRejection::InvalidFormat);
        };

        let now_ms = (self.clock)();
        let reported_at_ms = doc
            .get("reportedAt")
            .and_then(Value::as_u64)
            .filter(|ts| *ts > 0)
            .unwrap_or(now_ms);

        let snapshot = ConsensusSnapshot {
            gear: runtime::category_items(gear),
            seed: runtime::category_items(seed),
            reported_at_ms,
            source: SourceLabel::External,
        };
        info!(
            gear = snapshot.gear.len(),
            seed = snapshot.seed.len(),
            "external snapshot accepted"
        );

        Ok(self.store.publish(snapshot, now_ms))
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<Option<Arc<PublishedSnapshot>>> {
        self.store.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use stock_core::{
        FailureKind, Item, ProviderRegistry, ProviderResult, ProviderResults, ProviderSpec,
        SnapshotStore, SourceLabel,
    };

    use super::{AppState, PushRejection, WAITING_MESSAGE};

    const CREATED_MS: u64 = 1_000;

    fn fixed_clock() -> u64 {
        5_000
    }

    fn state() -> (AppState, Arc<SnapshotStore>) {
        let store = Arc::new(SnapshotStore::new(CREATED_MS));
        let registry = Arc::new(ProviderRegistry::new(vec![
            ProviderSpec {
                id: "zeta".into(),
                url: "http://zeta.test".to_string(),
                name: "Zeta".to_string(),
            },
            ProviderSpec {
                id: "alpha".into(),
                url: "http://alpha.test".to_string(),
                name: "Alpha".to_string(),
            },
            ProviderSpec {
                id: "mid".into(),
                url: "http://mid.test".to_string(),
                name: "Mid".to_string(),
            },
        ]));
        (
            AppState::with_clock(Arc::clone(&store), registry, fixed_clock),
            store,
        )
    }

    #[test]
    fn latest_stock_is_empty_before_first_publish() {
        let (state, _store) = state();

        let view = state.latest_stock();

        assert!(view.gear.is_empty());
        assert!(view.seed.is_empty());
        assert_eq!(view.reported_at_ms, CREATED_MS);
    }

    #[test]
    fn statuses_follow_registry_order_with_waiting_placeholders() {
        let (state, store) = state();
        let mut results = ProviderResults::new();
        results.insert(
            "alpha".into(),
            ProviderResult::from_lists("alpha".into(), vec![Item::new("Rake", 1)], vec![], 10),
        );
        results.insert(
            "zeta".into(),
            ProviderResult::failed(
                "zeta".into(),
                FailureKind::Timeout,
                "request timed out after 15000ms",
                10,
            ),
        );
        store.replace_providers(results);

        let statuses = state.source_statuses();

        let ids: Vec<&str> = statuses.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["zeta", "alpha", "mid"]);
        assert!(statuses[0].error);
        assert_eq!(statuses[0].error_kind, Some(FailureKind::Timeout));
        assert_eq!(
            statuses[0].message.as_deref(),
            Some("request timed out after 15000ms")
        );
        assert!(statuses[1].is_valid);
        assert_eq!(statuses[1].gear_count, 1);
        assert_eq!(statuses[1].error_kind, None);
        assert!(!statuses[2].error);
        assert_eq!(statuses[2].error_kind, None);

        let rendered = serde_json::to_value(&statuses).unwrap();
        assert_eq!(rendered[0]["errorKind"], "timeout");
        assert!(rendered[1].get("errorKind").is_none());
        assert_eq!(statuses[2].message.as_deref(), Some(WAITING_MESSAGE));
    }

    #[test]
    fn push_replaces_snapshot_and_normalizes_items() {
        let (state, store) = state();

        let body = br#"{"gear":[{"name":"Rake","quantity":3},{"name":""}],"seed":[],"reportedAt":4242}"#;
        state.push_snapshot(body).unwrap();

        let published = store.latest().unwrap();
        assert_eq!(
            published.snapshot.gear,
            vec![Item::new("Rake", 3), Item::new("Unknown", 1)]
        );
        assert_eq!(published.snapshot.reported_at_ms, 4_242);
        assert_eq!(published.snapshot.source, SourceLabel::External);
        assert_eq!(published.published_at_ms, 5_000);
    }

    #[test]
    fn push_without_timestamp_uses_clock() {
        let (state, _store) = state();

        let published = state.push_snapshot(br#"{"gear":[],"seed":[]}"#).unwrap();

        assert_eq!(published.snapshot.reported_at_ms, 5_000);
    }

    #[test]
    fn malformed_pushes_are_rejected_without_touching_store() {
        let (state, store) = state();

        assert_eq!(
            state.push_snapshot(b"{not json").unwrap_err(),
            PushRejection::InvalidJson
        );
        assert_eq!(
            state.push_snapshot(br#"{"gear":[]}"#).unwrap_err(),
            PushRejection::InvalidFormat
        );
        assert_eq!(
            state.push_snapshot(br#"{"gear":[],"seed":{}}"#).unwrap_err(),
            PushRejection::InvalidFormat
        );
        assert!(store.latest().is_none());
    }
}
