pub mod consensus;
pub mod freshness;
pub mod model;
pub mod signature;
pub mod store;

pub use consensus::ConsensusEngine;
pub use freshness::{FreshnessPolicy, FreshnessPolicyError};
pub use model::{
    Category, ConsensusSnapshot, FailureKind, Item, ProviderId, ProviderRegistry, ProviderResult,
    ProviderSpec, SourceLabel, UNKNOWN_ITEM_NAME,
};
pub use signature::content_signature;
pub use store::{ProviderResults, PublishedSnapshot, SnapshotStore};
