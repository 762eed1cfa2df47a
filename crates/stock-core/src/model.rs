use std::fmt;

use serde::{Serialize, Serializer};

pub const UNKNOWN_ITEM_NAME: &str = "Unknown";

/// One stocked item as reported by a provider.
///
/// Names are kept as the provider spelled them; quantities are always at
/// least one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Item {
    pub name: String,
    pub quantity: u32,
}

impl Item {
    pub fn new(name: impl Into<String>, quantity: u32) -> Self {
        let name = name.into();
        let name = if name.trim().is_empty() {
            UNKNOWN_ITEM_NAME.to_string()
        } else {
            name
        };

        Self {
            name,
            quantity: quantity.max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Gear,
    Seed,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gear => "gear",
            Self::Seed => "seed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProviderId(String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ProviderId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Static description of one polled provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSpec {
    pub id: ProviderId,
    pub url: String,
    pub name: String,
}

/// Ordered, read-only list of providers. Order drives status output and
/// breaks otherwise-equal consensus ties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderRegistry {
    providers: Vec<ProviderSpec>,
}

impl ProviderRegistry {
    pub fn new(providers: Vec<ProviderSpec>) -> Self {
        Self { providers }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProviderSpec> {
        self.providers.iter()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Network,
    Timeout,
    Http,
    Parse,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Http => "http",
            Self::Parse => "parse",
        }
    }
}

/// Latest outcome of polling a single provider. Replaced wholesale every
/// cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderResult {
    pub provider_id: ProviderId,
    pub gear: Vec<Item>,
    pub seed: Vec<Item>,
    pub reported_at_ms: u64,
    pub is_valid: bool,
    pub errored: bool,
    pub error_kind: Option<FailureKind>,
    pub error_message: Option<String>,
}

impl ProviderResult {
    /// Builds a result from normalized lists. Valid iff at least one list
    /// carries items.
    pub fn from_lists(
        provider_id: ProviderId,
        gear: Vec<Item>,
        seed: Vec<Item>,
        reported_at_ms: u64,
    ) -> Self {
        let is_valid = !gear.is_empty() || !seed.is_empty();
        let error_message = (!is_valid).then(|| "no items reported".to_string());

        Self {
            provider_id,
            gear,
            seed,
            reported_at_ms,
            is_valid,
            errored: false,
            error_kind: None,
            error_message,
        }
    }

    pub fn failed(
        provider_id: ProviderId,
        kind: FailureKind,
        message: impl Into<String>,
        now_ms: u64,
    ) -> Self {
        Self {
            provider_id,
            gear: Vec::new(),
            seed: Vec::new(),
            reported_at_ms: now_ms,
            is_valid: false,
            errored: true,
            error_kind: Some(kind),
            error_message: Some(message.into()),
        }
    }

    pub fn items(&self, category: Category) -> &[Item] {
        match category {
            Category::Gear => &self.gear,
            Category::Seed => &self.seed,
        }
    }

    pub fn total_items(&self) -> usize {
        self.gear.len() + self.seed.len()
    }
}

/// Where a published snapshot came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceLabel {
    Provider(ProviderId),
    Aggregated,
    External,
}

impl SourceLabel {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Provider(id) => id.as_str(),
            Self::Aggregated => "aggregated",
            Self::External => "external",
        }
    }
}

impl fmt::Display for SourceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SourceLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsensusSnapshot {
    pub gear: Vec<Item>,
    pub seed: Vec<Item>,
    #[serde(rename = "reportedAt")]
    pub reported_at_ms: u64,
    pub source: SourceLabel,
}

impl ConsensusSnapshot {
    pub fn from_provider(result: &ProviderResult) -> Self {
        Self {
            gear: result.gear.clone(),
            seed: result.seed.clone(),
            reported_at_ms: result.reported_at_ms,
            source: SourceLabel::Provider(result.provider_id.clone()),
        }
    }
}
