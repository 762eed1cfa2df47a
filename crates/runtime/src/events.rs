use stock_core::SourceLabel;

/// Phases a poll cycle passes through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    Fetching,
    Settled,
    Aggregating,
    Published,
    Retained,
}

impl CycleStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fetching => "fetching",
            Self::Settled => "settled",
            Self::Aggregating => "aggregating",
            Self::Published => "published",
            Self::Retained => "retained",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Published(SourceLabel),
    /// No provider was valid; the previous snapshot stays in place.
    Retained,
}
