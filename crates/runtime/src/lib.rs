pub mod clock;
pub mod events;
pub mod fetch;
pub mod logging;
pub mod normalize;
pub mod poller;

pub use events::{CycleOutcome, CycleStage};
pub use fetch::{fetch_provider, ClientBuildError, FetchError, HttpFetch, ReqwestFetch};
pub use normalize::{category_items, normalize_body, normalize_payload, PayloadShape};
pub use poller::{CycleReport, Poller, PollerConfig};
