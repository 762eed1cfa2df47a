use std::future::Future;
use std::time::Duration;

use stock_core::{FailureKind, ProviderResult, ProviderSpec};
use tracing::{debug, trace, warn};

use crate::normalize::normalize_body;

const USER_AGENT: &str = concat!("stock-consensus/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("HTTP {status}")]
    Http { status: u16 },
    #[error("parse error: {0}")]
    Parse(String),
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Network(_) => FailureKind::Network,
            Self::Timeout(_) => FailureKind::Timeout,
            Self::Http { .. } => FailureKind::Http,
            Self::Parse(_) => FailureKind::Parse,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientBuildError {
    #[error("invalid proxy url {url}: {source}")]
    InvalidProxy {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

/// Minimal async GET used by the poller; implemented by [`ReqwestFetch`]
/// and by scripted clients in tests.
pub trait HttpFetch: Send + Sync {
    fn get_text(&self, url: &str) -> impl Future<Output = Result<String, FetchError>> + Send;
}

/// Shared reqwest client with the request timeout and optional forward
/// proxy applied to every provider.
#[derive(Debug, Clone)]
pub struct ReqwestFetch {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestFetch {
    pub fn new(timeout: Duration, proxy: Option<&str>) -> Result<Self, ClientBuildError> {
        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT);

        if let Some(proxy_url) = proxy {
            let proxy =
                reqwest::Proxy::all(proxy_url).map_err(|source| ClientBuildError::InvalidProxy {
                    url: proxy_url.to_string(),
                    source,
                })?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(ClientBuildError::Build)?;
        Ok(Self { client, timeout })
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

impl HttpFetch for ReqwestFetch {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        trace!(url, "provider GET starting");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| self.classify(err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|err| self.classify(err))
    }
}

/// Fetches and normalizes one provider. Never fails: every error becomes
/// an errored [`ProviderResult`].
///
/// `timeout` is enforced here as well as inside the client, so a client
/// without its own deadline still cannot stall a cycle.
pub async fn fetch_provider<C: HttpFetch>(
    client: &C,
    spec: &ProviderSpec,
    timeout: Duration,
    now_ms: u64,
) -> ProviderResult {
    let outcome = match tokio::time::timeout(timeout, client.get_text(&spec.url)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(FetchError::Timeout(timeout)),
    };

    match outcome {
        Ok(body) => {
            let result = normalize_body(&body, &spec.id, now_ms);
            debug!(
                provider = %spec.id,
                valid = result.is_valid,
                gear = result.gear.len(),
                seed = result.seed.len(),
                "provider fetched"
            );
            result
        }
        Err(err) => {
            warn!(
                provider = %spec.id,
                kind = err.kind().as_str(),
                error = %err,
                "provider fetch failed"
            );
            ProviderResult::failed(spec.id.clone(), err.kind(), err.to_string(), now_ms)
        }
    }
}
