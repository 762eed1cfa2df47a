use std::sync::Arc;

use api::AppState;
use axum::{routing::get, Router};
use runtime::{ClientBuildError, Poller, PollerConfig, ReqwestFetch};
use stock_core::{ConsensusEngine, ProviderRegistry, SnapshotStore};

use crate::config::Config;

pub fn build_app(state: AppState) -> Router {
    api::app(state).route("/health", get(healthcheck))
}

pub fn build_poller(
    config: &Config,
    registry: Arc<ProviderRegistry>,
    store: Arc<SnapshotStore>,
) -> Result<Poller<ReqwestFetch>, ClientBuildError> {
    let client = ReqwestFetch::new(config.fetch_timeout, config.http_proxy.as_deref())?;

    Ok(Poller::new(
        client,
        registry,
        store,
        ConsensusEngine::new(config.freshness),
        PollerConfig {
            interval: config.poll_interval,
            fetch_timeout: config.fetch_timeout,
        },
    ))
}

async fn healthcheck() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;

    use api::AppState;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use stock_core::{FreshnessPolicy, ProviderRegistry, ProviderSpec, SnapshotStore};
    use tower::ServiceExt;

    use crate::config::Config;

    fn registry() -> Arc<ProviderRegistry> {
        Arc::new(ProviderRegistry::new(vec![ProviderSpec {
            id: "alpha".into(),
            url: "http://alpha.test".to_string(),
            name: "Alpha".to_string(),
        }]))
    }

    fn config(proxy: Option<&str>) -> Config {
        Config {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            providers_file: "providers.json".to_string(),
            poll_interval: Duration::from_millis(5_000),
            fetch_timeout: Duration::from_millis(1_000),
            http_proxy: proxy.map(str::to_string),
            freshness: FreshnessPolicy::default(),
        }
    }

    #[tokio::test]
    async fn server_healthcheck_responds_ok() {
        let state = AppState::new(Arc::new(SnapshotStore::new(0)), registry());
        let app = super::build_app(state);

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn poller_builds_with_and_without_proxy() {
        let store = Arc::new(SnapshotStore::new(0));

        let direct = super::build_poller(&config(None), registry(), Arc::clone(&store)).unwrap();
        let proxied = super::build_poller(
            &config(Some("http://proxy.local:3128")),
            registry(),
            store,
        )
        .unwrap();

        assert_eq!(direct.cycles_run(), 0);
        assert_eq!(proxied.cycles_run(), 0);
    }
}
