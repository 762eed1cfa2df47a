use axum::{
    body::Bytes,
    extract::State,
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::{
    state::{AppState, SourceStatus, StockView},
    ws,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/stock", get(latest_stock).post(push_stock))
        .route("/api/stock/latest", get(latest_stock).post(push_stock))
        .route("/api/sources", get(source_statuses))
        .route("/ws/stock", get(ws::stock_socket))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

#[derive(Debug, Serialize)]
struct PushAccepted {
    success: bool,
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct PushRejected {
    error: String,
}

async fn latest_stock(State(state): State<AppState>) -> Json<StockView> {
    Json(state.latest_stock())
}

async fn source_statuses(State(state): State<AppState>) -> Json<Vec<SourceStatus>> {
    Json(state.source_statuses())
}

async fn push_stock(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    match state.push_snapshot(&body) {
        Ok(_) => (
            StatusCode::OK,
            Json(PushAccepted {
                success: true,
                message: "Stock data updated",
            }),
        )
            .into_response(),
        Err(rejection) => {
            warn!(reason = %rejection, "external snapshot rejected");
            (
                StatusCode::BAD_REQUEST,
                Json(PushRejected {
                    error: rejection.to_string(),
                }),
            )
                .into_response()
        }
    }
}
