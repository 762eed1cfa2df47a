pub mod routes;
pub mod state;
pub mod ws;

use axum::Router;

pub use state::{AppState, PushRejection, SourceStatus, StockView};

pub fn app(state: AppState) -> Router {
    routes::router(state)
}
