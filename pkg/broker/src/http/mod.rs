//! The broker's HTTP surface (§6): `/publish`, `/data/{topic}`,
//! `/heartbeat`, `/leader_announcement`, `/leader`.

mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::app::BrokerApp;

#[derive(Clone)]
pub struct AppState {
    pub app: Arc<BrokerApp>,
}

pub fn router(app: Arc<BrokerApp>) -> Router {
    let state = AppState { app };
    Router::new()
        .route("/publish", post(handlers::publish))
        .route("/data/:topic", get(handlers::fetch))
        .route("/heartbeat", get(handlers::heartbeat))
        .route("/leader_announcement", post(handlers::leader_announcement))
        .route("/leader", get(handlers::leader))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
