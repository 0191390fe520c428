//! Reference registry service (§4.6): the external collaborator that
//! Membership registers with and polls. Holds the roster as an in-memory set
//! behind a lock; no durability, no auth. Any conforming HTTP service is a
//! drop-in replacement — this binary exists purely so the cluster is
//! runnable end to end.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde::Deserialize;

pub type BrokerId = u64;

#[derive(Default)]
struct Roster {
    members: HashSet<BrokerId>,
}

#[derive(Clone)]
pub struct RegistryState {
    roster: Arc<Mutex<Roster>>,
}

impl RegistryState {
    pub fn new() -> Self {
        RegistryState { roster: Arc::new(Mutex::new(Roster::default())) }
    }
}

impl Default for RegistryState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct RegisterRequest {
    broker_id: BrokerId,
}

pub fn router(state: RegistryState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/remove/:broker_id", delete(remove))
        .route("/members", get(members))
        .with_state(state)
}

async fn register(State(state): State<RegistryState>, Json(req): Json<RegisterRequest>) -> StatusCode {
    let mut roster = state.roster.lock();
    if roster.members.insert(req.broker_id) {
        tracing::info!(broker_id = req.broker_id, "broker registered");
    } else {
        tracing::info!(broker_id = req.broker_id, "broker already registered");
    }
    StatusCode::OK
}

async fn remove(State(state): State<RegistryState>, Path(broker_id): Path<BrokerId>) -> StatusCode {
    let mut roster = state.roster.lock();
    if roster.members.remove(&broker_id) {
        tracing::info!(broker_id, "broker removed from registry");
        StatusCode::OK
    } else {
        tracing::warn!(broker_id, "remove requested for unknown broker");
        StatusCode::NOT_FOUND
    }
}

async fn members(State(state): State<RegistryState>) -> Json<Vec<BrokerId>> {
    let roster = state.roster.lock();
    Json(roster.members.iter().copied().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> Router {
        router(RegistryState::new())
    }

    #[tokio::test]
    async fn register_then_list_then_remove() {
        let app = app();

        let resp = app
            .clone()
            .oneshot(
                Request::post("/register")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"broker_id":1}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app.clone().oneshot(Request::get("/members").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let members: Vec<BrokerId> = serde_json::from_slice(&body).unwrap();
        assert_eq!(members, vec![1]);

        let resp = app.clone().oneshot(Request::delete("/remove/1").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app.oneshot(Request::get("/members").body(Body::empty()).unwrap()).await.unwrap();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let members: Vec<BrokerId> = serde_json::from_slice(&body).unwrap();
        assert!(members.is_empty());
    }

    #[tokio::test]
    async fn removing_unknown_broker_is_404() {
        let app = app();
        let resp = app.oneshot(Request::delete("/remove/99").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn double_register_is_idempotent() {
        let app = app();
        for _ in 0..2 {
            let resp = app
                .clone()
                .oneshot(
                    Request::post("/register")
                        .header("content-type", "application/json")
                        .body(Body::from(r#"{"broker_id":7}"#))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
        }
        let resp = app.oneshot(Request::get("/members").body(Body::empty()).unwrap()).await.unwrap();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let members: Vec<BrokerId> = serde_json::from_slice(&body).unwrap();
        assert_eq!(members, vec![7]);
    }
}
