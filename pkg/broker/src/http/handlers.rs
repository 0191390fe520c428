use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use broker_core::{BrokerId, Message};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::AppState;

#[derive(Deserialize)]
pub struct PublishRequest {
    topic: String,
    message: String,
    #[serde(default)]
    message_id: Option<String>,
}

/// Local client publish or peer forward — both arrive here (§6). A
/// missing `message_id` means this is a fresh local publish, so one is
/// minted; a forwarded message always carries the id its origin minted.
pub async fn publish(State(state): State<AppState>, Json(req): Json<PublishRequest>) -> Response {
    let message_id = req.message_id.unwrap_or_else(Message::generate_id);
    match state.app.dissemination.on_forwarded(&req.topic, &req.message, &message_id).await {
        Ok(outcome) if outcome.is_stored() => (StatusCode::OK, Json(json!({"status": "success"}))).into_response(),
        Ok(_duplicate) => {
            (StatusCode::OK, Json(json!({"status": "failure", "message": "Duplicate message id"}))).into_response()
        }
        Err(crate::dissemination::DisseminationError::QueueFull) => {
            tracing::warn!("publish rejected, retry queue at capacity");
            (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"status": "error", "message": "retry queue at capacity"})))
                .into_response()
        }
        Err(err) => {
            tracing::warn!(error = %err, "publish failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"status": "error", "message": err.to_string()})))
                .into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct FetchParams {
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    offset: Option<usize>,
}

/// Paginated read of a topic's stored messages (§6).
pub async fn fetch(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    Query(params): Query<FetchParams>,
) -> Response {
    let limit = params.limit.unwrap_or(usize::MAX);
    let offset = params.offset.unwrap_or(0);
    match state.app.store().fetch(&topic, limit, offset).await {
        Ok(messages) => Json(json!({"topic": topic, "messages": messages})).into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "fetch failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"status": "error", "message": err.to_string()})))
                .into_response()
        }
    }
}

/// Liveness probe target for peers' failure detectors (§4.2, §6).
pub async fn heartbeat() -> StatusCode {
    StatusCode::OK
}

#[derive(Deserialize)]
pub struct LeaderAnnouncementRequest {
    leader_id: BrokerId,
}

pub async fn leader_announcement(State(state): State<AppState>, Json(req): Json<LeaderAnnouncementRequest>) -> Response {
    state.app.election.on_leader_announcement(req.leader_id);
    (StatusCode::OK, Json(json!({"status": "success"}))).into_response()
}

#[derive(Serialize)]
pub struct LeaderResponse {
    leader: Option<BrokerId>,
}

/// Ambient observability endpoint for inspecting current leader belief
/// (§6, not part of the bully protocol itself).
pub async fn leader(State(state): State<AppState>) -> Json<LeaderResponse> {
    Json(LeaderResponse { leader: state.app.election.current_leader() })
}
