use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;
use tracing::{error, info};

use codeloom_queue::WorkQueue;

use crate::state::ApiState;

/// Validate and forward a scan trigger onto the scan queue. The scanner
/// worker owns the actual walk.
pub async fn trigger_full_scan(
    State(state): State<ApiState>,
    Json(body): Json<serde_json::Value>,
) -> (StatusCode, Json<serde_json::Value>) {
    let has_fields = body.get("action").and_then(|v| v.as_str()).is_some()
        && body.get("root_path").and_then(|v| v.as_str()).is_some();
    if !has_fields {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": "'action' and 'root_path' are required fields."})),
        );
    }

    let payload = match serde_json::to_vec(&body) {
        Ok(payload) => payload,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"detail": format!("Failed to trigger scan: {e}")})),
            )
        }
    };

    if let Err(e) = state.queue.declare(&state.scan_queue).await {
        error!(error = %e, "scan queue declare failed");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"detail": format!("Failed to trigger scan: {e}")})),
        );
    }
    match state.queue.publish(&state.scan_queue, payload).await {
        Ok(()) => {
            info!(queue = state.scan_queue, "scan trigger published");
            (StatusCode::OK, Json(json!({"status": "scan_triggered"})))
        }
        Err(e) => {
            error!(error = %e, "scan trigger publish failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"detail": format!("Failed to trigger scan: {e}")})),
            )
        }
    }
}
