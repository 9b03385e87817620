use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::state::ApiState;

const API_KEY_HEADER: &str = "x-api-key";

/// Substrings that mark a query as destructive. The proxy is read-only;
/// mutations go through the pipeline.
const FORBIDDEN: [&str; 7] = [
    "delete", "detach", "remove", "drop", "call dbms", "apoc.", "load csv",
];

#[derive(Debug, Deserialize)]
pub struct CypherQuery {
    pub query: String,
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

pub fn is_destructive(query: &str) -> bool {
    let lowered = query.to_lowercase();
    FORBIDDEN.iter().any(|f| lowered.contains(f))
}

pub async fn execute_cypher(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<CypherQuery>,
) -> (StatusCode, Json<serde_json::Value>) {
    let presented = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if presented != state.api_key {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Invalid or missing API key"})),
        );
    }

    if is_destructive(&body.query) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": "Destructive queries are not allowed via proxy"})),
        );
    }

    match state.client.execute_json(&body.query, &body.params).await {
        Ok(rows) => (StatusCode::OK, Json(json!({ "results": rows }))),
        Err(e) => {
            warn!(error = %e, "proxied query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"detail": format!("Failed to execute Cypher query: {e}")})),
            )
        }
    }
}
