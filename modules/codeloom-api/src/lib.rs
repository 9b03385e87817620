//! Thin HTTP gateway: runtime configuration endpoints, a guarded Cypher
//! query proxy, and the full-scan trigger.

pub mod config_api;
pub mod query_proxy;
pub mod scan_api;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use state::ApiState;

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route(
            "/config/watched_dirs",
            get(config_api::get_watched_dirs).post(config_api::set_watched_dirs),
        )
        .route(
            "/config/ignored_patterns",
            get(config_api::get_ignored_patterns).post(config_api::set_ignored_patterns),
        )
        .route(
            "/config/lang_extension_map",
            get(config_api::get_lang_extension_map).post(config_api::set_lang_extension_map),
        )
        .route("/proxy/cypher", post(query_proxy::execute_cypher))
        .route("/scan/trigger", post(scan_api::trigger_full_scan))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
