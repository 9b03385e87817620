use std::collections::HashMap;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::state::ApiState;

#[derive(Debug, Serialize, Deserialize)]
pub struct WatchedDirs {
    pub watched_dirs: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IgnoredPatterns {
    pub ignored_patterns: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LangExtensionMap {
    pub lang_extension_map: HashMap<String, String>,
}

pub async fn get_watched_dirs(State(state): State<ApiState>) -> Json<WatchedDirs> {
    let settings = state.settings.read().await;
    Json(WatchedDirs {
        watched_dirs: settings.watched_dirs.clone(),
    })
}

pub async fn set_watched_dirs(
    State(state): State<ApiState>,
    Json(body): Json<WatchedDirs>,
) -> Json<WatchedDirs> {
    let mut settings = state.settings.write().await;
    settings.watched_dirs = body.watched_dirs;
    Json(WatchedDirs {
        watched_dirs: settings.watched_dirs.clone(),
    })
}

pub async fn get_ignored_patterns(State(state): State<ApiState>) -> Json<IgnoredPatterns> {
    let settings = state.settings.read().await;
    Json(IgnoredPatterns {
        ignored_patterns: settings.ignored_patterns.clone(),
    })
}

pub async fn set_ignored_patterns(
    State(state): State<ApiState>,
    Json(body): Json<IgnoredPatterns>,
) -> Json<IgnoredPatterns> {
    let mut settings = state.settings.write().await;
    settings.ignored_patterns = body.ignored_patterns;
    Json(IgnoredPatterns {
        ignored_patterns: settings.ignored_patterns.clone(),
    })
}

pub async fn get_lang_extension_map(State(state): State<ApiState>) -> Json<LangExtensionMap> {
    let settings = state.settings.read().await;
    Json(LangExtensionMap {
        lang_extension_map: settings.lang_extension_map.clone(),
    })
}

pub async fn set_lang_extension_map(
    State(state): State<ApiState>,
    Json(body): Json<LangExtensionMap>,
) -> Json<LangExtensionMap> {
    let mut settings = state.settings.write().await;
    settings.lang_extension_map = body.lang_extension_map;
    Json(LangExtensionMap {
        lang_extension_map: settings.lang_extension_map.clone(),
    })
}
