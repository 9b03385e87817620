use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use codeloom_common::Config;
use codeloom_graph::GraphClient;
use codeloom_queue::WorkQueue;

/// Mutable gateway settings, seeded from the environment and adjustable
/// over the config endpoints. In-memory only; workers read their own env.
#[derive(Debug, Default, Clone)]
pub struct GatewaySettings {
    pub watched_dirs: Vec<String>,
    pub ignored_patterns: Vec<String>,
    pub lang_extension_map: HashMap<String, String>,
}

#[derive(Clone)]
pub struct ApiState {
    pub settings: Arc<RwLock<GatewaySettings>>,
    pub client: GraphClient,
    pub queue: Arc<dyn WorkQueue>,
    pub scan_queue: String,
    pub api_key: String,
}

impl ApiState {
    pub fn new(config: &Config, client: GraphClient, queue: Arc<dyn WorkQueue>) -> Self {
        let settings = GatewaySettings {
            watched_dirs: vec![config.codebase_root.clone()],
            ignored_patterns: config.ignored_patterns.clone(),
            lang_extension_map: config.extension_languages.clone(),
        };
        Self {
            settings: Arc::new(RwLock::new(settings)),
            client,
            queue,
            scan_queue: config.scan_queue(),
            api_key: config.api_key.clone(),
        }
    }
}
