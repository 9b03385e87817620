use std::path::Path;
use std::process::exit;
use std::sync::Arc;

use tracing::error;
use tracing_subscriber::EnvFilter;

use codeloom_common::Config;
use codeloom_queue::AmqpQueue;
use codeloom_watcher::watcher;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("codeloom=info")),
        )
        .init();

    let config = match Config::watcher_from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "configuration error");
            exit(2);
        }
    };
    config.log_summary();

    let root = Path::new(&config.codebase_root);
    if !root.is_dir() {
        error!(root = config.codebase_root, "watch root does not exist");
        exit(2);
    }

    let queue = match AmqpQueue::connect(&config.amqp_url).await {
        Ok(queue) => Arc::new(queue),
        Err(e) => {
            error!(error = %e, "cannot connect to broker");
            exit(2);
        }
    };

    // The observer must stay alive for the lifetime of the event loop.
    let (_observer, events) = match watcher::spawn_observer(root) {
        Ok(pair) => pair,
        Err(e) => {
            error!(error = %e, root = config.codebase_root, "cannot bind watcher to root");
            exit(2);
        }
    };

    if let Err(e) = watcher::run(&config, queue, events).await {
        error!(error = %e, "watcher failed");
        exit(1);
    }
}
