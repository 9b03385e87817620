use std::process::exit;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use codeloom_analyzer::{analyzer_for, mirror::Mirror, worker};
use codeloom_common::Config;
use codeloom_queue::AmqpQueue;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("codeloom=info")),
        )
        .init();

    let config = match Config::analyzer_from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "configuration error");
            exit(2);
        }
    };
    config.log_summary();

    let Some(analyzer) = analyzer_for(&config.analyzer_language) else {
        error!(language = config.analyzer_language, "no analyzer for language");
        exit(2);
    };
    info!(language = analyzer.language(), "starting analyzer worker");

    let queue = match AmqpQueue::connect(&config.amqp_url).await {
        Ok(queue) => Arc::new(queue),
        Err(e) => {
            error!(error = %e, "cannot connect to broker");
            exit(2);
        }
    };

    let mirror = match &config.mirror_database_url {
        Some(url) => match Mirror::connect(url).await {
            Ok(mirror) => Some(mirror),
            Err(e) => {
                error!(error = %e, "cannot connect to mirror database");
                exit(2);
            }
        },
        None => None,
    };

    if let Err(e) = worker::run(&config, queue, analyzer, mirror).await {
        error!(error = %e, "analyzer worker failed");
        exit(1);
    }
}
