use std::process::exit;
use std::sync::Arc;

use tracing::error;
use tracing_subscriber::EnvFilter;

use codeloom_common::Config;
use codeloom_graph::{migrate, GraphClient, GraphWriter};
use codeloom_queue::AmqpQueue;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("codeloom=info")),
        )
        .init();

    let config = match Config::ingest_from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "configuration error");
            exit(2);
        }
    };
    config.log_summary();

    let client = match GraphClient::connect(
        &config.neo4j_uri,
        &config.neo4j_user,
        &config.neo4j_password,
    )
    .await
    {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "cannot connect to graph store");
            exit(2);
        }
    };

    if let Err(e) = migrate::migrate(&client).await {
        error!(error = %e, "schema migration failed");
        exit(2);
    }

    let queue = match AmqpQueue::connect(&config.amqp_url).await {
        Ok(queue) => Arc::new(queue),
        Err(e) => {
            error!(error = %e, "cannot connect to broker");
            exit(2);
        }
    };

    let writer = Arc::new(GraphWriter::new(client));
    if let Err(e) = codeloom_ingest::run(&config, queue, writer).await {
        error!(error = %e, "ingestion worker failed");
        exit(1);
    }
}
