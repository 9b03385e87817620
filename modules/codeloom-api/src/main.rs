use std::process::exit;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use codeloom_api::state::ApiState;
use codeloom_common::Config;
use codeloom_graph::GraphClient;
use codeloom_queue::AmqpQueue;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("codeloom=info")),
        )
        .init();

    let config = match Config::api_from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "configuration error");
            exit(2);
        }
    };

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

    let queue = match AmqpQueue::connect(&config.amqp_url).await {
        Ok(queue) => Arc::new(queue),
        Err(e) => {
            error!(error = %e, "cannot connect to broker");
            exit(2);
        }
    };

    let state = ApiState::new(&config, client, queue);
    let app = codeloom_api::router(state);

    let addr = format!("{}:{}", config.api_host, config.api_port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, addr, "cannot bind gateway address");
            exit(2);
        }
    };
    info!(addr, "gateway listening");

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "gateway failed");
        exit(1);
    }
}
