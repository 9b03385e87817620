use std::process::exit;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use codeloom_common::{Config, ScanRequest, SCAN_ACTION_FULL};
use codeloom_queue::{AmqpQueue, WorkQueue};
use codeloom_scanner::{dispatch_scan, wipe_side_tables};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("codeloom=info")),
        )
        .init();

    let config = match Config::scanner_from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "configuration error");
            exit(2);
        }
    };
    config.log_summary();

    let queue = match AmqpQueue::connect(&config.amqp_url).await {
        Ok(queue) => Arc::new(queue),
        Err(e) => {
            error!(error = %e, "cannot connect to broker");
            exit(2);
        }
    };

    // One-shot mode: scan the path given on the command line and exit.
    if let Some(root_path) = std::env::args().nth(1) {
        match dispatch_scan(&config, queue, &root_path).await {
            Ok(count) => {
                info!(root = root_path, dispatched = count, "one-shot scan complete");
                return;
            }
            Err(e) => {
                error!(error = %e, "one-shot scan failed");
                exit(1);
            }
        }
    }

    if let Err(e) = consume_scan_triggers(&config, queue).await {
        error!(error = %e, "scanner failed");
        exit(1);
    }
}

async fn consume_scan_triggers(config: &Config, queue: Arc<AmqpQueue>) -> anyhow::Result<()> {
    let scan_queue = config.scan_queue();
    queue.declare(&scan_queue).await?;
    let mut consumer = queue.consume(&scan_queue, "scanner").await?;
    info!(queue = scan_queue, "scanner started");

    loop {
        let delivery = tokio::select! {
            delivery = consumer.next() => delivery,
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
        };
        let Some(delivery) = delivery else {
            warn!("scan queue closed");
            break;
        };
        let delivery = match delivery {
            Ok(d) => d,
            Err(e) => {
                error!(error = %e, "consume error");
                continue;
            }
        };

        let request: ScanRequest = match serde_json::from_slice(delivery.payload()) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "rejecting malformed scan trigger");
                delivery.reject().await?;
                continue;
            }
        };

        if request.action != SCAN_ACTION_FULL {
            warn!(action = request.action, "unknown scan action");
            delivery.ack().await?;
            continue;
        }
        if request.root_path.is_empty() {
            warn!("scan trigger without root_path");
            delivery.ack().await?;
            continue;
        }

        if request.wipe_existing {
            match &config.mirror_database_url {
                Some(url) => wipe_side_tables(url).await,
                None => warn!("wipe_existing requested but no mirror database configured"),
            }
        }

        let queue_for_scan: Arc<dyn WorkQueue> = queue.clone();
        match dispatch_scan(config, queue_for_scan, &request.root_path).await {
            Ok(count) => {
                info!(root = request.root_path, dispatched = count, "full scan dispatched");
                delivery.ack().await?;
            }
            Err(e) => {
                // A bad root is permanent; requeueing would loop forever.
                error!(error = %e, root = request.root_path, "scan failed");
                delivery.ack().await?;
            }
        }
    }
    Ok(())
}
