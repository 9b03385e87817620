//! Ingestion worker: applies analyzer results to the graph store.
//!
//! Per message: resolve the result into a graph delta, replace the file's
//! previous state, upsert nodes (opportunistically resolving pendings),
//! upsert relationships (converting unmatchable ones into pendings),
//! apply deletions, then run one pending-resolution pass. A background
//! task drains all pendings on an interval with overlap protection.

use std::sync::Arc;

use tracing::{error, info, warn};

use codeloom_common::{AnalyzerResult, Config, GraphDelta};
use codeloom_graph::{GraphError, GraphWriter, WriteStats};
use codeloom_identity::normalize_path;
use codeloom_queue::{JobConsumer, WorkQueue};

/// Apply one analyzer result end to end.
pub async fn apply_result(
    writer: &GraphWriter,
    result: &AnalyzerResult,
    batch_size: usize,
) -> Result<WriteStats, GraphError> {
    let delta = codeloom_resolver::aggregate(std::slice::from_ref(result));
    apply_delta(writer, &delta, Some(&normalize_path(&result.file_path)), batch_size).await
}

/// Apply a resolved delta. When `replaced_file` is set and the delta
/// carries nodes for it, graph state owned by that file which the delta
/// no longer contains is pruned first, so re-analysis fully replaces the
/// previous version.
pub async fn apply_delta(
    writer: &GraphWriter,
    delta: &GraphDelta,
    replaced_file: Option<&str>,
    batch_size: usize,
) -> Result<WriteStats, GraphError> {
    if let Some(file_path) = replaced_file {
        let keep_gids: Vec<String> = delta
            .nodes
            .iter()
            .filter(|n| n.file_path == file_path)
            .map(|n| n.gid.clone())
            .collect();
        if !keep_gids.is_empty() {
            let file_gids: std::collections::HashSet<&str> =
                keep_gids.iter().map(String::as_str).collect();
            let keep_edges: Vec<String> = delta
                .relationships
                .iter()
                .filter(|r| file_gids.contains(r.source_gid.as_str()))
                .map(|r| {
                    format!(
                        "{}|{}|{}",
                        r.source_gid,
                        r.rel_type.as_str(),
                        r.target_canonical_id
                    )
                })
                .collect();
            writer.prune_stale_file(file_path, &keep_gids, &keep_edges).await?;
        }
    }

    let mut stats = writer.upsert_nodes(&delta.nodes).await?;
    stats.relationships_written = writer.upsert_relationships(&delta.relationships).await?;
    stats.nodes_deleted = writer.delete_nodes(&delta.nodes_deleted).await?;
    writer.delete_relationships(&delta.relationships_deleted).await?;
    stats.pendings_resolved += writer.resolve_all_pendings(batch_size).await?;
    Ok(stats)
}

/// Consume the results queue until the connection closes or ctrl-c.
pub async fn run(
    config: &Config,
    queue: Arc<dyn WorkQueue>,
    writer: Arc<GraphWriter>,
) -> anyhow::Result<()> {
    let results_queue = config.results_queue();
    queue.declare(&results_queue).await?;
    let mut consumer = queue.consume(&results_queue, "ingestion-worker").await?;

    let drain = spawn_drain(
        writer.clone(),
        config.relationship_resolution_interval_secs,
        config.relationship_batch_size,
    );

    info!(queue = results_queue, "ingestion worker started");
    consume_loop(&mut consumer, &writer, config.relationship_batch_size).await?;

    // Stop the scheduler, then run one final bounded drain so pendings
    // made resolvable by the last messages are not left for the restart.
    drain.abort();
    let final_drain = writer.resolve_all_pendings(config.relationship_batch_size);
    let timeout = std::time::Duration::from_secs(config.graceful_shutdown_timeout_secs);
    match tokio::time::timeout(timeout, final_drain).await {
        Ok(Ok(resolved)) if resolved > 0 => info!(resolved, "final drain complete"),
        Ok(Ok(_)) => {}
        Ok(Err(e)) => warn!(error = %e, "final drain failed"),
        Err(_) => warn!("final drain timed out"),
    }
    info!("ingestion worker stopped");
    Ok(())
}

async fn consume_loop(
    consumer: &mut JobConsumer,
    writer: &GraphWriter,
    batch_size: usize,
) -> anyhow::Result<()> {
    loop {
        let delivery = tokio::select! {
            delivery = consumer.next() => delivery,
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
        };
        let Some(delivery) = delivery else {
            warn!("results queue closed");
            break;
        };
        let delivery = match delivery {
            Ok(d) => d,
            Err(e) => {
                error!(error = %e, "consume error");
                continue;
            }
        };

        let result: AnalyzerResult = match serde_json::from_slice(delivery.payload()) {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "rejecting malformed analyzer result");
                delivery.reject().await?;
                continue;
            }
        };

        match apply_result(writer, &result, batch_size).await {
            Ok(stats) => {
                info!(
                    file = result.file_path,
                    nodes = stats.nodes_upserted,
                    relationships = stats.relationships_written,
                    resolved = stats.pendings_resolved,
                    deleted = stats.nodes_deleted,
                    "result ingested"
                );
                delivery.ack().await?;
            }
            Err(e) => {
                // Store unavailability is transient; requeue and retry.
                error!(error = %e, file = result.file_path, "ingestion failed, requeueing");
                delivery.nack_requeue().await?;
            }
        }
    }
    Ok(())
}

/// Periodic pending drain. Runs on a single task, so drains never
/// overlap; a tick that fires mid-drain is delayed, not stacked.
pub fn spawn_drain(
    writer: Arc<GraphWriter>,
    interval_secs: u64,
    batch_size: usize,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(interval_secs.max(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        interval.tick().await; // first tick fires immediately; skip it
        loop {
            interval.tick().await;
            if let Err(e) = writer.resolve_all_pendings(batch_size).await {
                error!(error = %e, "periodic pending resolution failed");
            }
        }
    })
}
