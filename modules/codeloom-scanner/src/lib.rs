//! Bulk scanner: full-repository analysis on demand.
//!
//! Consumes scan-trigger messages, walks the requested root, and enqueues
//! one CREATED job per supported file on its language's analysis queue,
//! with bounded publish parallelism. A wiping scan first truncates the
//! analyzers' relational mirror tables; the graph itself is not wiped,
//! since re-ingestion is idempotent.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use codeloom_common::{AnalysisJob, Config, EventType, PathFilter};
use codeloom_queue::{Publisher, WorkQueue};

/// Walk `root_path` and dispatch one job per mapped file. Returns the
/// number of jobs published.
pub async fn dispatch_scan(
    config: &Config,
    queue: Arc<dyn WorkQueue>,
    root_path: &str,
) -> anyhow::Result<usize> {
    let root = PathBuf::from(root_path);
    if !root.is_dir() {
        anyhow::bail!("scan root does not exist: {root_path}");
    }

    let filter = PathFilter::new(&config.ignored_patterns);
    let semaphore = Arc::new(Semaphore::new(config.scan_workers.max(1)));
    let mut tasks: JoinSet<bool> = JoinSet::new();
    let mut skipped = 0usize;

    for entry in WalkDir::new(&root).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if filter.is_ignored(path) {
            continue;
        }
        let Some(language) = config.language_for(path) else {
            skipped += 1;
            continue;
        };

        let job = AnalysisJob {
            file_path: relative_to(path, &root),
            event_type: EventType::Created,
            id: Some(Uuid::new_v4()),
        };
        let payload = serde_json::to_vec(&job)?;
        let queue_name = config.analysis_queue(language);
        queue.declare(&queue_name).await?;

        let publisher = Publisher::new(
            queue.clone(),
            config.publish_max_retries,
            config.publish_base_backoff_ms,
        );
        let semaphore = semaphore.clone();
        tasks.spawn(async move {
            let _permit = semaphore.acquire().await.expect("semaphore never closed");
            publisher.publish_with_retry(&queue_name, payload).await.is_ok()
        });
    }

    let mut dispatched = 0usize;
    while let Some(joined) = tasks.join_next().await {
        if matches!(joined, Ok(true)) {
            dispatched += 1;
        }
    }

    info!(root = root_path, dispatched, skipped, "scan dispatch complete");
    Ok(dispatched)
}

fn relative_to(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Truncate the analyzers' relational mirror tables before a wiping scan.
pub async fn wipe_side_tables(database_url: &str) {
    let pool = match sqlx::postgres::PgPoolOptions::new()
        .max_connections(1)
        .connect(database_url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            warn!(error = %e, "cannot connect to mirror database, skipping wipe");
            return;
        }
    };
    match sqlx::query("TRUNCATE TABLE code_nodes, code_relationships")
        .execute(&pool)
        .await
    {
        Ok(_) => info!("mirror tables truncated"),
        Err(e) => warn!(error = %e, "mirror wipe failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeloom_queue::MemoryQueue;

    fn test_config() -> Config {
        let mut config = Config::scanner_from_env().unwrap();
        config.scan_workers = 4;
        config.publish_base_backoff_ms = 1;
        config
    }

    #[tokio::test]
    async fn dispatches_one_job_per_mapped_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "x = 1\n").unwrap();
        std::fs::write(dir.path().join("schema.sql"), "CREATE TABLE t(id INT);").unwrap();
        std::fs::write(dir.path().join("README.md"), "# nope\n").unwrap();
        std::fs::create_dir(dir.path().join("node_modules")).unwrap();
        std::fs::write(dir.path().join("node_modules/x.py"), "x = 1\n").unwrap();

        let config = test_config();
        let queue = Arc::new(MemoryQueue::new());
        let dispatched = dispatch_scan(&config, queue.clone(), dir.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(dispatched, 2);

        let mut python = queue
            .consume(&config.analysis_queue("python"), "t")
            .await
            .unwrap();
        let delivery = python.next().await.unwrap().unwrap();
        let job: AnalysisJob = serde_json::from_slice(delivery.payload()).unwrap();
        assert_eq!(job.file_path, "a.py");
        assert_eq!(job.event_type, EventType::Created);
        assert!(job.id.is_some());
    }

    #[tokio::test]
    async fn missing_roots_are_an_error() {
        let config = test_config();
        let queue = Arc::new(MemoryQueue::new());
        assert!(dispatch_scan(&config, queue, "/no/such/dir").await.is_err());
    }
}
