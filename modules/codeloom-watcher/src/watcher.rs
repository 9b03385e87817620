use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use codeloom_common::{AnalysisJob, Config, EventType};
use codeloom_queue::{Publisher, WorkQueue};

use crate::{Debouncer, PathFilter};

/// A raw filesystem event, already mapped to the pipeline's event kinds.
#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub event_type: EventType,
}

/// Bridge a notify observer into a tokio channel. The observer thread
/// only maps and forwards; all filtering happens on the consumer side.
pub fn spawn_observer(
    root: &Path,
) -> notify::Result<(RecommendedWatcher, mpsc::UnboundedReceiver<WatchEvent>)> {
    let (tx, rx) = mpsc::unbounded_channel();

    let mut watcher =
        notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| match res {
            Ok(event) => {
                let event_type = match event.kind {
                    notify::EventKind::Create(_) => EventType::Created,
                    notify::EventKind::Modify(_) => EventType::Modified,
                    notify::EventKind::Remove(_) => EventType::Deleted,
                    _ => return,
                };
                for path in event.paths {
                    let _ = tx.send(WatchEvent { path, event_type });
                }
            }
            Err(e) => error!(error = %e, "filesystem watch error"),
        })?;

    watcher.watch(root, RecursiveMode::Recursive)?;
    Ok((watcher, rx))
}

/// Consume watch events until ctrl-c: filter, debounce, route by
/// extension, publish.
pub async fn run(
    config: &Config,
    queue: Arc<dyn WorkQueue>,
    mut events: mpsc::UnboundedReceiver<WatchEvent>,
) -> anyhow::Result<()> {
    let root = PathBuf::from(&config.codebase_root);
    let filter = PathFilter::new(&config.ignored_patterns);
    let mut debouncer = Debouncer::new(config.debounce_ms);
    let publisher = Publisher::new(
        queue.clone(),
        config.publish_max_retries,
        config.publish_base_backoff_ms,
    );

    // Declare every per-language queue up front so jobs are durable even
    // before the analyzers come up.
    let mut languages: Vec<&String> = config.extension_languages.values().collect();
    languages.sort();
    languages.dedup();
    for language in languages {
        queue.declare(&config.analysis_queue(language)).await?;
    }

    info!(root = %root.display(), debounce_ms = config.debounce_ms, "watcher started");

    loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
        };
        let Some(event) = event else {
            warn!("observer channel closed");
            break;
        };

        // Directory churn is invisible to the graph; only files matter.
        if event.event_type != EventType::Deleted && event.path.is_dir() {
            continue;
        }
        if filter.is_ignored(&event.path) {
            debug!(path = %event.path.display(), "ignored path");
            continue;
        }

        // DELETED skips the extension allow-check conceptually, but a
        // queue is still chosen by extension; an unmapped extension never
        // produced graph state to clean up.
        let Some(language) = config.language_for(&event.path) else {
            debug!(path = %event.path.display(), "no analyzer for extension");
            continue;
        };
        let language = language.to_string();

        if !debouncer.should_emit(&event.path, event.event_type) {
            debug!(path = %event.path.display(), "debounced");
            continue;
        }

        let relative = event
            .path
            .strip_prefix(&root)
            .unwrap_or(&event.path)
            .to_string_lossy()
            .replace('\\', "/");

        let job = AnalysisJob {
            file_path: relative.clone(),
            event_type: event.event_type,
            id: None,
        };
        let payload = serde_json::to_vec(&job)?;
        let queue_name = config.analysis_queue(&language);
        match publisher.publish_with_retry(&queue_name, payload).await {
            Ok(()) => {
                info!(file = relative, event = %event.event_type, queue = queue_name, "published job")
            }
            Err(e) => {
                // No on-disk spill; a bulk scan is the recovery mechanism.
                error!(error = %e, file = relative, "job dropped after retry budget")
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn observer_reports_file_creation() {
        let dir = tempfile::tempdir().unwrap();
        let (_watcher, mut rx) = spawn_observer(dir.path()).unwrap();

        std::fs::write(dir.path().join("fresh.py"), "x = 1\n").unwrap();

        let event = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .expect("filesystem event within timeout")
            .expect("channel open");
        assert!(event.path.ends_with("fresh.py"));
        assert!(matches!(
            event.event_type,
            EventType::Created | EventType::Modified
        ));
    }
}
