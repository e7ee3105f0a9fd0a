use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use trellis_core::event::EventBus;
use trellis_core::types::{GraphEvent, RunId};

/// JSONL run logger.
///
/// Subscribes to the EventBus and writes one JSON object per line for the
/// events of a single run. Lines are flushed as they are written, so a log
/// cut short by a crash is still readable up to the last event.
pub struct RunLogger {
    log_dir: PathBuf,
    level: u8,
}

/// A single log line.
#[derive(Serialize)]
struct LogEntry {
    timestamp: String,
    run_id: String,
    event_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    node: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    step: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<serde_json::Value>,
}

impl RunLogger {
    /// Logs go to `{log_dir}/{run_id}/{timestamp}.jsonl`.
    /// `level`: 1 = run start and end, 2 = every node.
    pub fn new(log_dir: PathBuf, level: u8) -> Self {
        Self { log_dir, level }
    }

    /// Path of the file a run started now would log to.
    pub fn log_path(&self, run_id: &RunId) -> PathBuf {
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        self.log_dir
            .join(&run_id.0)
            .join(format!("{}.jsonl", timestamp))
    }

    /// Subscribe to `event_bus` and write events for `run_id` on a
    /// background task.
    ///
    /// The subscription is taken before this returns, so a run started
    /// afterwards is logged from its first event. The task ends when the run
    /// completes or fails, the bus closes, or `cancel` fires.
    pub fn spawn(
        self,
        event_bus: &EventBus,
        run_id: RunId,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let rx = event_bus.subscribe();
        tokio::spawn(self.run(rx, run_id, cancel))
    }

    async fn run(
        self,
        mut rx: broadcast::Receiver<GraphEvent>,
        run_id: RunId,
        cancel: CancellationToken,
    ) {
        let log_path = self.log_path(&run_id);

        let mut writer = match open_log(&log_path).await {
            Ok(w) => w,
            Err(e) => {
                error!(error = %e, path = %log_path.display(), "Failed to open run log");
                return;
            }
        };
        info!(path = %log_path.display(), "RunLogger started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("RunLogger cancelled");
                    break;
                }
                result = rx.recv() => {
                    match result {
                        Ok(event) => {
                            if event.run_id() != &run_id {
                                continue;
                            }
                            let finished = matches!(
                                event,
                                GraphEvent::RunComplete { .. } | GraphEvent::RunError { .. }
                            );
                            if let Some(entry) = self.event_to_entry(&event) {
                                if let Ok(json) = serde_json::to_string(&entry) {
                                    let line = format!("{}\n", json);
                                    if let Err(e) = writer.write_all(line.as_bytes()).await {
                                        error!(error = %e, "Failed to write log entry");
                                        break;
                                    }
                                    if let Err(e) = writer.flush().await {
                                        error!(error = %e, "Failed to flush log");
                                    }
                                }
                            }
                            if finished {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            debug!(skipped = n, "RunLogger lagged, skipped events");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            debug!("EventBus closed, RunLogger stopping");
                            break;
                        }
                    }
                }
            }
        }

        writer.flush().await.ok();
        debug!(path = %log_path.display(), "RunLogger finished");
    }

    /// Convert an event to a log line, or `None` if filtered by level.
    fn event_to_entry(&self, event: &GraphEvent) -> Option<LogEntry> {
        let entry = |event_type: &'static str,
                     node: Option<String>,
                     step: Option<usize>,
                     detail: Option<serde_json::Value>| LogEntry {
            timestamp: Utc::now().to_rfc3339(),
            run_id: event.run_id().0.clone(),
            event_type,
            node,
            step,
            detail,
        };

        match event {
            GraphEvent::RunStarted { entry: first, .. } => Some(entry(
                "run_started",
                None,
                None,
                Some(serde_json::json!({ "entry": first })),
            )),
            GraphEvent::RunComplete {
                total_steps,
                elapsed_ms,
                ..
            } => Some(entry(
                "run_complete",
                None,
                None,
                Some(serde_json::json!({
                    "total_steps": total_steps,
                    "elapsed_ms": elapsed_ms,
                })),
            )),
            GraphEvent::RunError { error, .. } => Some(entry(
                "run_error",
                None,
                None,
                Some(serde_json::json!({ "error": error })),
            )),

            GraphEvent::NodeStarted { node, step, .. } if self.level >= 2 => {
                Some(entry("node_started", Some(node.clone()), Some(*step), None))
            }
            GraphEvent::NodeCompleted {
                node,
                step,
                elapsed_ms,
                next,
                ..
            } if self.level >= 2 => Some(entry(
                "node_completed",
                Some(node.clone()),
                Some(*step),
                Some(serde_json::json!({
                    "elapsed_ms": elapsed_ms,
                    "next": next,
                })),
            )),

            _ => None,
        }
    }
}

async fn open_log(path: &Path) -> std::io::Result<tokio::io::BufWriter<tokio::fs::File>> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    let file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    Ok(tokio::io::BufWriter::new(file))
}
