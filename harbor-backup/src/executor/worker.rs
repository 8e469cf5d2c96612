//! Bounded pool of pull + export workers.
//!
//! `concurrency` workers drain a shared queue of references. Each worker runs
//! pull then export for one reference to completion before taking the next,
//! and sends the outcome over a channel that is drained once every worker
//! has been joined. Each reference runs in its own task awaited by the
//! worker, so a panicking tool call is recorded against that reference and
//! the worker moves on. A failed reference is recorded and skipped, it never
//! stops its siblings.

use super::archive::export_file_name;
use crate::tool::{ImageTool, ToolOutput};
use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

/// Step of the per-reference sequence that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Pull,
    Export,
    /// The pull/export task panicked or was aborted
    Panic,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureStage::Pull => write!(f, "pull"),
            FailureStage::Export => write!(f, "export"),
            FailureStage::Panic => write!(f, "panic"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub reference: String,
    pub stage: FailureStage,
    /// Error message or captured tool output
    pub detail: String,
}

/// Tally of one execution phase.
#[derive(Debug, Default)]
pub struct ExecutionReport {
    pub attempted: usize,
    pub exported: Vec<PathBuf>,
    pub failures: Vec<ItemFailure>,
}

impl ExecutionReport {
    pub fn succeeded(&self) -> usize {
        self.exported.len()
    }
}

/// Pull and export every reference into `dest` using `concurrency` workers.
///
/// Returns once every reference has been attempted exactly once.
pub async fn execute_all(
    tool: Arc<dyn ImageTool>,
    dest: &Path,
    references: Vec<String>,
    concurrency: usize,
) -> ExecutionReport {
    let total = references.len();
    let workers = concurrency.max(1).min(total.max(1));
    let queue = Arc::new(Mutex::new(VecDeque::from(references)));
    let (tx, mut rx) = mpsc::unbounded_channel::<Result<PathBuf, ItemFailure>>();

    info!("Starting {} workers for {} references", workers, total);

    let mut handles = Vec::with_capacity(workers);
    for worker_id in 0..workers {
        let queue = Arc::clone(&queue);
        let tool = Arc::clone(&tool);
        let dest = dest.to_path_buf();
        let tx = tx.clone();

        handles.push(tokio::spawn(async move {
            loop {
                let next = queue.lock().await.pop_front();
                let Some(reference) = next else { break };

                let task = tokio::spawn(process_reference(
                    Arc::clone(&tool),
                    dest.clone(),
                    reference.clone(),
                ));
                let outcome = match task.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!(reference = %reference, "Backup task panicked: {}", e);
                        Err(ItemFailure {
                            reference,
                            stage: FailureStage::Panic,
                            detail: format!("task panicked: {}", e),
                        })
                    }
                };
                if tx.send(outcome).is_err() {
                    break;
                }
            }
            debug!(worker_id, "Worker finished");
        }));
    }
    drop(tx);

    for handle in handles {
        if let Err(e) = handle.await {
            warn!("Backup worker panicked: {}", e);
        }
    }

    let mut report = ExecutionReport::default();
    while let Some(outcome) = rx.recv().await {
        report.attempted += 1;
        match outcome {
            Ok(path) => report.exported.push(path),
            Err(failure) => report.failures.push(failure),
        }
    }

    report
}

async fn process_reference(
    tool: Arc<dyn ImageTool>,
    dest: PathBuf,
    reference: String,
) -> Result<PathBuf, ItemFailure> {
    info!(reference = %reference, "Pulling");
    if let Err(detail) = check(tool.pull(&reference).await) {
        warn!(reference = %reference, output = %detail, "Pull failed, skipping reference");
        return Err(ItemFailure {
            reference,
            stage: FailureStage::Pull,
            detail,
        });
    }

    let path = dest.join(export_file_name(&reference));
    info!(reference = %reference, path = %path.display(), "Saving");
    if let Err(detail) = check(tool.export(&reference, &path).await) {
        warn!(reference = %reference, output = %detail, "Export failed, skipping reference");
        return Err(ItemFailure {
            reference,
            stage: FailureStage::Export,
            detail,
        });
    }

    info!(reference = %reference, "Saved");
    Ok(path)
}

fn check(result: crate::Result<ToolOutput>) -> Result<(), String> {
    match result {
        Ok(out) if out.success => Ok(()),
        Ok(out) => Err(out.output.trim().to_string()),
        Err(e) => Err(e.to_string()),
    }
}
