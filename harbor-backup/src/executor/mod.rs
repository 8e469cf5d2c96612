//! Backup run orchestration.
//!
//! A run moves through `Initializing -> Enumerating -> (DeltaComputing) ->
//! PersistingManifest -> Executing -> Completed`. Any error before
//! `Executing` moves the run to `Failed`; per-reference failures during
//! `Executing` are tallied in the report instead.

pub mod archive;
pub mod manifest;
pub mod worker;

use crate::config::BackupConfig;
use crate::resolver::ReferenceSource;
use crate::store::BaselineStore;
use crate::sync::delta::{compute_delta, delta_ratio};
use crate::tool::ImageTool;
use crate::utils::errors::{BackupError, Result};
use chrono::{DateTime, Local};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use worker::{execute_all, ItemFailure};

/// Timestamp layout of run directory names, nanosecond precision.
const RUN_DIR_TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S%.9f";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupKind {
    Full,
    Delta,
}

impl BackupKind {
    /// Run directory prefix
    pub fn prefix(&self) -> &'static str {
        match self {
            BackupKind::Full => "full_",
            BackupKind::Delta => "delta_",
        }
    }
}

impl fmt::Display for BackupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupKind::Full => write!(f, "full"),
            BackupKind::Delta => write!(f, "delta"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Initializing,
    Enumerating,
    DeltaComputing,
    PersistingManifest,
    Executing,
    Completed,
    Failed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Initializing => "initializing",
            RunPhase::Enumerating => "enumerating",
            RunPhase::DeltaComputing => "delta-computing",
            RunPhase::PersistingManifest => "persisting-manifest",
            RunPhase::Executing => "executing",
            RunPhase::Completed => "completed",
            RunPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Working set was processed; see the failure tally
    Completed,
    /// Delta run found nothing new since the baseline
    NothingToDo,
}

/// Summary of a run that got past setup.
#[derive(Debug)]
pub struct RunReport {
    pub kind: BackupKind,
    /// Run directory; already removed again when the outcome is `NothingToDo`
    pub directory: PathBuf,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub elapsed: Duration,
    /// Size of the working set
    pub total: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub failures: Vec<ItemFailure>,
    pub outcome: RunOutcome,
}

impl RunReport {
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Every reference of the working set was attempted and none failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.attempted == self.total
    }
}

/// Run-level settings taken from the `[backup]` config section.
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub root: PathBuf,
    pub concurrency: usize,
    pub manifest_name: String,
    pub diff_name: String,
}

impl From<&BackupConfig> for ExecutorSettings {
    fn from(config: &BackupConfig) -> Self {
        Self {
            root: config.root.clone(),
            concurrency: config.concurrency,
            manifest_name: config.manifest_name.clone(),
            diff_name: config.diff_name.clone(),
        }
    }
}

/// Phase tracker for one run, logs every transition.
struct RunState {
    kind: BackupKind,
    phase: RunPhase,
}

impl RunState {
    fn enter(&mut self, phase: RunPhase) {
        info!(kind = %self.kind, "Backup phase: {} -> {}", self.phase, phase);
        self.phase = phase;
    }
}

pub struct BackupOrchestrator {
    source: Arc<dyn ReferenceSource>,
    store: Arc<dyn BaselineStore>,
    tool: Arc<dyn ImageTool>,
    settings: ExecutorSettings,
}

impl BackupOrchestrator {
    pub fn new(
        source: Arc<dyn ReferenceSource>,
        store: Arc<dyn BaselineStore>,
        tool: Arc<dyn ImageTool>,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            source,
            store,
            tool,
            settings,
        }
    }

    /// Execute one backup run.
    ///
    /// Returns `Err` only when setup fails. A report with a non-empty
    /// `failures` list is still a completed run.
    pub async fn run(&self, kind: BackupKind) -> Result<RunReport> {
        let mut state = RunState {
            kind,
            phase: RunPhase::Initializing,
        };

        match self.run_phases(&mut state).await {
            Ok(report) => Ok(report),
            Err(e) => {
                error!(kind = %kind, phase = %state.phase, "Backup run failed: {}", e);
                state.enter(RunPhase::Failed);
                Err(e)
            }
        }
    }

    async fn run_phases(&self, state: &mut RunState) -> Result<RunReport> {
        let kind = state.kind;
        let started_at = Local::now();
        let clock = Instant::now();
        info!("Starting {} backup", kind);

        let directory = self.create_run_directory(kind, &started_at).await?;
        info!("Run directory: {}", directory.display());

        state.enter(RunPhase::Enumerating);
        let current = self.source.pullable_references().await?;
        info!("Resolved {} pullable references", current.len());

        let working_set = match kind {
            BackupKind::Full => current.clone(),
            BackupKind::Delta => {
                state.enter(RunPhase::DeltaComputing);
                let baseline = self.load_baseline().await?;
                let delta = compute_delta(&current, &baseline);
                info!(
                    "Delta: {} of {} references are new ({:.1}%)",
                    delta.len(),
                    current.len(),
                    delta_ratio(delta.len(), current.len()) * 100.0
                );

                if delta.is_empty() {
                    if let Err(e) = tokio::fs::remove_dir(&directory).await {
                        warn!("Failed to remove empty run directory {}: {}", directory.display(), e);
                    }
                    state.enter(RunPhase::Completed);
                    info!("No new references since the last full backup");
                    return Ok(finish(kind, directory, started_at, clock, 0, Default::default(), RunOutcome::NothingToDo));
                }
                delta
            }
        };

        state.enter(RunPhase::PersistingManifest);
        self.store
            .write_manifest(&directory.join(&self.settings.manifest_name), &current)
            .await?;
        match kind {
            BackupKind::Delta => {
                self.store
                    .write_manifest(&directory.join(&self.settings.diff_name), &working_set)
                    .await?;
            }
            BackupKind::Full => {
                self.store.set_last_full_backup(&directory).await?;
                info!("Last full backup pointer now at {}", directory.display());
            }
        }

        state.enter(RunPhase::Executing);
        let total = working_set.len();
        let execution = execute_all(
            Arc::clone(&self.tool),
            &directory,
            working_set.into_iter().collect(),
            self.settings.concurrency,
        )
        .await;

        state.enter(RunPhase::Completed);
        let report = finish(kind, directory, started_at, clock, total, execution, RunOutcome::Completed);

        if report.is_clean() {
            info!(
                "{} backup finished: {}/{} references saved in {:.1}s",
                kind,
                report.succeeded,
                report.total,
                report.elapsed.as_secs_f64()
            );
        } else {
            warn!(
                "{} backup finished with {} failures: {}/{} references saved in {:.1}s",
                kind,
                report.failure_count(),
                report.succeeded,
                report.total,
                report.elapsed.as_secs_f64()
            );
        }

        Ok(report)
    }

    /// Create `<root>/<prefix><timestamp>`; an existing leaf is an error, never reused.
    async fn create_run_directory(&self, kind: BackupKind, started_at: &DateTime<Local>) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.settings.root).await?;

        let name = format!("{}{}", kind.prefix(), started_at.format(RUN_DIR_TIME_FORMAT));
        let directory = self.settings.root.join(name);
        tokio::fs::create_dir(&directory).await?;
        Ok(directory)
    }

    async fn load_baseline(&self) -> Result<BTreeSet<String>> {
        let baseline_dir = self
            .store
            .last_full_backup()
            .await
            .map_err(|e| BackupError::BaselineMissing(format!("cannot read last full backup pointer: {}", e)))?
            .ok_or_else(|| BackupError::BaselineMissing("no full backup has been recorded".to_string()))?;

        let manifest_path = baseline_dir.join(&self.settings.manifest_name);
        let baseline = self
            .store
            .read_manifest(&manifest_path)
            .await
            .map_err(|e| baseline_unreadable(&manifest_path, e))?;

        info!(
            "Baseline {}: {} references",
            baseline_dir.display(),
            baseline.len()
        );
        Ok(baseline)
    }
}

fn baseline_unreadable(path: &Path, e: BackupError) -> BackupError {
    BackupError::BaselineMissing(format!("cannot read manifest {}: {}", path.display(), e))
}

fn finish(
    kind: BackupKind,
    directory: PathBuf,
    started_at: DateTime<Local>,
    clock: Instant,
    total: usize,
    execution: worker::ExecutionReport,
    outcome: RunOutcome,
) -> RunReport {
    RunReport {
        kind,
        directory,
        started_at,
        finished_at: Local::now(),
        elapsed: clock.elapsed(),
        total,
        attempted: execution.attempted,
        succeeded: execution.succeeded(),
        failures: execution.failures,
        outcome,
    }
}
