//! Harbor Backup - Main entry point
//!
//! Runs one action against the configured registry and prints the result.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use harbor_backup::executor::{BackupKind, BackupOrchestrator, ExecutorSettings};
use harbor_backup::registry::{HarborClient, InventoryClient};
use harbor_backup::resolver::RegistryReferences;
use harbor_backup::store::FsBaselineStore;
use harbor_backup::tool::DockerCli;
use harbor_backup::{config::Config, report, utils};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Action {
    /// Check that the registry API answers
    Ping,
    /// Show registry component health
    Health,
    /// Show project and repository counts
    Statistics,
    /// List all projects
    Projects,
    /// List all repositories
    Repositories,
    /// List all artifacts
    Artifacts,
    /// Show resolved references by category
    Uris,
    /// Back up every pullable reference
    #[value(name = "full_backup")]
    FullBackup,
    /// Back up references added since the last full backup
    #[value(name = "delta_backup")]
    DeltaBackup,
}

impl Action {
    fn needs_credential(self) -> bool {
        !matches!(self, Action::Ping | Action::Health)
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to run
    #[arg(value_enum)]
    action: Action,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Maximum concurrent pull/export operations (overrides config)
    #[arg(long)]
    concurrency: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = if let Some(config_path) = &args.config {
        Config::from_file(config_path)
            .with_context(|| format!("failed to load config {}", config_path.display()))?
    } else {
        Config::default()
    };
    let mut config = config.apply_env();

    if let Some(concurrency) = args.concurrency {
        config.backup.concurrency = concurrency;
    }

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    tracing::info!(
        "Starting harbor-backup v{} against {}",
        env!("CARGO_PKG_VERSION"),
        config.api_base_url()
    );

    config.validate(args.action.needs_credential())?;

    let client = HarborClient::from_config(&config.registry)?;
    let inventory = InventoryClient::new(
        client.clone(),
        client.api_base().clone(),
        config.registry.page_size,
    );

    let output = match args.action {
        Action::Ping => {
            if client.ping().await? {
                "Pong\n".to_string()
            } else {
                anyhow::bail!("registry did not answer ping with Pong");
            }
        }
        Action::Health => {
            let health = client.health().await?;
            let text = report::render_health(&health);
            if !health.is_healthy() {
                print!("{}", text);
                anyhow::bail!("registry reports status {}", health.status);
            }
            text
        }
        Action::Statistics => report::render_statistics(&client.statistics().await?),
        Action::Projects => report::render_projects(&inventory.list_projects().await?),
        Action::Repositories => {
            let mut repositories = Vec::new();
            for project in inventory.list_projects().await? {
                repositories.extend(inventory.list_repositories(&project).await?);
            }
            report::render_repositories(&repositories)
        }
        Action::Artifacts => report::render_artifacts(&inventory.snapshot().await?.artifacts),
        Action::Uris => {
            let references = RegistryReferences::new(inventory, config.registry.host.clone());
            report::render_uris(&references.resolve_all().await?)
        }
        Action::FullBackup | Action::DeltaBackup => {
            let kind = if args.action == Action::FullBackup {
                BackupKind::Full
            } else {
                BackupKind::Delta
            };

            let orchestrator = BackupOrchestrator::new(
                Arc::new(RegistryReferences::new(inventory, config.registry.host.clone())),
                Arc::new(FsBaselineStore::new(config.backup.pointer_file.clone())),
                Arc::new(DockerCli::new(config.backup.tool.clone())),
                ExecutorSettings::from(&config.backup),
            );

            let run = orchestrator
                .run(kind)
                .await
                .with_context(|| format!("{} backup failed", kind))?;
            report::render_run_report(&run)
        }
    };

    print!("{}", output);
    Ok(())
}
