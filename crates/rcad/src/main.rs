//! RCA Daemon - resilient root-cause diagnosis
//!
//! Runs one diagnosis against fixture-backed data sources, archives the
//! report and records an audit entry.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rca_common::{AnalysisRequest, RcaConfig, TimeRange};
use rcad::archive::ArchiveCommitter;
use rcad::audit::AuditLogger;
use rcad::providers::{AiAnalysisProvider, FixtureProviders};
use rcad::{Collaborators, DiagnosisService, Orchestrator, ResilientCaller};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rcad")]
#[command(about = "Resilient root-cause diagnosis orchestrator", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to /etc/rca/config.toml, then built-in defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Diagnose one component
    Analyze {
        /// Catalog reference, e.g. component:default/checkout
        #[arg(long)]
        entity: String,

        /// Fixture directory serving entities, cluster state, logs and AI analysis
        #[arg(long)]
        fixtures: PathBuf,

        /// Lookback window: 5m, 15m, 1h, 6h or 24h
        #[arg(long, default_value = "1h")]
        time_range: TimeRange,

        /// Skip the log-anomaly source
        #[arg(long)]
        no_logs: bool,

        /// Skip the AI analysis source
        #[arg(long)]
        no_ai: bool,

        /// Override the archive directory
        #[arg(long)]
        archive_dir: Option<PathBuf>,

        /// Override the audit log path
        #[arg(long)]
        audit_log: Option<PathBuf>,

        /// Print the result as JSON instead of the rendered report
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => RcaConfig::load_from_path(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RcaConfig::load(),
    };

    match cli.command {
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
        Commands::Analyze {
            entity,
            fixtures,
            time_range,
            no_logs,
            no_ai,
            archive_dir,
            audit_log,
            json,
        } => {
            info!("rcad v{} starting", env!("CARGO_PKG_VERSION"));

            // Process-wide guards for the AI provider
            let ai_caller = Arc::new(ResilientCaller::from_config(&config));

            let fixtures = Arc::new(FixtureProviders::new(fixtures));
            let ai: Option<Arc<dyn AiAnalysisProvider>> = if fixtures.has_ai() {
                Some(fixtures.clone())
            } else {
                None
            };
            let collaborators = Collaborators {
                resolver: fixtures.clone(),
                kubernetes: fixtures.clone(),
                logs: fixtures.clone(),
                ai,
            };

            let orchestrator = Orchestrator::new(collaborators, Arc::clone(&ai_caller), &config);
            let committer = Arc::new(ArchiveCommitter::new(
                archive_dir.unwrap_or_else(|| config.archive.dir.clone()),
            ));
            let audit = Arc::new(
                AuditLogger::new(audit_log.unwrap_or_else(|| config.audit.path.clone())).await?,
            );
            let service = DiagnosisService::new(orchestrator, committer, audit);

            let mut request = AnalysisRequest::new(entity, time_range);
            request.include_logs = !no_logs;
            request.include_ai = !no_ai;

            let outcome = service.diagnose(&request).await;
            ai_caller.breaker().shutdown();
            let outcome = outcome?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome.result)?);
            } else {
                print!("{}", outcome.report);
            }
            println!("commit: {}", outcome.git_commit_id);
            Ok(())
        }
    }
}
