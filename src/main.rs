use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use docshift::api::{Endpoints, HttpTransport, RetryPolicy, RetryingApiClient};
use docshift::audit::AuditSink;
use docshift::auth::{EnvTokenProvider, TokenProvider};
use docshift::cli::{Cli, Commands, Display};
use docshift::config::{ShiftConfig, StatePaths};
use docshift::error::{Result, ShiftError};
use docshift::orchestrator::MigrationOrchestrator;
use docshift::plan::PlanLoader;
use docshift::progress::ProgressStore;
use docshift::snapshot::SnapshotStore;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            Display::new().print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("docshift=debug")
    } else {
        EnvFilter::new("docshift=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = ShiftConfig::load(&cli.config).await?;
    let display = Display::new();

    match cli.command {
        Commands::Run { plan, dry_run } => cmd_run(&display, &config, &plan, dry_run).await,
        Commands::Status => cmd_status(&display, &config).await,
        Commands::Clear { item_id } => cmd_clear(&display, &config, &item_id).await,
    }
}

async fn cmd_run(
    display: &Display,
    config: &ShiftConfig,
    plan_path: &Path,
    dry_run: bool,
) -> Result<ExitCode> {
    let paths = StatePaths::new(&config.run.state_dir);
    paths.ensure_dirs().await?;

    let items = PlanLoader::new(config.plan.clone()).load(plan_path)?;
    if items.is_empty() {
        return Err(ShiftError::EmptyPlan);
    }

    let token = EnvTokenProvider::new(&config.api.token_env)
        .bearer_token()
        .await?;
    let transport = HttpTransport::new(Duration::from_secs(config.api.timeout_secs), token)?;
    let client = RetryingApiClient::new(
        transport,
        RetryPolicy::from_config(&config.retry),
        Endpoints::from_config(&config.api),
    );

    let progress = ProgressStore::load(&paths.ledger).await?;
    let snapshots = SnapshotStore::new(&paths.snapshot_dir);
    let audit = AuditSink::new(&paths.audit_log);

    let mut orchestrator = MigrationOrchestrator::new(
        client,
        progress,
        snapshots,
        audit,
        config.resume.clone(),
        config.run.clone(),
    );

    let result = orchestrator.run(&items, dry_run).await?;
    display.print_run_summary(&result, dry_run);

    Ok(if result.all_completed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn cmd_status(display: &Display, config: &ShiftConfig) -> Result<ExitCode> {
    let paths = StatePaths::new(&config.run.state_dir);
    let store = ProgressStore::load(&paths.ledger).await?;
    display.print_status(store.ledger());
    Ok(ExitCode::SUCCESS)
}

async fn cmd_clear(display: &Display, config: &ShiftConfig, item_id: &str) -> Result<ExitCode> {
    let paths = StatePaths::new(&config.run.state_dir);
    let mut store = ProgressStore::load(&paths.ledger).await?;

    if store.clear_item(item_id).await? {
        display.print_info(&format!("Cleared ledger entry for {}", item_id));
        Ok(ExitCode::SUCCESS)
    } else {
        display.print_error(&format!("No ledger entry for {}", item_id));
        Ok(ExitCode::FAILURE)
    }
}
