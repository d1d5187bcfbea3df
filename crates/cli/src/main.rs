//! Pessoa cleanup - removes records left behind by E2E runs
//!
//! Logs in through a real browser so the REST calls carry the session and
//! XSRF cookies, then deletes every Pessoa at or above `--min-id`.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use pessoa_e2e::cleanup::{cleanup_pessoas, CleanupOptions};
use pessoa_e2e::context::ScenarioContext;
use pessoa_e2e::playwright::{PlaywrightConfig, PlaywrightSession};
use pessoa_e2e::selectors::SelectorRegistry;
use pessoa_e2e::steps::StepExecutor;
use pessoa_e2e::ScenarioStep;

mod output;

/// Delete Pessoa records created by test runs
#[derive(Parser)]
#[command(name = "pessoa-cleanup")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Application URL
    #[arg(long, env = "E2E_BASE_URL", default_value = "http://localhost:8080")]
    base_url: String,

    #[arg(long, env = "E2E_USERNAME", default_value = "admin")]
    username: String,

    #[arg(long, env = "E2E_PASSWORD", default_value = "admin", hide_env_values = true)]
    password: String,

    /// Delete records with ID >= this value
    #[arg(long, alias = "minId", default_value = "1000")]
    min_id: i64,

    /// Only report what would be deleted
    #[arg(long)]
    dry: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Records fetched per list request
    #[arg(long, default_value = "100")]
    page_size: usize,

    /// Pause between deletes, in milliseconds
    #[arg(long, default_value = "100")]
    pause_ms: u64,

    /// Directory whose node_modules provides playwright
    #[arg(long, env = "E2E_PLAYWRIGHT_DIR", default_value = ".")]
    playwright_dir: PathBuf,

    /// Output format
    #[arg(long, default_value = "table")]
    format: output::OutputFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Dry runs are always verbose
    let log_level = if cli.verbose || cli.dry { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let options = CleanupOptions {
        min_id: cli.min_id,
        dry_run: cli.dry,
        page_size: cli.page_size,
        pause: Duration::from_millis(cli.pause_ms),
    };

    if matches!(cli.format, output::OutputFormat::Table) {
        output::print_banner(options.min_id, options.dry_run);
    }

    let session = PlaywrightSession::launch(&PlaywrightConfig {
        base_url: cli.base_url.clone(),
        project_dir: cli.playwright_dir,
        ..Default::default()
    })
    .await?;

    info!("Logging in to {} as {}", cli.base_url, cli.username);
    let selectors = SelectorRegistry::builtin()?;
    let mut ctx = ScenarioContext::new();
    let mut executor = StepExecutor::new(&session, &selectors, &mut ctx);
    executor.execute(&ScenarioStep::OpenLogin).await?;
    executor
        .execute(&ScenarioStep::Login {
            username: cli.username,
            password: cli.password,
        })
        .await?;
    info!("Login succeeded");

    let report = cleanup_pessoas(&session, &options).await;
    session.close().await?;

    output::print_report(&report?, options.min_id, cli.format)
}
