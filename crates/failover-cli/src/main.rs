mod output;
mod settings;

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, warn};

use failover_aws::AwsRds;
use failover_core::config::WarnLevel;
use failover_core::{FailoverConfig, Orchestrator};

#[derive(Parser)]
#[command(
    name = "rds-failover",
    about = "Fail RDS instances over between regions and repoint their RDS Proxies",
    version
)]
struct Cli {
    /// Configuration file (default: configuration/<CLIENT_NAME>/rds/configuration.json)
    #[arg(long, env = "RDS_FAILOVER_CONFIG")]
    config: Option<PathBuf>,

    /// Client whose configuration directory to use when --config is not given
    #[arg(long, env = "CLIENT_NAME")]
    client_name: Option<String>,

    /// Region to promote toward: ACTIVE or FAILOVER
    #[arg(long, env = "SWITCHING_TO")]
    switching_to: Option<String>,

    /// Delete a conflicting primary at the destination (also FORCE_DELETE=true)
    #[arg(long)]
    force_delete: bool,

    /// Also turn the demoted region into a standby of the new primary
    #[arg(long)]
    process_current_environment: bool,

    /// Probe and print the plan for each pair without changing anything
    #[arg(long)]
    dry_run: bool,

    /// Output the run report as JSON
    #[arg(long, short = 'j')]
    json: bool,

    /// Seconds between status checks while waiting on RDS
    #[arg(long, default_value = "60")]
    poll_interval_secs: u64,

    /// Give up waiting after this many checks (default: wait indefinitely)
    #[arg(long)]
    max_poll_attempts: Option<u32>,

    /// Milliseconds to sleep before every AWS API call
    #[arg(long, default_value = "0")]
    api_delay_ms: u64,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}

/// Returns whether every pair succeeded (or was planned).
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let options = settings::run_options(&cli)?;
    let path = settings::config_path(cli.config.as_deref(), cli.client_name.as_deref())?;
    let config = FailoverConfig::load(&path)
        .with_context(|| format!("failed to load {}", path.display()))?;

    for finding in config.validate() {
        match finding.level {
            WarnLevel::Warning => warn!("{}", finding.message),
            WarnLevel::Error => error!("{}", finding.message),
        }
    }
    config.ensure_valid()?;

    let active = AwsRds::connect(&config.active_region).await;
    let failover = AwsRds::connect(&config.failover_region).await;

    let orchestrator = Orchestrator::new(config, options, Arc::new(active), Arc::new(failover));
    let cancel = orchestrator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; stopping after the current wait");
            cancel.cancel();
        }
    });
    let report = orchestrator.run().await;

    if cli.json {
        output::print_json(&report)?;
    } else {
        output::print_report(&report);
    }
    Ok(report.is_success())
}
