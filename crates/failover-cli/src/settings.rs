//! Turns command-line arguments and environment into run settings.

use anyhow::{bail, Context};
use std::path::{Path, PathBuf};
use std::time::Duration;

use failover_core::types::Direction;
use failover_core::RunOptions;

use crate::Cli;

pub fn run_options(cli: &Cli) -> anyhow::Result<RunOptions> {
    let Some(raw) = cli.switching_to.as_deref() else {
        bail!("SWITCHING_TO must be set to ACTIVE or FAILOVER");
    };
    let direction: Direction = raw.parse().context("reading SWITCHING_TO")?;

    let mut options = RunOptions::new(direction);
    options.force_delete = cli.force_delete || env_true("FORCE_DELETE");
    options.process_current_environment = cli.process_current_environment;
    options.dry_run = cli.dry_run;
    options.timings.poll_interval = Duration::from_secs(cli.poll_interval_secs);
    options.max_poll_attempts = cli.max_poll_attempts;
    options.api_delay = Duration::from_millis(cli.api_delay_ms);
    Ok(options)
}

/// `--config` wins; otherwise the per-client default location.
pub fn config_path(explicit: Option<&Path>, client_name: Option<&str>) -> anyhow::Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    match client_name.map(str::trim) {
        Some(client) if !client.is_empty() => Ok(PathBuf::from("configuration")
            .join(client)
            .join("rds")
            .join("configuration.json")),
        _ => bail!("no configuration given: pass --config or set CLIENT_NAME"),
    }
}

fn env_true(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| is_true(&v))
}

/// Only the literal `true` (any case) enables an environment toggle.
fn is_true(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}
