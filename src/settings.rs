use std::path::Path;
use std::time::Duration;

use vrc_lib::{Config, VrcError};

use crate::cli::{CheckUrlsArgs, RunArgs};

/// Tracks which CLI flags were explicitly provided vs. defaulted.
#[derive(Debug, Default)]
pub struct RunFlagSources {
    pub viewport: bool,
    pub workers: bool,
    pub task_timeout: bool,
    pub nav_timeout: bool,
}

impl RunFlagSources {
    pub fn from_args(args: &[String]) -> Self {
        Self {
            viewport: flag_present(args, "--viewport"),
            workers: flag_present(args, "--workers"),
            task_timeout: flag_present(args, "--task-timeout"),
            nav_timeout: flag_present(args, "--nav-timeout"),
        }
    }
}

#[derive(Debug, Default)]
pub struct CheckUrlsFlagSources {
    pub concurrency: bool,
    pub retries: bool,
    pub retry_delay: bool,
}

impl CheckUrlsFlagSources {
    pub fn from_args(args: &[String]) -> Self {
        Self {
            concurrency: flag_present(args, "--concurrency"),
            retries: flag_present(args, "--retries"),
            retry_delay: flag_present(args, "--retry-delay"),
        }
    }
}

/// Checks if a flag was present in the command-line arguments.
pub fn flag_present(args: &[String], flag: &str) -> bool {
    args.iter()
        .any(|arg| arg == flag || arg.starts_with(&format!("{flag}=")))
}

/// Merge `run` arguments into the config, preferring CLI when flags are present.
///
/// Optional paths and switches always win when given since they have no
/// clap default to confuse with an explicit value.
pub fn resolve_run_config(args: &RunArgs, mut config: Config, flags: &RunFlagSources) -> Config {
    if flags.viewport {
        config.viewport = args.viewport;
    }
    if flags.workers {
        config.workers = args.workers;
    }
    if flags.task_timeout {
        config.timeouts.task = Duration::from_secs(args.task_timeout);
    }
    if flags.nav_timeout {
        config.timeouts.navigation = Duration::from_secs(args.nav_timeout);
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(ignore) = &args.ignore_list {
        config.ignore_list = Some(ignore.clone());
    }
    if args.no_html {
        config.html_report = false;
    }
    config
}

pub fn resolve_check_urls_config(
    args: &CheckUrlsArgs,
    mut config: Config,
    flags: &CheckUrlsFlagSources,
) -> Config {
    if flags.concurrency {
        config.url_check.concurrency = args.concurrency;
    }
    if flags.retries {
        config.url_check.retries = args.retries;
    }
    if flags.retry_delay {
        config.url_check.retry_delay = Duration::from_millis(args.retry_delay);
    }
    config
}

/// Load config from a TOML file, central config, or return defaults.
/// Priority: explicit path > ~/.config/vrc/config.toml > defaults
pub fn load_config(path: Option<&Path>) -> Result<Config, VrcError> {
    let cfg = Config::load(path).map_err(|e| {
        let loc = path
            .map(|p| p.display().to_string())
            .or_else(|| Config::central_config_path().map(|p| p.display().to_string()))
            .unwrap_or_else(|| "defaults".to_string());
        VrcError::Config(format!("Failed to read config {}: {}", loc, e))
    })?;

    cfg.validate().map_err(|e| {
        let prefix = path
            .map(|p| format!("Invalid config ({}): {}", p.display(), e))
            .unwrap_or_else(|| format!("Invalid config: {}", e));
        VrcError::Config(prefix)
    })?;
    Ok(cfg)
}

/// Format effective config as a single-line string.
pub fn format_effective_config(config: &Config, config_source: Option<&Path>) -> String {
    let source = config_source
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults".to_string());
    format!(
        "Effective config [{source}]: viewport={}, workers={}, respawn_budget={}, timeouts: nav={}s, task={}s, output_dir={}, ignore_list={}, threshold={:.2}, max_height={}, html_report={}",
        config.viewport,
        config.workers,
        config.respawn_budget,
        config.timeouts.navigation.as_secs(),
        config.timeouts.task.as_secs(),
        config.output_dir.display(),
        config
            .ignore_list
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "none".to_string()),
        config.diff.threshold,
        config.capture.max_height,
        config.html_report,
    )
}
