use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::browser::{
    BrowserOptions, DEFAULT_IMAGE_TIMEOUT, DEFAULT_LAUNCH_TIMEOUT, DEFAULT_NAVIGATION_TIMEOUT,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_SETTLE_DELAY,
};
use crate::capture::{CaptureOptions, DEFAULT_MAX_HEIGHT};
use crate::diff::{DiffOptions, DEFAULT_THRESHOLD};
use crate::error::{Result, VrcError};
use crate::retry::RetryPolicy;
use crate::scheduler::{
    SchedulerOptions, DEFAULT_RESPAWN_BUDGET, DEFAULT_TASK_TIMEOUT, DEFAULT_WORKERS,
};
use crate::urls::UrlCheckOptions;
use crate::Viewport;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Config {
    pub viewport: Viewport,
    pub workers: usize,
    pub respawn_budget: u32,
    pub output_dir: PathBuf,
    pub ignore_list: Option<PathBuf>,
    pub html_report: bool,
    pub timeouts: Timeouts,
    pub retry: RetryConfig,
    pub capture: CaptureConfig,
    pub diff: DiffConfig,
    pub url_check: UrlCheckConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    #[serde(with = "humantime_serde")]
    pub navigation: Duration,
    /// Hard limit for one page comparison.
    #[serde(with = "humantime_serde")]
    pub task: Duration,
    #[serde(with = "humantime_serde")]
    pub request: Duration,
    #[serde(with = "humantime_serde")]
    pub launch: Duration,
    #[serde(with = "humantime_serde")]
    pub settle: Duration,
    #[serde(with = "humantime_serde")]
    pub image: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation: DEFAULT_NAVIGATION_TIMEOUT,
            task: DEFAULT_TASK_TIMEOUT,
            request: DEFAULT_REQUEST_TIMEOUT,
            launch: DEFAULT_LAUNCH_TIMEOUT,
            settle: DEFAULT_SETTLE_DELAY,
            image: DEFAULT_IMAGE_TIMEOUT,
        }
    }
}

/// Navigation retry settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,
    pub multiplier: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_delay: policy.initial_delay,
            multiplier: policy.multiplier,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub max_height: u32,
    pub header_selector: String,
    pub footer_selector: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_height: DEFAULT_MAX_HEIGHT,
            header_selector: "header".to_string(),
            footer_selector: "footer".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    pub threshold: f64,
    pub include_anti_aliased: bool,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            include_anti_aliased: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlCheckConfig {
    pub concurrency: usize,
    pub retries: u32,
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,
}

impl Default for UrlCheckConfig {
    fn default() -> Self {
        let options = UrlCheckOptions::default();
        Self {
            concurrency: options.concurrency,
            retries: options.retries,
            retry_delay: options.retry_delay,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            workers: DEFAULT_WORKERS,
            respawn_budget: DEFAULT_RESPAWN_BUDGET,
            output_dir: PathBuf::from(".comparison_results"),
            ignore_list: None,
            html_report: true,
            timeouts: Timeouts::default(),
            retry: RetryConfig::default(),
            capture: CaptureConfig::default(),
            diff: DiffConfig::default(),
            url_check: UrlCheckConfig::default(),
        }
    }
}

impl Config {
    /// `~/.config/vrc/config.toml`, when a home directory is known.
    pub fn central_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config").join("vrc").join("config.toml"))
    }

    /// Loads an explicit file, else the central file if present, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::central_config_path() {
                Some(central) if central.exists() => central,
                _ => return Ok(Self::default()),
            },
        };
        let content = fs::read_to_string(&path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| VrcError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| -> Result<()> { Err(VrcError::Config(msg.to_string())) };
        if self.workers == 0 {
            return invalid("workers must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.diff.threshold) {
            return invalid("diff.threshold must be between 0 and 1");
        }
        if self.capture.max_height == 0 {
            return invalid("capture.max_height must be positive");
        }
        if self.capture.header_selector.trim().is_empty()
            || self.capture.footer_selector.trim().is_empty()
        {
            return invalid("capture selectors must not be empty");
        }
        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts must be at least 1");
        }
        if self.timeouts.navigation.is_zero() || self.timeouts.task.is_zero() {
            return invalid("timeouts must be positive");
        }
        if self.url_check.concurrency == 0 {
            return invalid("url_check.concurrency must be at least 1");
        }
        Ok(())
    }

    pub fn browser_options(&self, migrated_headers: BTreeMap<String, String>) -> BrowserOptions {
        BrowserOptions {
            viewport: self.viewport,
            navigation_timeout: self.timeouts.navigation,
            request_timeout: self.timeouts.request,
            launch_timeout: self.timeouts.launch,
            settle_delay: self.timeouts.settle,
            image_timeout: self.timeouts.image,
            header_selector: self.capture.header_selector.clone(),
            footer_selector: self.capture.footer_selector.clone(),
            migrated_headers,
            ..BrowserOptions::default()
        }
    }

    /// Navigation retries; each attempt is bounded a little above the
    /// browser's own navigation timeout.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            initial_delay: self.retry.initial_delay,
            multiplier: self.retry.multiplier,
            ..RetryPolicy::default()
        }
        .with_attempt_timeout(self.timeouts.navigation + self.timeouts.request)
    }

    pub fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            workers: self.workers,
            task_timeout: self.timeouts.task,
            respawn_budget: self.respawn_budget,
        }
    }

    pub fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            max_height: self.capture.max_height,
        }
    }

    pub fn diff_options(&self) -> DiffOptions {
        DiffOptions {
            threshold: self.diff.threshold,
            include_anti_aliased: self.diff.include_anti_aliased,
            ..DiffOptions::default()
        }
    }

    pub fn url_check_options(&self) -> UrlCheckOptions {
        UrlCheckOptions {
            concurrency: self.url_check.concurrency,
            retries: self.url_check.retries,
            retry_delay: self.url_check.retry_delay,
            ..UrlCheckOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values_match_expected() {
        let cfg = Config::default();

        assert_eq!(cfg.viewport.width, 1280);
        assert_eq!(cfg.viewport.height, 720);
        assert_eq!(cfg.workers, 4);
        assert_eq!(cfg.timeouts.task, Duration::from_secs(150));
        assert_eq!(cfg.timeouts.navigation, Duration::from_secs(30));
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.retry.initial_delay, Duration::from_secs(1));
        assert_eq!(cfg.capture.max_height, 9000);
        assert!((cfg.diff.threshold - 0.1).abs() < f64::EPSILON);
        assert_eq!(cfg.url_check.retry_delay, Duration::from_millis(500));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn parses_partial_toml_with_humantime_durations() {
        let cfg = Config::from_toml(
            r##"
workers = 8
output_dir = "out"

[viewport]
width = 1440
height = 900

[timeouts]
navigation = "45s"
task = "3m"

[capture]
header_selector = "#site-header"
"##,
        )
        .unwrap();

        assert_eq!(cfg.workers, 8);
        assert_eq!(cfg.output_dir, PathBuf::from("out"));
        assert_eq!(cfg.viewport.width, 1440);
        assert_eq!(cfg.timeouts.navigation, Duration::from_secs(45));
        assert_eq!(cfg.timeouts.task, Duration::from_secs(180));
        assert_eq!(cfg.timeouts.settle, DEFAULT_SETTLE_DELAY);
        assert_eq!(cfg.capture.header_selector, "#site-header");
        assert_eq!(cfg.capture.footer_selector, "footer");
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut cfg = Config::default();
        cfg.diff.threshold = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.workers = 0;
        assert!(cfg.validate().is_err());

        assert!(Config::from_toml("workers = \"many\"").is_err());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn derived_options_follow_config() {
        let mut cfg = Config::default();
        cfg.retry.max_attempts = 5;
        cfg.diff.threshold = 0.2;
        let policy = cfg.retry_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(
            policy.attempt_timeout,
            Some(cfg.timeouts.navigation + cfg.timeouts.request)
        );
        assert!((cfg.diff_options().threshold - 0.2).abs() < f64::EPSILON);
        assert_eq!(cfg.scheduler_options().task_timeout, Duration::from_secs(150));
    }
}
