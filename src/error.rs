use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::ParseError;

#[derive(Debug, Error)]
pub enum VrcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] ParseError),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Report writing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Comparison error: {0}")]
    Diff(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unexpected error: {0}")]
    Unknown(String),
}

impl VrcError {
    pub fn browser(message: impl Into<String>) -> Self {
        VrcError::Browser(message.into())
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        VrcError::Timeout(message.into())
    }

    pub fn diff(message: impl Into<String>) -> Self {
        VrcError::Diff(message.into())
    }

    /// Timeout-class failures are the only ones worth retrying.
    pub fn is_timeout(&self) -> bool {
        match self {
            VrcError::Timeout(_) => true,
            VrcError::Network(e) => e.is_timeout(),
            VrcError::Browser(msg) => msg.to_ascii_lowercase().contains("timeout"),
            _ => false,
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        match self {
            VrcError::Io(e) => ErrorPayload::new(
                ErrorCategory::Config,
                e.to_string(),
                "Check file paths/permissions and the output directory.",
            ),
            VrcError::Network(e) => ErrorPayload::new(
                ErrorCategory::Network,
                e.to_string(),
                "Check connectivity/proxy/VPN and retry.",
            ),
            VrcError::InvalidUrl(e) => ErrorPayload::new(
                ErrorCategory::Config,
                e.to_string(),
                "Verify URL/format (e.g., https://example.com) in the URL list and origin variables.",
            ),
            VrcError::Image(e) => ErrorPayload::new(
                ErrorCategory::Image,
                e.to_string(),
                "Verify captured screenshots are readable PNG files.",
            ),
            VrcError::Serialization(e) => ErrorPayload::new(
                ErrorCategory::Config,
                e.to_string(),
                "Check JSON inputs (URL list, ignore list, persisted results).",
            ),
            VrcError::Xml(e) => ErrorPayload::new(
                ErrorCategory::Report,
                e.to_string(),
                "Check the output directory is writable; run with --verbose for details.",
            ),
            VrcError::Browser(msg) => {
                let lower = msg.to_ascii_lowercase();
                if lower.contains("playwright npm package is missing") {
                    ErrorPayload::new(
                        ErrorCategory::Browser,
                        msg.to_string(),
                        "Install Playwright (e.g., `npm install playwright` and `npx playwright install chromium`).",
                    )
                } else if lower.contains("executable doesn't exist") || lower.contains("chromium executable") {
                    ErrorPayload::new(
                        ErrorCategory::Browser,
                        msg.to_string(),
                        "Run `npx playwright install chromium` to download the browser.",
                    )
                } else if lower.contains("not found on path") || lower.contains("node command") {
                    ErrorPayload::new(
                        ErrorCategory::Browser,
                        msg.to_string(),
                        "Install Node.js and ensure the node binary is on PATH.",
                    )
                } else {
                    ErrorPayload::new(
                        ErrorCategory::Browser,
                        msg.to_string(),
                        "Re-run with --verbose to see the helper output.",
                    )
                }
            }
            VrcError::Timeout(msg) => ErrorPayload::new(
                ErrorCategory::Timeout,
                msg.to_string(),
                "Try increasing --nav-timeout/--task-timeout or reduce --workers.",
            ),
            VrcError::Diff(msg) => ErrorPayload::new(
                ErrorCategory::Image,
                msg.to_string(),
                "Inspect the captured region images; try rerunning with --verbose.",
            ),
            VrcError::Config(msg) => {
                let lower = msg.to_ascii_lowercase();
                if lower.contains("website_url") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Set PROD_WEBSITE_URL and MIGRATED_WEBSITE_URL (or STAGE_WEBSITE_URL) before running.",
                    )
                } else if lower.contains("ignore list") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Ignore lists are JSON or YAML arrays of {url, component, percents}.",
                    )
                } else if lower.contains("url list") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "The URL list must be a JSON array of relative paths or absolute URLs.",
                    )
                } else {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Check flags/paths (e.g., --viewport WIDTHxHEIGHT) and the config file.",
                    )
                }
            }
            VrcError::Unknown(msg) => ErrorPayload::new(
                ErrorCategory::Unknown,
                msg.to_string(),
                "Re-run with --verbose; file an issue if persistent.",
            ),
        }
    }
}

pub type Result<T> = std::result::Result<T, VrcError>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Config,
    Network,
    Browser,
    Timeout,
    Image,
    Report,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub category: ErrorCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl ErrorPayload {
    pub fn new(category: ErrorCategory, message: String, remediation: impl Into<String>) -> Self {
        Self {
            category,
            message,
            remediation: Some(remediation.into()),
        }
    }
}
