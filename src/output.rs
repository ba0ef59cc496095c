use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ErrorPayload;
use crate::report::Summary;
use crate::urls::{UrlCheck, UrlListDifference};

/// Schema version for output payloads.
pub const VRC_OUTPUT_VERSION: &str = "0.1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum VrcOutput {
    Run(RunOutput),
    Report(ReportOutput),
    CheckUrls(CheckUrlsOutput),
    DiffUrls(DiffUrlsOutput),
    Error(ErrorOutput),
}

impl VrcOutput {
    /// Whether the command found nothing to fail on.
    pub fn passed(&self) -> bool {
        match self {
            VrcOutput::Run(run) => run.summary.passed(),
            VrcOutput::Report(report) => report.summary.passed(),
            VrcOutput::CheckUrls(check) => check.invalid.is_empty(),
            VrcOutput::DiffUrls(diff) => diff.differences.is_empty(),
            VrcOutput::Error(_) => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutput {
    pub version: String,
    pub output_dir: PathBuf,
    /// Pages taken from earlier results without rendering.
    pub resumed: usize,
    pub dispatched: usize,
    pub summary: Summary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportOutput {
    pub version: String,
    pub output_dir: PathBuf,
    pub summary: Summary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckUrlsOutput {
    pub version: String,
    pub checked: usize,
    #[serde(default)]
    pub invalid: Vec<UrlCheck>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffUrlsOutput {
    pub version: String,
    #[serde(default)]
    pub differences: Vec<UrlListDifference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub written: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorOutput {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub error: ErrorPayload,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::SuiteSummary;
    use std::collections::BTreeMap;

    fn summary(failing_cases: usize) -> Summary {
        Summary {
            pages: 2,
            compared: 2,
            redirect_mismatches: 0,
            failed: 0,
            failing_cases,
            suites: vec![SuiteSummary {
                name: "body".into(),
                tests: 2,
                failures: failing_cases,
            }],
            tags: BTreeMap::from([("perfect-match".to_string(), 2)]),
        }
    }

    #[test]
    fn run_output_serializes() {
        let output = VrcOutput::Run(RunOutput {
            version: VRC_OUTPUT_VERSION.to_string(),
            output_dir: PathBuf::from(".comparison_results"),
            resumed: 1,
            dispatched: 1,
            summary: summary(0),
        });

        let json = serde_json::to_string(&output).expect("serialize run output");
        assert!(json.contains("\"mode\":\"run\""));
        assert!(json.contains("\"failingCases\":0"));
        assert!(output.passed());
    }

    #[test]
    fn check_urls_output_fails_on_invalid_urls() {
        let output = VrcOutput::CheckUrls(CheckUrlsOutput {
            version: VRC_OUTPUT_VERSION.to_string(),
            checked: 3,
            invalid: vec![UrlCheck {
                url: "https://example.com/gone".into(),
                status: 404,
                ok: false,
                reason: Some("HTTP status 404".into()),
            }],
        });

        let json = serde_json::to_string(&output).expect("serialize check output");
        assert!(json.contains("\"mode\":\"check-urls\""));
        assert!(json.contains("\"status\":404"));
        assert!(!output.passed());
    }

    #[test]
    fn diff_urls_output_passes_when_lists_match() {
        let output = VrcOutput::DiffUrls(DiffUrlsOutput {
            version: VRC_OUTPUT_VERSION.to_string(),
            differences: Vec::new(),
            written: None,
        });
        let json = serde_json::to_string(&output).expect("serialize diff output");
        assert!(json.contains("\"mode\":\"diff-urls\""));
        assert!(!json.contains("written"));
        assert!(output.passed());
        assert!(!VrcOutput::Report(ReportOutput {
            version: VRC_OUTPUT_VERSION.to_string(),
            output_dir: PathBuf::from("out"),
            summary: summary(2),
        })
        .passed());
    }
}
