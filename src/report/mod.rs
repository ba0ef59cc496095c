//! Test-report views over the recorded page outcomes.
//!
//! Outcomes are partitioned into five suites:
//!
//! - `body` - one case per page, failing on body diffs, redirects and errors.
//!   Passing pages are kept as passing cases so the suite size always equals
//!   the page count. The case mismatch is the height-weighted mean of the
//!   body regions alone.
//! - `header` / `footer` - one case per page that has the region
//! - `media` - blocked-media filename sets compared per page
//! - `ignored` - one passing case per suppressed component, for auditing
//!
//! [`junit`] renders suites as JUnit XML and [`html`] renders a visual page.

pub mod html;
pub mod junit;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as FmtWrite;
use std::path::PathBuf;
use tracing::info;

use crate::aggregate::weighted_mismatch;
use crate::error::Result;
use crate::naming::ArtifactLayout;
use crate::severity::{worst_of, SeverityTag};
use crate::store::write_json_pretty;
use crate::types::{ComponentResult, PageOutcome, PageResult};

pub const SUITE_BODY: &str = "body";
pub const SUITE_HEADER: &str = "header";
pub const SUITE_FOOTER: &str = "footer";
pub const SUITE_MEDIA: &str = "media";
pub const SUITE_IGNORED: &str = "ignored";

/// Failure detail attached to a test case.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseFailure {
    pub message: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
    pub name: String,
    pub tag: SeverityTag,
    pub mismatch: Option<f64>,
    pub failure: Option<CaseFailure>,
    /// Images referenced from the case output, relative to the output dir.
    pub attachments: Vec<PathBuf>,
    pub output: Option<String>,
}

impl TestCase {
    fn new(name: impl Into<String>, tag: SeverityTag, mismatch: Option<f64>) -> Self {
        Self {
            name: name.into(),
            tag,
            mismatch,
            failure: None,
            attachments: Vec::new(),
            output: None,
        }
    }

    /// JUnit classname; cases are grouped by tag.
    pub fn classname(&self) -> &'static str {
        self.tag.as_str()
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestSuite {
    pub name: String,
    pub cases: Vec<TestCase>,
}

impl TestSuite {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            cases: Vec::new(),
        }
    }

    pub fn failures(&self) -> usize {
        self.cases.iter().filter(|c| c.is_failure()).count()
    }
}

/// Formats a percentage for reports; `n/a` when unknown.
pub fn format_percent(mismatch: Option<f64>) -> String {
    match mismatch {
        Some(value) => format!("{value:.2}"),
        None => "n/a".to_string(),
    }
}

/// Plain-text table with left-aligned, padded columns.
pub fn format_table(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let mut out = String::new();
    write_row(&mut out, header.iter().copied(), &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(w + 2)).collect();
    let _ = writeln!(out, "|{}|", rule.join("|"));
    for row in rows {
        write_row(&mut out, row.iter().map(String::as_str), &widths);
    }
    out
}

fn write_row<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let padded: Vec<String> = cells
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect();
    let _ = writeln!(out, "| {} |", padded.join(" | "));
}

fn component_rows(components: &[ComponentResult]) -> Vec<Vec<String>> {
    components
        .iter()
        .map(|c| {
            vec![
                c.component.clone(),
                format_percent(c.mismatch_percent),
                c.tag.to_string(),
            ]
        })
        .collect()
}

fn attachments<'a>(components: impl Iterator<Item = &'a ComponentResult>) -> Vec<PathBuf> {
    components.filter_map(|c| c.diff_image.clone()).collect()
}

fn body_case(outcome: &PageOutcome) -> TestCase {
    match outcome {
        PageOutcome::Compared(page) => {
            let body: Vec<ComponentResult> =
                page.components.iter().filter(|c| c.is_body()).cloned().collect();
            let body_tag = worst_of(body.iter().map(|c| c.tag));
            let mut case = TestCase::new(&page.url, body_tag, weighted_mismatch(&body));
            let failing = page.body_failures().count();
            if failing > 0 {
                case.failure = Some(CaseFailure {
                    message: format!("{failing} body component(s) differ"),
                    body: format_table(&["component", "mismatch", "tag"], &component_rows(&body)),
                });
            }
            case.attachments = attachments(body.iter());
            case
        }
        PageOutcome::RedirectMismatch(redirect) => {
            let mut case = TestCase::new(
                &redirect.page.url,
                SeverityTag::RedirectUrlMismatch,
                redirect.page.overall_mismatch,
            );
            case.failure = Some(CaseFailure {
                message: "final URLs diverged after redirects".to_string(),
                body: format_table(
                    &["side", "final url"],
                    &[
                        vec!["prod".to_string(), redirect.prod_final_url.clone()],
                        vec!["migrated".to_string(), redirect.migrated_final_url.clone()],
                    ],
                ),
            });
            case
        }
        PageOutcome::Failed(failure) => {
            let mut case = TestCase::new(&failure.url, SeverityTag::CriticalDiff, None);
            case.failure = Some(CaseFailure {
                message: "page could not be compared".to_string(),
                body: failure.reason.clone(),
            });
            case
        }
    }
}

fn region_case(page: &PageResult, component: &ComponentResult) -> TestCase {
    let mut case = TestCase::new(&page.url, component.tag, component.mismatch_percent);
    if component.is_failure() {
        case.failure = Some(CaseFailure {
            message: format!("{} differs", component.component),
            body: format_table(
                &["component", "mismatch", "tag"],
                &component_rows(std::slice::from_ref(component)),
            ),
        });
    }
    case.attachments = attachments(std::iter::once(component));
    case.output = component.log.clone();
    case
}

fn media_case(page: &PageResult) -> Option<TestCase> {
    let media = page.media.as_ref()?;
    let mut case = TestCase::new(&page.url, media.tag, Some(media.mismatch_percent));
    if media.tag.is_failure() {
        let mut rows: Vec<Vec<String>> = media
            .only_in_prod()
            .map(|name| vec!["prod".to_string(), name.clone()])
            .collect();
        rows.extend(
            media
                .only_in_migrated()
                .map(|name| vec!["migrated".to_string(), name.clone()]),
        );
        case.failure = Some(CaseFailure {
            message: "blocked media differs".to_string(),
            body: format_table(&["only in", "file"], &rows),
        });
    }
    Some(case)
}

/// Splits outcomes into the five report suites, in a fixed order.
pub fn build_suites(outcomes: &[PageOutcome]) -> Vec<TestSuite> {
    let mut body = TestSuite::new(SUITE_BODY);
    let mut header = TestSuite::new(SUITE_HEADER);
    let mut footer = TestSuite::new(SUITE_FOOTER);
    let mut media = TestSuite::new(SUITE_MEDIA);
    let mut ignored = TestSuite::new(SUITE_IGNORED);

    for outcome in outcomes {
        body.cases.push(body_case(outcome));
        let PageOutcome::Compared(page) = outcome else {
            continue;
        };
        for component in &page.components {
            if component.is_header() {
                header.cases.push(region_case(page, component));
            } else if component.is_footer() {
                footer.cases.push(region_case(page, component));
            }
            if component.is_ignored() {
                let mut case = region_case(page, component);
                case.name = format!("{} {}", page.url, component.component);
                ignored.cases.push(case);
            }
        }
        if let Some(case) = media_case(page) {
            media.cases.push(case);
        }
    }

    vec![body, header, footer, media, ignored]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteSummary {
    pub name: String,
    pub tests: usize,
    pub failures: usize,
}

/// Totals written to `summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub pages: usize,
    pub compared: usize,
    pub redirect_mismatches: usize,
    pub failed: usize,
    /// Failing cases across every suite.
    pub failing_cases: usize,
    pub suites: Vec<SuiteSummary>,
    /// Page count per overall tag.
    pub tags: BTreeMap<String, usize>,
}

impl Summary {
    pub fn from_outcomes(outcomes: &[PageOutcome], suites: &[TestSuite]) -> Self {
        let mut tags = BTreeMap::new();
        let (mut compared, mut redirect_mismatches, mut failed) = (0, 0, 0);
        for outcome in outcomes {
            match outcome {
                PageOutcome::Compared(_) => compared += 1,
                PageOutcome::RedirectMismatch(_) => redirect_mismatches += 1,
                PageOutcome::Failed(_) => failed += 1,
            }
            *tags.entry(outcome.overall_tag().to_string()).or_insert(0) += 1;
        }
        let suites: Vec<SuiteSummary> = suites
            .iter()
            .map(|suite| SuiteSummary {
                name: suite.name.clone(),
                tests: suite.cases.len(),
                failures: suite.failures(),
            })
            .collect();
        Self {
            pages: outcomes.len(),
            compared,
            redirect_mismatches,
            failed,
            failing_cases: suites.iter().map(|s| s.failures).sum(),
            suites,
            tags,
        }
    }

    pub fn passed(&self) -> bool {
        self.failing_cases == 0
    }
}

/// Writes every JUnit file, `summary.json` and optionally `report.html`.
pub fn write_reports(
    layout: &ArtifactLayout,
    outcomes: &[PageOutcome],
    html_report: bool,
) -> Result<Summary> {
    let suites = build_suites(outcomes);
    for suite in &suites {
        junit::write_suite(&layout.junit(&suite.name), suite)?;
    }
    let summary = Summary::from_outcomes(outcomes, &suites);
    write_json_pretty(&layout.summary(), &summary)?;
    if html_report {
        html::write_report(&layout.html_report(), outcomes, &summary)?;
    }
    info!(
        pages = summary.pages,
        failing_cases = summary.failing_cases,
        output = %layout.root().display(),
        "reports written"
    );
    Ok(summary)
}
