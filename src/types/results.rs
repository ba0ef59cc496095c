//! Comparison result types persisted per page and consumed by the reports.
//!
//! - [`ComponentResult`] - Verdict for one named region
//! - [`PageResult`] - Height-weighted verdict for one page
//! - [`PageOutcome`] - Exactly one per submitted [`UrlPair`](super::UrlPair)

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::severity::SeverityTag;

/// Verdict for one region of a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentResult {
    pub component: String,
    /// `None` when the region could not be compared.
    pub mismatch_percent: Option<f64>,
    #[serde(rename = "match")]
    pub matched: bool,
    pub tag: SeverityTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_image: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prod_image: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrated_image: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
    /// Weight of this region in the page score.
    #[serde(default)]
    pub height: u32,
}

impl ComponentResult {
    pub fn is_header(&self) -> bool {
        self.component == super::RegionKind::HEADER_NAME
    }

    pub fn is_footer(&self) -> bool {
        self.component == super::RegionKind::FOOTER_NAME
    }

    pub fn is_body(&self) -> bool {
        !self.is_header() && !self.is_footer()
    }

    pub fn is_failure(&self) -> bool {
        self.tag.is_failure()
    }

    pub fn is_ignored(&self) -> bool {
        self.tag == SeverityTag::IgnoredDiff
    }
}

/// Blocked-media comparison between both sides of a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaComparison {
    pub prod: BTreeSet<String>,
    pub migrated: BTreeSet<String>,
    pub mismatch_percent: f64,
    pub tag: SeverityTag,
}

impl MediaComparison {
    /// Compares two blocked-media filename sets by symmetric difference over union.
    pub fn compare<P, M>(prod: P, migrated: M) -> Self
    where
        P: IntoIterator<Item = String>,
        M: IntoIterator<Item = String>,
    {
        let prod: BTreeSet<String> = prod.into_iter().collect();
        let migrated: BTreeSet<String> = migrated.into_iter().collect();
        let union = prod.union(&migrated).count();
        let differing = prod.symmetric_difference(&migrated).count();
        let mismatch_percent = if union == 0 {
            0.0
        } else {
            crate::diff::round2(differing as f64 / union as f64 * 100.0)
        };
        Self {
            prod,
            migrated,
            mismatch_percent,
            tag: crate::severity::classify(Some(mismatch_percent)),
        }
    }

    pub fn only_in_prod(&self) -> impl Iterator<Item = &String> {
        self.prod.difference(&self.migrated)
    }

    pub fn only_in_migrated(&self) -> impl Iterator<Item = &String> {
        self.migrated.difference(&self.prod)
    }
}

/// Verdict for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    /// Relative URL the page was requested with.
    pub url: String,
    pub prod_url: String,
    pub migrated_url: String,
    pub overall_mismatch: Option<f64>,
    pub overall_tag: SeverityTag,
    #[serde(default)]
    pub components: Vec<ComponentResult>,
    #[serde(default)]
    pub redirect_mismatch: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaComparison>,
    /// Whole-page comparison, reported next to the regions but never weighted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_page: Option<ComponentResult>,
}

impl PageResult {
    pub fn component(&self, name: &str) -> Option<&ComponentResult> {
        self.components.iter().find(|c| c.component == name)
    }

    /// Failing components outside the header and footer.
    pub fn body_failures(&self) -> impl Iterator<Item = &ComponentResult> {
        self.components
            .iter()
            .filter(|c| c.is_body() && c.is_failure())
    }
}

/// Final URLs diverged after redirects; no regions were compared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectMismatch {
    pub page: PageResult,
    pub prod_final_url: String,
    pub migrated_final_url: String,
}

/// A task that produced no comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFailure {
    pub url: String,
    pub reason: String,
}

/// Exactly one outcome is recorded for each submitted page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum PageOutcome {
    Compared(PageResult),
    RedirectMismatch(RedirectMismatch),
    Failed(TaskFailure),
}

impl PageOutcome {
    pub fn url(&self) -> &str {
        match self {
            PageOutcome::Compared(page) => &page.url,
            PageOutcome::RedirectMismatch(redirect) => &redirect.page.url,
            PageOutcome::Failed(failure) => &failure.url,
        }
    }

    pub fn page(&self) -> Option<&PageResult> {
        match self {
            PageOutcome::Compared(page) => Some(page),
            PageOutcome::RedirectMismatch(redirect) => Some(&redirect.page),
            PageOutcome::Failed(_) => None,
        }
    }

    /// Failed tasks have no tag of their own; they are reported as critical.
    pub fn overall_tag(&self) -> SeverityTag {
        match self {
            PageOutcome::Compared(page) => page.overall_tag,
            PageOutcome::RedirectMismatch(redirect) => redirect.page.overall_tag,
            PageOutcome::Failed(_) => SeverityTag::CriticalDiff,
        }
    }

    /// Whether this page fails the body suite.
    pub fn fails_body(&self) -> bool {
        match self {
            PageOutcome::Compared(page) => page.body_failures().next().is_some(),
            PageOutcome::RedirectMismatch(_) | PageOutcome::Failed(_) => true,
        }
    }

    /// Outcomes worth persisting for resume; failures are retried next run.
    pub fn is_persistable(&self) -> bool {
        !matches!(self, PageOutcome::Failed(_))
    }
}
