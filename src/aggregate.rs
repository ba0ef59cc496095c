//! Page-level aggregation of component verdicts.
//!
//! Component mismatches are averaged weighted by region height. Ignore rules
//! downgrade known differences, and diverging redirects short-circuit the
//! whole page.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};
use url::Url;

use crate::diff::round2;
use crate::error::{Result, VrcError};
use crate::severity::{classify, worst_of, SeverityTag};
use crate::types::{
    ComponentResult, MediaComparison, PageOutcome, PageResult, RedirectMismatch, RegionDescriptor,
    UrlPair,
};

/// A known, accepted difference for one component of one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IgnoreRule {
    /// Relative URL or production URL of the page.
    pub url: String,
    pub component: String,
    /// Mismatch percentage the rule accepts, compared at 2-decimal precision.
    pub percents: f64,
}

impl IgnoreRule {
    pub fn matches(&self, pair: &UrlPair, result: &ComponentResult) -> bool {
        let Some(mismatch) = result.mismatch_percent else {
            return false;
        };
        (self.url == pair.relative_url || self.url == pair.prod_url)
            && self.component == result.component
            && percent_key(self.percents) == percent_key(mismatch)
    }
}

fn percent_key(value: f64) -> i64 {
    (value * 100.0).round() as i64
}

/// Ignore rules loaded once per run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IgnoreList {
    rules: Vec<IgnoreRule>,
}

impl IgnoreList {
    pub fn new(rules: Vec<IgnoreRule>) -> Self {
        Self { rules }
    }

    /// Loads rules from a `.json`, `.yaml` or `.yml` file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            VrcError::Config(format!(
                "Failed to read ignore list {}: {}",
                path.display(),
                e
            ))
        })?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let rules: Vec<IgnoreRule> = match ext.as_deref() {
            Some("json") => serde_json::from_str(&content).map_err(|e| {
                VrcError::Config(format!("Invalid ignore list {}: {}", path.display(), e))
            })?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content).map_err(|e| {
                VrcError::Config(format!("Invalid ignore list {}: {}", path.display(), e))
            })?,
            _ => {
                return Err(VrcError::Config(format!(
                    "Unsupported ignore list format for {} (expected .json, .yaml or .yml)",
                    path.display()
                )))
            }
        };
        info!(count = rules.len(), path = %path.display(), "loaded ignore rules");
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn find(&self, pair: &UrlPair, result: &ComponentResult) -> Option<&IgnoreRule> {
        self.rules.iter().find(|rule| rule.matches(pair, result))
    }

    /// Downgrades a failing result covered by a rule to `ignored-diff`.
    pub fn apply(&self, pair: &UrlPair, result: &mut ComponentResult) {
        if !result.tag.is_failure() {
            return;
        }
        if let Some(rule) = self.find(pair, result) {
            debug!(url = %pair.relative_url, component = %result.component, "ignore rule matched");
            let previous = result.tag;
            result.tag = SeverityTag::IgnoredDiff;
            result.matched = true;
            let note = format!(
                "ignored {} ({}%) by rule url={} component={} percents={}",
                previous, rule.percents, rule.url, rule.component, rule.percents
            );
            result.log = Some(match result.log.take() {
                Some(existing) => format!("{existing}; {note}"),
                None => note,
            });
        }
    }
}

/// Region names across both sides: production order first, then names
/// present only in the migrated page.
pub fn region_union(prod: &[RegionDescriptor], migrated: &[RegionDescriptor]) -> Vec<String> {
    let mut names: Vec<String> = prod.iter().map(|r| r.name.clone()).collect();
    for region in migrated {
        if !names.contains(&region.name) {
            names.push(region.name.clone());
        }
    }
    names
}

/// Whether two final URLs point at different documents.
///
/// Only path, query and fragment are compared, since the origins always differ.
pub fn redirect_diverges(prod_final: &str, migrated_final: &str) -> bool {
    match (Url::parse(prod_final), Url::parse(migrated_final)) {
        (Ok(prod), Ok(migrated)) => {
            prod.path() != migrated.path()
                || prod.query() != migrated.query()
                || prod.fragment() != migrated.fragment()
        }
        _ => prod_final != migrated_final,
    }
}

/// Builds the short-circuit outcome for diverging redirects.
pub fn redirect_outcome(pair: &UrlPair, prod_final: &str, migrated_final: &str) -> PageOutcome {
    info!(
        url = %pair.relative_url,
        prod = prod_final,
        migrated = migrated_final,
        "final URLs diverge after redirects"
    );
    PageOutcome::RedirectMismatch(RedirectMismatch {
        page: PageResult {
            url: pair.relative_url.clone(),
            prod_url: pair.prod_url.clone(),
            migrated_url: pair.migrated_url.clone(),
            overall_mismatch: Some(100.0),
            overall_tag: SeverityTag::RedirectUrlMismatch,
            components: Vec::new(),
            redirect_mismatch: true,
            media: None,
            full_page: None,
        },
        prod_final_url: prod_final.to_string(),
        migrated_final_url: migrated_final.to_string(),
    })
}

/// Height-weighted mean over results with a known mismatch and positive height.
pub fn weighted_mismatch(components: &[ComponentResult]) -> Option<f64> {
    let (weighted, total_height) = components
        .iter()
        .filter(|c| c.height > 0)
        .filter_map(|c| c.mismatch_percent.map(|m| (m, c.height as f64)))
        .fold((0.0, 0.0), |(sum, heights), (m, h)| (sum + m * h, heights + h));
    if total_height == 0.0 {
        None
    } else {
        Some(round2(weighted / total_height))
    }
}

/// Rolls component verdicts up to a page verdict, applying ignore rules first.
pub fn aggregate_page(
    pair: &UrlPair,
    mut components: Vec<ComponentResult>,
    ignore: &IgnoreList,
    media: Option<MediaComparison>,
) -> PageResult {
    for result in &mut components {
        ignore.apply(pair, result);
    }

    let overall_mismatch = weighted_mismatch(&components);
    let structural = worst_of(
        components
            .iter()
            .map(|c| c.tag)
            .filter(|tag| tag.is_structural()),
    );
    let overall_tag = classify(overall_mismatch).worst(structural);

    PageResult {
        url: pair.relative_url.clone(),
        prod_url: pair.prod_url.clone(),
        migrated_url: pair.migrated_url.clone(),
        overall_mismatch,
        overall_tag,
        components,
        redirect_mismatch: false,
        media,
        full_page: None,
    }
}
