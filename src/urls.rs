//! URL lists: loading, pairing with both origins, list diffs and preflight.

use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Result, VrcError};
use crate::naming::file_name_for;
use crate::types::UrlPair;

pub const PROD_ORIGIN_VAR: &str = "PROD_WEBSITE_URL";
pub const MIGRATED_ORIGIN_VAR: &str = "MIGRATED_WEBSITE_URL";
/// Older name for the migrated origin.
pub const STAGE_ORIGIN_VAR: &str = "STAGE_WEBSITE_URL";
pub const BYPASS_SECRET_VAR: &str = "VERCEL_AUTOMATION_BYPASS_SECRET";

const BYPASS_HEADER: &str = "x-vercel-protection-bypass";
const BYPASS_COOKIE_HEADER: &str = "x-vercel-set-bypass-cookie";

/// Origins of both environments plus headers only the migrated side sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environments {
    pub prod_origin: String,
    pub migrated_origin: String,
    pub migrated_headers: BTreeMap<String, String>,
}

fn normalize_origin(var: &str, raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = Url::parse(trimmed)
        .map_err(|e| VrcError::Config(format!("{var} is not a valid URL ({trimmed}): {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(VrcError::Config(format!(
            "{var} must be an http(s) origin, got {trimmed}"
        )));
    }
    Ok(trimmed.to_string())
}

impl Environments {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves origins through `lookup`; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let prod = get(PROD_ORIGIN_VAR).ok_or_else(|| {
            VrcError::Config(format!("{PROD_ORIGIN_VAR} is not set"))
        })?;
        let migrated = get(MIGRATED_ORIGIN_VAR)
            .or_else(|| get(STAGE_ORIGIN_VAR))
            .ok_or_else(|| {
                VrcError::Config(format!(
                    "{MIGRATED_ORIGIN_VAR} (or {STAGE_ORIGIN_VAR}) is not set"
                ))
            })?;

        let mut migrated_headers = BTreeMap::new();
        if let Some(secret) = get(BYPASS_SECRET_VAR) {
            migrated_headers.insert(BYPASS_HEADER.to_string(), secret);
            migrated_headers.insert(BYPASS_COOKIE_HEADER.to_string(), "true".to_string());
        }

        Ok(Self {
            prod_origin: normalize_origin(PROD_ORIGIN_VAR, &prod)?,
            migrated_origin: normalize_origin(MIGRATED_ORIGIN_VAR, &migrated)?,
            migrated_headers,
        })
    }

    /// Builds the pair for one list entry, relative or absolute.
    pub fn pair(&self, entry: &str) -> Result<UrlPair> {
        let entry = entry.trim();
        if entry.is_empty() {
            return Err(VrcError::Config("url list contains an empty entry".into()));
        }

        let relative = if let Some(rest) = entry.strip_prefix(&self.prod_origin) {
            rest.to_string()
        } else if let Some(rest) = entry.strip_prefix(&self.migrated_origin) {
            rest.to_string()
        } else if entry.starts_with("http://") || entry.starts_with("https://") {
            let url = Url::parse(entry)
                .map_err(|e| VrcError::Config(format!("url list entry {entry} is invalid: {e}")))?;
            let mut relative = url.path().to_string();
            if let Some(query) = url.query() {
                relative.push('?');
                relative.push_str(query);
            }
            if let Some(fragment) = url.fragment() {
                relative.push('#');
                relative.push_str(fragment);
            }
            relative
        } else {
            entry.to_string()
        };

        let relative = if relative.starts_with('/') {
            relative
        } else {
            format!("/{relative}")
        };

        Ok(UrlPair {
            prod_url: format!("{}{}", self.prod_origin, relative),
            migrated_url: format!("{}{}", self.migrated_origin, relative),
            relative_url: relative,
        })
    }

    /// Pairs every entry, dropping repeats of the same relative URL.
    ///
    /// Two different URLs that map to the same artifact name would overwrite
    /// each other's screenshots and results, so that is a fatal error.
    pub fn pairs(&self, entries: &[String]) -> Result<Vec<UrlPair>> {
        let mut seen = HashSet::new();
        let mut artifact_names: HashMap<String, String> = HashMap::new();
        let mut pairs = Vec::with_capacity(entries.len());
        for entry in entries {
            let pair = self.pair(entry)?;
            if !seen.insert(pair.relative_url.clone()) {
                debug!(url = %pair.relative_url, "skipping duplicate url list entry");
                continue;
            }
            let name = file_name_for(&pair.prod_url, &self.prod_origin, &self.migrated_origin);
            if let Some(existing) = artifact_names.insert(name.clone(), pair.relative_url.clone()) {
                return Err(VrcError::Config(format!(
                    "url list entries {} and {} share the artifact name {}",
                    existing, pair.relative_url, name
                )));
            }
            pairs.push(pair);
        }
        Ok(pairs)
    }
}

/// Reads a JSON array of URL strings.
pub fn load_url_list(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|e| {
        VrcError::Config(format!("Failed to read url list {}: {}", path.display(), e))
    })?;
    serde_json::from_str::<Vec<String>>(&content).map_err(|e| {
        VrcError::Config(format!(
            "url list {} must be a JSON array of strings: {}",
            path.display(),
            e
        ))
    })
}

/// An entry present in only one of two URL lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlListDifference {
    pub url: String,
    pub source: String,
}

/// Entries found in only one list, ordered by source, then length, then text.
pub fn diff_url_lists(
    left: &[String],
    left_source: &str,
    right: &[String],
    right_source: &str,
) -> Vec<UrlListDifference> {
    let left_set: HashSet<&str> = left.iter().map(String::as_str).collect();
    let right_set: HashSet<&str> = right.iter().map(String::as_str).collect();

    let mut diff: Vec<UrlListDifference> = left
        .iter()
        .filter(|u| !right_set.contains(u.as_str()))
        .map(|u| UrlListDifference {
            url: u.clone(),
            source: left_source.to_string(),
        })
        .chain(
            right
                .iter()
                .filter(|u| !left_set.contains(u.as_str()))
                .map(|u| UrlListDifference {
                    url: u.clone(),
                    source: right_source.to_string(),
                }),
        )
        .collect();

    diff.sort_by(|a, b| {
        a.source
            .cmp(&b.source)
            .then(a.url.len().cmp(&b.url.len()))
            .then_with(|| a.url.cmp(&b.url))
    });
    diff.dedup();
    diff
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrlCheckOptions {
    pub concurrency: usize,
    /// Extra attempts after an HTTP 502.
    pub retries: u32,
    pub retry_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for UrlCheckOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            retries: 3,
            retry_delay: Duration::from_millis(500),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Preflight verdict for one URL; status 0 means no response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlCheck {
    pub url: String,
    pub status: u16,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| VrcError::Config(format!("invalid header name {name}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| VrcError::Config(format!("invalid header value for {name}: {e}")))?;
        map.insert(name, value);
    }
    Ok(map)
}

async fn check_url(client: &Client, url: String, options: &UrlCheckOptions) -> UrlCheck {
    let mut attempt = 0;
    loop {
        let status = match client.get(&url).send().await {
            Ok(response) => response.status(),
            Err(err) => {
                return UrlCheck {
                    url,
                    status: 0,
                    ok: false,
                    reason: Some(err.to_string()),
                }
            }
        };

        if status == StatusCode::BAD_GATEWAY && attempt < options.retries {
            attempt += 1;
            warn!(%url, attempt, retries = options.retries, "502 received; retrying");
            tokio::time::sleep(options.retry_delay).await;
            continue;
        }

        let ok = status.as_u16() < 400;
        return UrlCheck {
            url,
            status: status.as_u16(),
            ok,
            reason: (!ok).then(|| format!("HTTP status {}", status.as_u16())),
        };
    }
}

/// GETs every URL with bounded concurrency; results keep input order.
pub async fn check_urls(
    urls: &[String],
    headers: &BTreeMap<String, String>,
    options: &UrlCheckOptions,
) -> Result<Vec<UrlCheck>> {
    let client = Client::builder()
        .timeout(options.request_timeout)
        .default_headers(header_map(headers)?)
        .build()?;

    info!(urls = urls.len(), concurrency = options.concurrency, "checking urls");
    let checks: Vec<UrlCheck> = stream::iter(urls.iter().cloned())
        .map(|url| {
            let client = &client;
            async move { check_url(client, url, options).await }
        })
        .buffered(options.concurrency.max(1))
        .collect()
        .await;

    for check in checks.iter().filter(|c| !c.ok) {
        warn!(url = %check.url, status = check.status, reason = ?check.reason, "invalid url");
    }
    Ok(checks)
}
