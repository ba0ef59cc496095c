//! Deterministic artifact naming.
//!
//! Every page gets one filesystem-safe name derived from its URL; all of its
//! screenshots, diffs and persisted results live under that name so parallel
//! workers never write to the same path.

use std::path::{Path, PathBuf};

use crate::types::Side;

const ILLEGAL_CHARS: [char; 10] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*', '\0'];

/// Derives the artifact name for a URL.
///
/// The first occurrence of the migrated origin and then of the production
/// origin is removed, one leading `/` is stripped, and characters that are
/// illegal in filenames become `%` followed by their lowercase hex code
/// without padding. An empty result maps to `index`.
pub fn file_name_for(url: &str, prod_origin: &str, migrated_origin: &str) -> String {
    let mut name = remove_first(url, migrated_origin);
    name = remove_first(&name, prod_origin);
    let trimmed = name.strip_prefix('/').unwrap_or(&name);

    let mut encoded = String::with_capacity(trimmed.len());
    for ch in trimmed.chars() {
        if ILLEGAL_CHARS.contains(&ch) {
            encoded.push_str(&format!("%{:x}", ch as u32));
        } else {
            encoded.push(ch);
        }
    }

    if encoded.is_empty() {
        "index".to_string()
    } else {
        encoded
    }
}

fn remove_first(haystack: &str, needle: &str) -> String {
    if needle.is_empty() {
        return haystack.to_string();
    }
    haystack.replacen(needle, "", 1)
}

/// Paths of every artifact written under the output directory.
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    root: PathBuf,
}

impl ArtifactLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn screenshot_dir(&self, side: Side, file: &str) -> PathBuf {
        self.root.join("screenshots").join(side.as_str()).join(file)
    }

    pub fn screenshot(&self, side: Side, file: &str, region: &str) -> PathBuf {
        self.screenshot_dir(side, file).join(format!("{region}.png"))
    }

    pub fn diff(&self, file: &str, region: &str) -> PathBuf {
        self.root.join("diffs").join(file).join(format!("{region}.png"))
    }

    pub fn results_dir(&self) -> PathBuf {
        self.root.join("results")
    }

    pub fn result(&self, file: &str) -> PathBuf {
        self.results_dir().join(format!("{file}.json"))
    }

    pub fn junit(&self, suite: &str) -> PathBuf {
        self.root.join(format!("junit-{suite}.xml"))
    }

    pub fn html_report(&self) -> PathBuf {
        self.root.join("report.html")
    }

    pub fn summary(&self) -> PathBuf {
        self.root.join("summary.json")
    }

    /// Path relative to the output directory, as referenced from reports.
    pub fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROD: &str = "https://www.example.com";
    const MIGRATED: &str = "https://new.example.com";

    #[test]
    fn root_url_maps_to_index() {
        assert_eq!(file_name_for("", PROD, MIGRATED), "index");
        assert_eq!(file_name_for("https://www.example.com/", PROD, MIGRATED), "index");
        assert_eq!(file_name_for("/", PROD, MIGRATED), "index");
    }

    #[test]
    fn nested_paths_are_percent_encoded() {
        assert_eq!(
            file_name_for("https://new.example.com/blog/post-1", PROD, MIGRATED),
            "blog%2fpost-1"
        );
        assert_eq!(
            file_name_for("https://www.example.com/search?q=a*b", PROD, MIGRATED),
            "search%3fq=a%2ab"
        );
    }

    #[test]
    fn nul_is_encoded_without_padding() {
        assert_eq!(file_name_for("/a\0b", PROD, MIGRATED), "a%0b");
    }

    #[test]
    fn both_sides_of_a_pair_share_a_name() {
        let prod = file_name_for("https://www.example.com/about", PROD, MIGRATED);
        let migrated = file_name_for("https://new.example.com/about", PROD, MIGRATED);
        assert_eq!(prod, migrated);
        assert_eq!(prod, file_name_for("https://www.example.com/about", PROD, MIGRATED));
    }

    #[test]
    fn only_one_leading_slash_is_stripped() {
        assert_eq!(file_name_for("//x", PROD, MIGRATED), "%2fx");
    }

    #[test]
    fn layout_places_artifacts_under_root() {
        let layout = ArtifactLayout::new("/out");
        assert_eq!(
            layout.screenshot(Side::Migrated, "about", "001"),
            PathBuf::from("/out/screenshots/migrated/about/001.png")
        );
        assert_eq!(layout.diff("about", "header"), PathBuf::from("/out/diffs/about/header.png"));
        assert_eq!(layout.result("index"), PathBuf::from("/out/results/index.json"));
        assert_eq!(layout.junit("body"), PathBuf::from("/out/junit-body.xml"));
        assert_eq!(
            layout.relative(Path::new("/out/diffs/about/header.png")),
            PathBuf::from("diffs/about/header.png")
        );
    }
}
