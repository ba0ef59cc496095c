//! Page outline types extracted from a rendered page.
//!
//! The browser helper reduces the live DOM to the handful of facts the
//! segmenter needs: where the header and footer are, which elements follow
//! the header, and which elements are pinned with `position: fixed`.

use serde::{Deserialize, Serialize};

use super::core::BoundingBox;

/// Outline of one rendered page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageOutline {
    /// Selector of the page header, if one was found.
    pub header: Option<String>,
    /// Selector of the page footer, if one was found.
    pub footer: Option<String>,
    /// Element siblings following the header, in document order.
    #[serde(default)]
    pub siblings: Vec<OutlineNode>,
    /// Selectors of every `position: fixed` element on the page.
    #[serde(default)]
    pub fixed: Vec<String>,
}

/// One element sibling following the header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineNode {
    pub selector: String,
    /// Lowercase tag name.
    pub tag: String,
    /// Computed CSS `position`.
    pub position: String,
    pub bounding_box: BoundingBox,
    #[serde(default)]
    pub is_footer: bool,
    #[serde(default)]
    pub contains_footer: bool,
}

impl OutlineNode {
    pub fn is_fixed(&self) -> bool {
        self.position.eq_ignore_ascii_case("fixed")
    }

    pub fn is_script(&self) -> bool {
        self.tag.eq_ignore_ascii_case("script")
    }

    /// The footer, or an ancestor of it, ends the body walk.
    pub fn ends_body(&self) -> bool {
        self.is_footer || self.contains_footer
    }
}

/// Result of navigating one side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Navigation {
    /// URL after redirects.
    pub final_url: String,
    /// Filenames of media requests aborted during the load.
    #[serde(default)]
    pub blocked_media: Vec<String>,
}
