//! Page outline types as emitted by the helper, and their conversion.

use crate::types::{BoundingBox, OutlineNode, PageOutline};

/// Raw outline as returned by the helper's `outline` op.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawOutline {
    pub header: Option<String>,
    pub footer: Option<String>,
    #[serde(default)]
    pub siblings: Vec<RawOutlineNode>,
    #[serde(default)]
    pub fixed: Vec<String>,
}

/// Raw sibling node from the helper output.
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawOutlineNode {
    pub selector: String,
    pub tag: String,
    #[serde(default)]
    pub position: Option<String>,
    pub bounding_box: Option<RawBoundingBox>,
    #[serde(default)]
    pub is_footer: bool,
    #[serde(default)]
    pub contains_footer: bool,
}

/// Raw bounding box from the helper output.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct RawBoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

fn non_empty(selector: Option<String>) -> Option<String> {
    selector.filter(|s| !s.trim().is_empty())
}

/// Converts the helper's outline into a [`PageOutline`].
///
/// Nodes without a selector cannot be captured and are dropped; missing
/// positions default to `static`.
pub(crate) fn convert_raw_outline(raw: RawOutline) -> PageOutline {
    let siblings = raw
        .siblings
        .into_iter()
        .filter(|node| !node.selector.trim().is_empty())
        .map(|node| OutlineNode {
            selector: node.selector,
            tag: node.tag.to_ascii_lowercase(),
            position: node.position.unwrap_or_else(|| "static".to_string()),
            bounding_box: node
                .bounding_box
                .map(|b| BoundingBox {
                    x: b.x,
                    y: b.y,
                    width: b.width.max(0.0),
                    height: b.height.max(0.0),
                })
                .unwrap_or_default(),
            is_footer: node.is_footer,
            contains_footer: node.contains_footer,
        })
        .collect();

    PageOutline {
        header: non_empty(raw.header),
        footer: non_empty(raw.footer),
        siblings,
        fixed: raw
            .fixed
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_helper_payload() {
        let raw: RawOutline = serde_json::from_str(
            r#"{
                "header": "[data-vrc-node=\"0\"]",
                "footer": "[data-vrc-node=\"3\"]",
                "siblings": [
                    {"selector": "[data-vrc-node=\"1\"]", "tag": "SECTION", "position": "static",
                     "boundingBox": {"x": 0, "y": 80, "width": 1280, "height": 400}},
                    {"selector": "", "tag": "div"},
                    {"selector": "[data-vrc-node=\"3\"]", "tag": "footer", "isFooter": true}
                ],
                "fixed": ["[data-vrc-node=\"2\"]", ""]
            }"#,
        )
        .unwrap();

        let outline = convert_raw_outline(raw);
        assert_eq!(outline.header.as_deref(), Some("[data-vrc-node=\"0\"]"));
        assert_eq!(outline.siblings.len(), 2);
        assert_eq!(outline.siblings[0].tag, "section");
        assert_eq!(outline.siblings[0].bounding_box.height, 400.0);
        assert_eq!(outline.siblings[1].position, "static");
        assert!(outline.siblings[1].ends_body());
        assert_eq!(outline.fixed.len(), 1);
    }

    #[test]
    fn blank_anchors_become_none() {
        let outline = convert_raw_outline(RawOutline {
            header: Some("  ".into()),
            footer: None,
            ..RawOutline::default()
        });
        assert!(outline.header.is_none());
        assert!(outline.footer.is_none());
    }
}
