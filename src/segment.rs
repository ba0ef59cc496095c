//! Splits a rendered page into named regions.
//!
//! The header comes first and the footer last. Between them, every element
//! sibling that follows the header up to the footer (or the sibling that
//! contains it) becomes a body region named by its 1-based ordinal.

use tracing::warn;

use crate::types::{PageOutline, RegionDescriptor, RegionKind};

/// Formats the name of the `ordinal`-th body region (1-based).
pub fn body_region_name(ordinal: usize) -> String {
    format!("{ordinal:03}")
}

/// Produces the region list for one page outline.
///
/// Body walking needs both anchors; without a header or footer only the
/// anchors that exist are emitted.
pub fn segment(outline: &PageOutline) -> Vec<RegionDescriptor> {
    let mut regions = Vec::new();

    if let Some(header) = &outline.header {
        regions.push(RegionDescriptor {
            name: RegionKind::HEADER_NAME.to_string(),
            kind: RegionKind::Header,
            selector: header.clone(),
        });
    }

    match (&outline.header, &outline.footer) {
        (Some(_), Some(_)) => {
            let body = outline
                .siblings
                .iter()
                .take_while(|node| !node.ends_body())
                .filter(|node| !node.is_script() && !node.is_fixed());
            for (idx, node) in body.enumerate() {
                regions.push(RegionDescriptor {
                    name: body_region_name(idx + 1),
                    kind: RegionKind::Body,
                    selector: node.selector.clone(),
                });
            }
        }
        (header, footer) => {
            warn!(
                header = header.is_some(),
                footer = footer.is_some(),
                "page is missing a header or footer; body regions skipped"
            );
        }
    }

    if let Some(footer) = &outline.footer {
        regions.push(RegionDescriptor {
            name: RegionKind::FOOTER_NAME.to_string(),
            kind: RegionKind::Footer,
            selector: footer.clone(),
        });
    }

    regions
}
