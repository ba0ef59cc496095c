//! Core types shared by the capture, diff and scheduling stages.
//!
//! - [`UrlPair`] - One production/migrated comparison task
//! - [`Side`] - Which environment an artifact belongs to
//! - [`RegionDescriptor`] - A named region produced by the segmenter
//! - [`RegionImage`] - A captured (or absent) region raster

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use crate::viewport::Viewport;

/// A single page to compare across both environments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlPair {
    pub relative_url: String,
    pub prod_url: String,
    pub migrated_url: String,
}

impl UrlPair {
    pub fn url(&self, side: Side) -> &str {
        match side {
            Side::Prod => &self.prod_url,
            Side::Migrated => &self.migrated_url,
        }
    }
}

/// The environment an image or navigation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Prod,
    Migrated,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Prod, Side::Migrated];

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Prod => "prod",
            Side::Migrated => "migrated",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Region category; header and footer are reported apart from body blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionKind {
    Header,
    Body,
    Footer,
}

impl RegionKind {
    pub const HEADER_NAME: &'static str = "header";
    pub const FOOTER_NAME: &'static str = "footer";
    /// Name of the full-page capture, kept apart from the region list.
    pub const FULL_PAGE_NAME: &'static str = "page";

    /// Category of a region by its name.
    pub fn of(name: &str) -> RegionKind {
        match name {
            Self::HEADER_NAME => RegionKind::Header,
            Self::FOOTER_NAME => RegionKind::Footer,
            _ => RegionKind::Body,
        }
    }
}

/// Rectangle bounds for an element, in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// A region emitted by the segmenter, addressable in the live page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionDescriptor {
    pub name: String,
    pub kind: RegionKind,
    /// CSS selector resolving to exactly one element in the rendered page.
    pub selector: String,
}

/// A region raster for one side. `image == None` means the region was not
/// captured (zero area or absent), which is different from a zero-height image.
#[derive(Debug, Clone)]
pub struct RegionImage {
    pub region: String,
    pub side: Side,
    pub image: Option<DynamicImage>,
    pub height: u32,
}

impl RegionImage {
    pub fn present(region: impl Into<String>, side: Side, image: DynamicImage) -> Self {
        let height = image.height();
        Self {
            region: region.into(),
            side,
            image: Some(image),
            height,
        }
    }

    pub fn absent(region: impl Into<String>, side: Side) -> Self {
        Self {
            region: region.into(),
            side,
            image: None,
            height: 0,
        }
    }
}
