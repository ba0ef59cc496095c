//! Region capture against a live page session.

use image::{DynamicImage, ImageFormat};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::browser::PageSession;
use crate::error::{Result, VrcError};
use crate::naming::ArtifactLayout;
use crate::types::{PageOutline, RegionDescriptor, RegionImage, RegionKind, Side};

pub const DEFAULT_MAX_HEIGHT: u32 = 9000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureOptions {
    /// Rows kept from the top of tall regions.
    pub max_height: u32,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            max_height: DEFAULT_MAX_HEIGHT,
        }
    }
}

/// Elements hidden while `region` is captured: every fixed element other than
/// the region itself, plus the header unless the region is the header.
pub fn overlapping_elements(outline: &PageOutline, region: &RegionDescriptor) -> Vec<String> {
    let mut hidden: Vec<String> = outline
        .fixed
        .iter()
        .filter(|selector| **selector != region.selector)
        .cloned()
        .collect();
    if region.kind != RegionKind::Header {
        if let Some(header) = &outline.header {
            if *header != region.selector && !hidden.contains(header) {
                hidden.push(header.clone());
            }
        }
    }
    hidden
}

/// Keeps only the top `max_height` rows.
pub fn crop_to_max_height(image: DynamicImage, max_height: u32) -> DynamicImage {
    if image.height() <= max_height {
        return image;
    }
    image.crop_imm(0, 0, image.width(), max_height)
}

/// Captures one region, hiding overlapping elements for the duration.
///
/// Visibility is restored whenever hiding was attempted, including when the
/// hide call itself failed part way through.
pub async fn capture_region(
    session: &dyn PageSession,
    side: Side,
    outline: &PageOutline,
    region: &RegionDescriptor,
    options: &CaptureOptions,
) -> Result<RegionImage> {
    let hidden = overlapping_elements(outline, region);
    let captured = match session.set_hidden(side, &hidden, true).await {
        Ok(()) => session.capture(side, &region.selector).await,
        Err(err) => Err(err),
    };
    let restored = session.set_hidden(side, &hidden, false).await;
    let bytes = captured?;
    restored?;

    let Some(bytes) = bytes else {
        info!(%side, region = %region.name, "region has zero area; skipped");
        return Ok(RegionImage::absent(&region.name, side));
    };
    decode_capture(&region.name, side, &bytes, options)
}

/// Captures the whole scrollable page under the name `page`.
pub async fn capture_full_page(
    session: &dyn PageSession,
    side: Side,
    options: &CaptureOptions,
) -> Result<RegionImage> {
    let bytes = session.capture_page(side).await?;
    decode_capture(RegionKind::FULL_PAGE_NAME, side, &bytes, options)
}

fn decode_capture(
    name: &str,
    side: Side,
    bytes: &[u8],
    options: &CaptureOptions,
) -> Result<RegionImage> {
    let image = image::load_from_memory_with_format(bytes, ImageFormat::Png)?;
    let original_height = image.height();
    let image = crop_to_max_height(image, options.max_height);
    if image.height() < original_height {
        debug!(
            %side,
            region = name,
            original_height,
            kept = image.height(),
            "cropped tall capture"
        );
    }
    Ok(RegionImage::present(name, side, image))
}

/// Writes a captured region under `screenshots/<side>/<file>/<region>.png`.
pub fn persist_region(
    layout: &ArtifactLayout,
    file: &str,
    region: &RegionImage,
) -> Result<Option<PathBuf>> {
    let Some(image) = &region.image else {
        return Ok(None);
    };
    let path = layout.screenshot(region.side, file, &region.region);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            VrcError::Config(format!(
                "Failed to create screenshot dir {}: {}",
                parent.display(),
                e
            ))
        })?;
    }
    image.save_with_format(&path, ImageFormat::Png)?;
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Navigation;
    use async_trait::async_trait;
    use image::{Rgba, RgbaImage};
    use std::io::Cursor;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSession {
        calls: Mutex<Vec<String>>,
        fail_capture: bool,
        fail_hide: bool,
        png: Option<Vec<u8>>,
    }

    #[async_trait]
    impl PageSession for RecordingSession {
        async fn navigate(&self, _side: Side, url: &str) -> Result<Navigation> {
            Ok(Navigation {
                final_url: url.to_string(),
                blocked_media: Vec::new(),
            })
        }

        async fn outline(&self, _side: Side) -> Result<PageOutline> {
            Ok(PageOutline::default())
        }

        async fn set_hidden(&self, _side: Side, selectors: &[String], hidden: bool) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("hidden={hidden} {}", selectors.join(",")));
            if hidden && self.fail_hide {
                return Err(VrcError::browser("evaluate failed after hiding #cookie"));
            }
            Ok(())
        }

        async fn capture(&self, _side: Side, selector: &str) -> Result<Option<Vec<u8>>> {
            self.calls.lock().unwrap().push(format!("capture {selector}"));
            if self.fail_capture {
                return Err(VrcError::browser("element detached"));
            }
            Ok(self.png.clone())
        }

        async fn capture_page(&self, _side: Side) -> Result<Vec<u8>> {
            self.calls.lock().unwrap().push("capture page".to_string());
            self.png
                .clone()
                .ok_or_else(|| VrcError::browser("no page image"))
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([9, 9, 9, 255])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn outline() -> PageOutline {
        PageOutline {
            header: Some("#h".into()),
            footer: Some("#f".into()),
            siblings: vec![],
            fixed: vec!["#cookie".into(), "#h".into()],
        }
    }

    fn body_region() -> RegionDescriptor {
        RegionDescriptor {
            name: "001".into(),
            kind: RegionKind::Body,
            selector: "#main".into(),
        }
    }

    #[test]
    fn hides_fixed_elements_and_header_for_body_regions() {
        let hidden = overlapping_elements(&outline(), &body_region());
        assert_eq!(hidden, vec!["#cookie".to_string(), "#h".to_string()]);

        let header = RegionDescriptor {
            name: "header".into(),
            kind: RegionKind::Header,
            selector: "#h".into(),
        };
        assert_eq!(overlapping_elements(&outline(), &header), vec!["#cookie".to_string()]);
    }

    #[tokio::test]
    async fn restores_visibility_when_capture_fails() {
        let session = RecordingSession {
            fail_capture: true,
            ..RecordingSession::default()
        };
        let result = capture_region(
            &session,
            Side::Prod,
            &outline(),
            &body_region(),
            &CaptureOptions::default(),
        )
        .await;
        assert!(result.is_err());
        let calls = session.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                "hidden=true #cookie,#h".to_string(),
                "capture #main".to_string(),
                "hidden=false #cookie,#h".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn zero_area_regions_are_absent() {
        let session = RecordingSession::default();
        let region = capture_region(
            &session,
            Side::Migrated,
            &outline(),
            &body_region(),
            &CaptureOptions::default(),
        )
        .await
        .unwrap();
        assert!(region.image.is_none());
        assert_eq!(region.side, Side::Migrated);
    }

    #[tokio::test]
    async fn tall_regions_keep_top_rows() {
        let session = RecordingSession {
            png: Some(png(4, 50)),
            ..RecordingSession::default()
        };
        let region = capture_region(
            &session,
            Side::Prod,
            &outline(),
            &body_region(),
            &CaptureOptions { max_height: 20 },
        )
        .await
        .unwrap();
        assert_eq!(region.height, 20);
        assert_eq!(region.image.as_ref().map(|i| i.width()), Some(4));
    }

    #[tokio::test]
    async fn restores_visibility_when_hiding_fails() {
        let session = RecordingSession {
            fail_hide: true,
            png: Some(png(4, 4)),
            ..RecordingSession::default()
        };
        let result = capture_region(
            &session,
            Side::Prod,
            &outline(),
            &body_region(),
            &CaptureOptions::default(),
        )
        .await;
        assert!(result.is_err());
        let calls = session.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                "hidden=true #cookie,#h".to_string(),
                "hidden=false #cookie,#h".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn full_page_capture_is_named_page_and_cropped() {
        let session = RecordingSession {
            png: Some(png(6, 50)),
            ..RecordingSession::default()
        };
        let page = capture_full_page(&session, Side::Migrated, &CaptureOptions { max_height: 30 })
            .await
            .unwrap();
        assert_eq!(page.region, "page");
        assert_eq!(page.side, Side::Migrated);
        assert_eq!(page.height, 30);
        assert_eq!(
            session.calls.lock().unwrap().clone(),
            vec!["capture page".to_string()]
        );
    }

    #[test]
    fn persist_writes_under_side_directory() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        let region = RegionImage::present(
            "header",
            Side::Prod,
            DynamicImage::ImageRgba8(RgbaImage::new(3, 3)),
        );
        let path = persist_region(&layout, "about", &region).unwrap().unwrap();
        assert!(path.ends_with("screenshots/prod/about/header.png"));
        assert!(path.exists());

        let absent = RegionImage::absent("001", Side::Prod);
        assert!(persist_region(&layout, "about", &absent).unwrap().is_none());
    }
}
