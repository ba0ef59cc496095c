//! Perceptual image comparison for captured regions.
//!
//! Pixels are compared in YIQ space the way pixelmatch does it: a pixel
//! differs when its weighted color delta exceeds `35215 * threshold²`, and
//! anti-aliased edge pixels are detected from their neighborhood and not
//! counted. Images of different sizes are padded with transparent pixels to
//! the larger width and height before comparison.

use image::{DynamicImage, GenericImage, Rgba, RgbaImage};
use tracing::debug;

use crate::error::{Result, VrcError};
use crate::severity::{classify, SeverityTag};
use crate::types::{ComponentResult, RegionImage};

/// Largest possible YIQ delta between two pixels.
const MAX_YIQ_DELTA: f64 = 35215.0;

pub const DEFAULT_THRESHOLD: f64 = 0.1;

const DIFF_COLOR: Rgba<u8> = Rgba([255, 0, 255, 255]);

/// Comparison tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffOptions {
    /// Matching threshold in `[0, 1]`; smaller is more sensitive.
    pub threshold: f64,
    /// Count anti-aliased pixels as differences.
    pub include_anti_aliased: bool,
    /// Opacity of the grayscale backdrop in the overlay.
    pub backdrop_alpha: f64,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            include_anti_aliased: false,
            backdrop_alpha: 0.1,
        }
    }
}

/// Raw pixel counts and the rendered overlay.
#[derive(Debug, Clone)]
pub struct PixelDiff {
    pub differing: u64,
    pub total: u64,
    pub overlay: RgbaImage,
}

impl PixelDiff {
    pub fn mismatch_percent(&self) -> f64 {
        sanitize_percent(round2(self.differing as f64 / self.total as f64 * 100.0))
    }
}

/// A component verdict plus the overlay to persist when it differs.
#[derive(Debug, Clone)]
pub struct RegionComparison {
    pub result: ComponentResult,
    pub overlay: Option<RgbaImage>,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Non-finite percentages count as a total mismatch.
pub fn sanitize_percent(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        100.0
    }
}

/// Pads an image to `width` x `height` with transparent pixels, top-left aligned.
pub fn pad_to(image: &DynamicImage, width: u32, height: u32) -> RgbaImage {
    let source = image.to_rgba8();
    if source.width() == width && source.height() == height {
        return source;
    }
    let mut padded = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
    // copy_from only fails when the source does not fit, which padding rules out.
    let _ = padded.copy_from(&source, 0, 0);
    padded
}

/// Compares two equally sized images pixel by pixel.
pub fn pixel_diff(left: &RgbaImage, right: &RgbaImage, options: &DiffOptions) -> Result<PixelDiff> {
    if left.dimensions() != right.dimensions() {
        return Err(VrcError::diff(format!(
            "image sizes do not match: {:?} vs {:?}",
            left.dimensions(),
            right.dimensions()
        )));
    }
    let (width, height) = left.dimensions();
    let total = width as u64 * height as u64;
    let mut overlay = RgbaImage::new(width, height);
    let a = left.as_raw();
    let b = right.as_raw();

    if a == b {
        for (x, y, pixel) in left.enumerate_pixels() {
            overlay.put_pixel(x, y, gray_pixel(pixel, options.backdrop_alpha));
        }
        return Ok(PixelDiff {
            differing: 0,
            total,
            overlay,
        });
    }

    let max_delta = MAX_YIQ_DELTA * options.threshold * options.threshold;
    let mut differing = 0u64;

    for y in 0..height {
        for x in 0..width {
            let pos = idx(x, y, width);
            let delta = color_delta(a, b, pos, pos, false);
            if delta.abs() > max_delta {
                let anti_aliased = !options.include_anti_aliased
                    && (is_anti_aliased(a, b, x, y, width, height)
                        || is_anti_aliased(b, a, x, y, width, height));
                if anti_aliased {
                    overlay.put_pixel(x, y, gray_pixel(left.get_pixel(x, y), options.backdrop_alpha));
                } else {
                    overlay.put_pixel(x, y, DIFF_COLOR);
                    differing += 1;
                }
            } else {
                overlay.put_pixel(x, y, gray_pixel(left.get_pixel(x, y), options.backdrop_alpha));
            }
        }
    }

    Ok(PixelDiff {
        differing,
        total,
        overlay,
    })
}

/// Builds the component verdict for one region from both sides' captures.
///
/// Extra regions (migrated only) score 100% weighted by the migrated height.
/// Missing regions (production only) have no score and carry no weight.
/// Comparing two absent images is an error.
pub fn compare_regions(
    prod: &RegionImage,
    migrated: &RegionImage,
    options: &DiffOptions,
) -> Result<RegionComparison> {
    let component = prod.region.clone();
    match (&prod.image, &migrated.image) {
        (None, None) => Err(VrcError::diff(format!(
            "region '{component}' has no image on either side"
        ))),
        (None, Some(_)) => Ok(RegionComparison {
            result: ComponentResult {
                component,
                mismatch_percent: Some(100.0),
                matched: false,
                tag: SeverityTag::ExtraInMigrated,
                diff_image: None,
                prod_image: None,
                migrated_image: None,
                log: Some("region exists only in the migrated page".to_string()),
                height: migrated.height,
            },
            overlay: None,
        }),
        (Some(_), None) => Ok(RegionComparison {
            result: ComponentResult {
                component,
                mismatch_percent: None,
                matched: false,
                tag: SeverityTag::MissingInMigrated,
                diff_image: None,
                prod_image: None,
                migrated_image: None,
                log: Some("region is missing from the migrated page".to_string()),
                height: prod.height,
            },
            overlay: None,
        }),
        (Some(prod_image), Some(migrated_image)) => {
            let width = prod_image.width().max(migrated_image.width());
            let height = prod_image.height().max(migrated_image.height());
            let left = pad_to(prod_image, width, height);
            let right = pad_to(migrated_image, width, height);

            let (mismatch, overlay, log) = match pixel_diff(&left, &right, options) {
                Ok(diff) => {
                    let mismatch = diff.mismatch_percent();
                    debug!(
                        region = %component,
                        differing = diff.differing,
                        total = diff.total,
                        mismatch,
                        "compared region"
                    );
                    let overlay = (mismatch > 0.0).then_some(diff.overlay);
                    (mismatch, overlay, None)
                }
                Err(err) => (100.0, None, Some(err.to_string())),
            };

            Ok(RegionComparison {
                result: ComponentResult {
                    component,
                    mismatch_percent: Some(mismatch),
                    matched: mismatch == 0.0,
                    tag: classify(Some(mismatch)),
                    diff_image: None,
                    prod_image: None,
                    migrated_image: None,
                    log,
                    height: prod.height.max(migrated.height),
                },
                overlay,
            })
        }
    }
}

#[inline]
fn idx(x: u32, y: u32, width: u32) -> usize {
    (y as usize * width as usize + x as usize) * 4
}

fn blend(channel: f64, alpha: f64) -> f64 {
    255.0 + (channel - 255.0) * alpha
}

fn rgb2y(r: f64, g: f64, b: f64) -> f64 {
    r * 0.29889531 + g * 0.58662247 + b * 0.11448223
}

fn rgb2i(r: f64, g: f64, b: f64) -> f64 {
    r * 0.59597799 - g * 0.27417610 - b * 0.32180189
}

fn rgb2q(r: f64, g: f64, b: f64) -> f64 {
    r * 0.21147017 - g * 0.52261711 + b * 0.31114694
}

/// Pixel color blended onto white, as (r, g, b).
fn blended(buf: &[u8], pos: usize) -> (f64, f64, f64) {
    let (r, g, b, a) = (
        buf[pos] as f64,
        buf[pos + 1] as f64,
        buf[pos + 2] as f64,
        buf[pos + 3] as f64,
    );
    if a < 255.0 {
        let alpha = a / 255.0;
        (blend(r, alpha), blend(g, alpha), blend(b, alpha))
    } else {
        (r, g, b)
    }
}

/// Signed YIQ delta between two pixels; negative when the first is brighter.
fn color_delta(a: &[u8], b: &[u8], k: usize, m: usize, y_only: bool) -> f64 {
    if a[k..k + 4] == b[m..m + 4] {
        return 0.0;
    }
    let (r1, g1, b1) = blended(a, k);
    let (r2, g2, b2) = blended(b, m);

    let y1 = rgb2y(r1, g1, b1);
    let y2 = rgb2y(r2, g2, b2);
    let y = y1 - y2;
    if y_only {
        return y;
    }

    let i = rgb2i(r1, g1, b1) - rgb2i(r2, g2, b2);
    let q = rgb2q(r1, g1, b1) - rgb2q(r2, g2, b2);
    let delta = 0.5053 * y * y + 0.299 * i * i + 0.1957 * q * q;
    if y1 > y2 {
        -delta
    } else {
        delta
    }
}

fn neighborhood(x: u32, y: u32, width: u32, height: u32) -> (u32, u32, u32, u32) {
    (
        x.saturating_sub(1),
        y.saturating_sub(1),
        (x + 1).min(width - 1),
        (y + 1).min(height - 1),
    )
}

/// Whether the pixel at (x, y) in `img` looks like an anti-aliased edge.
fn is_anti_aliased(img: &[u8], other: &[u8], x1: u32, y1: u32, width: u32, height: u32) -> bool {
    let (x0, y0, x2, y2) = neighborhood(x1, y1, width, height);
    let pos = idx(x1, y1, width);
    let mut zeroes = u32::from(x1 == x0 || x1 == x2 || y1 == y0 || y1 == y2);
    let (mut min, mut max) = (0.0f64, 0.0f64);
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (0, 0, 0, 0);

    for x in x0..=x2 {
        for y in y0..=y2 {
            if x == x1 && y == y1 {
                continue;
            }
            let delta = color_delta(img, img, pos, idx(x, y, width), true);
            if delta == 0.0 {
                zeroes += 1;
                if zeroes > 2 {
                    return false;
                }
            } else if delta < min {
                min = delta;
                min_x = x;
                min_y = y;
            } else if delta > max {
                max = delta;
                max_x = x;
                max_y = y;
            }
        }
    }

    if min == 0.0 || max == 0.0 {
        return false;
    }

    (has_many_siblings(img, min_x, min_y, width, height)
        && has_many_siblings(other, min_x, min_y, width, height))
        || (has_many_siblings(img, max_x, max_y, width, height)
            && has_many_siblings(other, max_x, max_y, width, height))
}

/// Whether at least three neighbors share the exact color of (x, y).
fn has_many_siblings(img: &[u8], x1: u32, y1: u32, width: u32, height: u32) -> bool {
    let (x0, y0, x2, y2) = neighborhood(x1, y1, width, height);
    let pos = idx(x1, y1, width);
    let mut zeroes = u32::from(x1 == x0 || x1 == x2 || y1 == y0 || y1 == y2);

    for x in x0..=x2 {
        for y in y0..=y2 {
            if x == x1 && y == y1 {
                continue;
            }
            let other = idx(x, y, width);
            if img[pos..pos + 4] == img[other..other + 4] {
                zeroes += 1;
            }
            if zeroes > 2 {
                return true;
            }
        }
    }
    false
}

fn gray_pixel(pixel: &Rgba<u8>, alpha: f64) -> Rgba<u8> {
    let [r, g, b, a] = pixel.0;
    let luma = rgb2y(
        blend(r as f64, a as f64 / 255.0),
        blend(g as f64, a as f64 / 255.0),
        blend(b as f64, a as f64 / 255.0),
    );
    let value = blend(luma, alpha * a as f64 / 255.0).clamp(0.0, 255.0) as u8;
    Rgba([value, value, value, 255])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Side;

    fn solid(width: u32, height: u32, color: [u8; 4]) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(color)))
    }

    fn region(side: Side, image: Option<DynamicImage>) -> RegionImage {
        match image {
            Some(img) => RegionImage::present("001", side, img),
            None => RegionImage::absent("001", side),
        }
    }

    #[test]
    fn identical_images_are_a_perfect_match() {
        let img = solid(20, 10, [10, 120, 200, 255]);
        let cmp = compare_regions(
            &region(Side::Prod, Some(img.clone())),
            &region(Side::Migrated, Some(img)),
            &DiffOptions::default(),
        )
        .unwrap();
        assert_eq!(cmp.result.mismatch_percent, Some(0.0));
        assert!(cmp.result.matched);
        assert_eq!(cmp.result.tag, SeverityTag::PerfectMatch);
        assert!(cmp.overlay.is_none());
    }

    #[test]
    fn fully_different_images_are_critical() {
        let cmp = compare_regions(
            &region(Side::Prod, Some(solid(10, 10, [0, 0, 0, 255]))),
            &region(Side::Migrated, Some(solid(10, 10, [255, 255, 255, 255]))),
            &DiffOptions::default(),
        )
        .unwrap();
        assert_eq!(cmp.result.mismatch_percent, Some(100.0));
        assert!(!cmp.result.matched);
        assert_eq!(cmp.result.tag, SeverityTag::CriticalDiff);
        let overlay = cmp.overlay.expect("overlay for differing images");
        assert_eq!(*overlay.get_pixel(3, 3), DIFF_COLOR);
    }

    #[test]
    fn height_mismatch_pads_and_counts_extra_rows() {
        let cmp = compare_regions(
            &region(Side::Prod, Some(solid(10, 10, [0, 0, 0, 255]))),
            &region(Side::Migrated, Some(solid(10, 20, [0, 0, 0, 255]))),
            &DiffOptions::default(),
        )
        .unwrap();
        // Transparent padding blends to white, so the extra 10 rows differ.
        assert_eq!(cmp.result.mismatch_percent, Some(50.0));
        assert_eq!(cmp.result.height, 20);
        assert_eq!(cmp.result.tag, SeverityTag::CriticalDiff);
    }

    #[test]
    fn small_change_is_minor() {
        let base = RgbaImage::from_pixel(100, 100, Rgba([255, 255, 255, 255]));
        let mut changed = base.clone();
        for x in 40..45 {
            for y in 40..50 {
                changed.put_pixel(x, y, Rgba([0, 0, 0, 255]));
            }
        }
        let diff = pixel_diff(&base, &changed, &DiffOptions::default()).unwrap();
        assert_eq!(diff.differing, 50);
        assert_eq!(diff.mismatch_percent(), 0.5);
        assert_eq!(classify(Some(diff.mismatch_percent())), SeverityTag::MinorDiff);
    }

    #[test]
    fn extra_region_scores_full_mismatch_with_migrated_weight() {
        let cmp = compare_regions(
            &region(Side::Prod, None),
            &region(Side::Migrated, Some(solid(10, 30, [0, 0, 0, 255]))),
            &DiffOptions::default(),
        )
        .unwrap();
        assert_eq!(cmp.result.mismatch_percent, Some(100.0));
        assert_eq!(cmp.result.tag, SeverityTag::ExtraInMigrated);
        assert_eq!(cmp.result.height, 30);
        assert!(!cmp.result.matched);
    }

    #[test]
    fn missing_region_has_no_score() {
        let cmp = compare_regions(
            &region(Side::Prod, Some(solid(10, 30, [0, 0, 0, 255]))),
            &region(Side::Migrated, None),
            &DiffOptions::default(),
        )
        .unwrap();
        assert_eq!(cmp.result.mismatch_percent, None);
        assert_eq!(cmp.result.tag, SeverityTag::MissingInMigrated);
        assert!(!cmp.result.matched);
    }

    #[test]
    fn only_the_region_present_in_migrated_carries_weight() {
        let options = DiffOptions::default();
        let shared = solid(10, 200, [40, 40, 40, 255]);
        let same = compare_regions(
            &RegionImage::present("001", Side::Prod, shared.clone()),
            &RegionImage::present("001", Side::Migrated, shared),
            &options,
        )
        .unwrap()
        .result;
        let extra = compare_regions(
            &RegionImage::absent("002", Side::Prod),
            &RegionImage::present("002", Side::Migrated, solid(10, 200, [0, 0, 0, 255])),
            &options,
        )
        .unwrap()
        .result;
        let missing = compare_regions(
            &RegionImage::present("003", Side::Prod, solid(10, 200, [0, 0, 0, 255])),
            &RegionImage::absent("003", Side::Migrated),
            &options,
        )
        .unwrap()
        .result;

        assert_eq!((extra.mismatch_percent, extra.height), (Some(100.0), 200));
        assert_eq!(extra.tag, SeverityTag::ExtraInMigrated);
        assert_eq!(missing.mismatch_percent, None);
        assert_eq!(missing.tag, SeverityTag::MissingInMigrated);

        // (0 * 200 + 100 * 200) / 400; the prod-only region stays out of the denominator.
        let overall = crate::aggregate::weighted_mismatch(&[same, extra, missing]);
        assert_eq!(overall, Some(50.0));
    }

    #[test]
    fn both_absent_is_an_error() {
        let err = compare_regions(
            &region(Side::Prod, None),
            &region(Side::Migrated, None),
            &DiffOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, VrcError::Diff(_)));
    }

    #[test]
    fn non_finite_percentages_become_total_mismatch() {
        assert_eq!(sanitize_percent(f64::NAN), 100.0);
        assert_eq!(sanitize_percent(f64::INFINITY), 100.0);
        assert_eq!(sanitize_percent(12.5), 12.5);
        assert_eq!(round2(7.499), 7.5);
    }

    #[test]
    fn mismatched_sizes_are_rejected_by_pixel_diff() {
        let a = RgbaImage::new(2, 2);
        let b = RgbaImage::new(3, 2);
        assert!(pixel_diff(&a, &b, &DiffOptions::default()).is_err());
    }
}
