//! Comparison of one URL pair on a live session.
//!
//! Navigate both sides, short-circuit on diverging redirects, capture the
//! full page and every segmented region, then diff region by region and
//! aggregate. The full-page diff is kept beside the regions, outside the
//! height-weighted score.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use image::ImageFormat;
use tracing::{debug, info};

use crate::aggregate::{aggregate_page, redirect_diverges, redirect_outcome, region_union, IgnoreList};
use crate::browser::PageSession;
use crate::capture::{capture_full_page, capture_region, persist_region, CaptureOptions};
use crate::diff::{compare_regions, DiffOptions};
use crate::error::{Result, VrcError};
use crate::naming::{file_name_for, ArtifactLayout};
use crate::retry::RetryPolicy;
use crate::segment::segment;
use crate::severity::SeverityTag;
use crate::types::{
    ComponentResult, MediaComparison, Navigation, PageOutcome, RegionDescriptor, RegionImage,
    RegionKind, Side, UrlPair,
};

/// Run-wide settings shared by every comparison.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub layout: ArtifactLayout,
    pub prod_origin: String,
    pub migrated_origin: String,
    pub ignore: IgnoreList,
    pub capture: CaptureOptions,
    pub diff: DiffOptions,
    pub navigation_retry: RetryPolicy,
}

impl PipelineContext {
    pub fn file_name(&self, pair: &UrlPair) -> String {
        file_name_for(&pair.prod_url, &self.prod_origin, &self.migrated_origin)
    }
}

struct CapturedRegion {
    image: RegionImage,
    path: Option<PathBuf>,
}

async fn navigate(
    session: &dyn PageSession,
    policy: &RetryPolicy,
    side: Side,
    url: &str,
) -> Result<Navigation> {
    let label = format!("navigate {side} {url}");
    policy.run(&label, || session.navigate(side, url)).await
}

struct CapturedSide {
    full_page: CapturedRegion,
    regions: Vec<RegionDescriptor>,
    captures: HashMap<String, CapturedRegion>,
}

async fn capture_side(
    session: &dyn PageSession,
    ctx: &PipelineContext,
    side: Side,
    file: &str,
) -> Result<CapturedSide> {
    // Whole page first, before any element is hidden.
    let image = capture_full_page(session, side, &ctx.capture).await?;
    let path = persist_region(&ctx.layout, file, &image)?;
    let full_page = CapturedRegion { image, path };

    let outline = session.outline(side).await?;
    let regions = segment(&outline);
    debug!(%side, regions = regions.len(), "segmented page");

    let mut captures = HashMap::with_capacity(regions.len());
    for region in &regions {
        let image = capture_region(session, side, &outline, region, &ctx.capture).await?;
        let path = persist_region(&ctx.layout, file, &image)?;
        captures.insert(region.name.clone(), CapturedRegion { image, path });
    }
    Ok(CapturedSide {
        full_page,
        regions,
        captures,
    })
}

/// Compares one pair end to end on an open session.
pub async fn compare_pair(
    session: &dyn PageSession,
    pair: &UrlPair,
    ctx: &PipelineContext,
) -> Result<PageOutcome> {
    let file = ctx.file_name(pair);
    info!(url = %pair.relative_url, file = %file, "comparing page");

    let prod_nav = navigate(session, &ctx.navigation_retry, Side::Prod, &pair.prod_url).await?;
    let migrated_nav =
        navigate(session, &ctx.navigation_retry, Side::Migrated, &pair.migrated_url).await?;

    if redirect_diverges(&prod_nav.final_url, &migrated_nav.final_url) {
        return Ok(redirect_outcome(
            pair,
            &prod_nav.final_url,
            &migrated_nav.final_url,
        ));
    }

    let media = MediaComparison::compare(prod_nav.blocked_media, migrated_nav.blocked_media);

    let mut prod = capture_side(session, ctx, Side::Prod, &file).await?;
    let mut migrated = capture_side(session, ctx, Side::Migrated, &file).await?;

    let mut jobs = Vec::new();
    for name in region_union(&prod.regions, &migrated.regions) {
        let prod_region = prod.captures.remove(&name).unwrap_or_else(|| CapturedRegion {
            image: RegionImage::absent(&name, Side::Prod),
            path: None,
        });
        let migrated_region = migrated
            .captures
            .remove(&name)
            .unwrap_or_else(|| CapturedRegion {
                image: RegionImage::absent(&name, Side::Migrated),
                path: None,
            });
        jobs.push((name, prod_region, migrated_region));
    }

    let layout = ctx.layout.clone();
    let options = ctx.diff;
    let diff_file = file.clone();
    let (prod_page, migrated_page) = (prod.full_page, migrated.full_page);
    let (components, full_page) = tokio::task::spawn_blocking(move || {
        let components = jobs
            .into_iter()
            .map(|(name, prod, migrated)| {
                diff_component(&layout, &diff_file, &options, name, prod, migrated)
            })
            .collect::<Result<Vec<_>>>()?;
        let full_page = diff_component(
            &layout,
            &diff_file,
            &options,
            RegionKind::FULL_PAGE_NAME.to_string(),
            prod_page,
            migrated_page,
        )?;
        Ok::<_, VrcError>((components, full_page))
    })
    .await
    .map_err(|e| VrcError::Unknown(format!("diff task failed: {e}")))??;

    let mut page = aggregate_page(pair, components, &ctx.ignore, Some(media));
    page.full_page = Some(full_page);
    info!(
        url = %page.url,
        mismatch = ?page.overall_mismatch,
        tag = %page.overall_tag,
        "page compared"
    );
    Ok(PageOutcome::Compared(page))
}

fn diff_component(
    layout: &ArtifactLayout,
    file: &str,
    options: &DiffOptions,
    name: String,
    prod: CapturedRegion,
    migrated: CapturedRegion,
) -> Result<ComponentResult> {
    let prod_image = prod.path.as_deref().map(|p| layout.relative(p));
    let migrated_image = migrated.path.as_deref().map(|p| layout.relative(p));

    if prod.image.image.is_none() && migrated.image.image.is_none() {
        return Ok(ComponentResult {
            component: name,
            mismatch_percent: None,
            matched: false,
            tag: SeverityTag::NotCompared,
            diff_image: None,
            prod_image,
            migrated_image,
            log: Some("region skipped on both sides".to_string()),
            height: 0,
        });
    }

    let comparison = compare_regions(&prod.image, &migrated.image, options)?;
    let mut result = comparison.result;
    result.prod_image = prod_image;
    result.migrated_image = migrated_image;

    if let Some(overlay) = comparison.overlay {
        let path = layout.diff(file, &name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                VrcError::Config(format!("Failed to create diff dir {}: {}", parent.display(), e))
            })?;
        }
        overlay.save_with_format(&path, ImageFormat::Png)?;
        result.diff_image = Some(layout.relative(&path));
    }
    Ok(result)
}
