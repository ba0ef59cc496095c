use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use vrc_lib::capture::CaptureOptions;
use vrc_lib::types::{BoundingBox, Navigation, OutlineNode, PageOutline};
use vrc_lib::{
    write_reports, ArtifactLayout, DiffOptions, IgnoreList, IgnoreRule, PageOutcome, PageSession,
    PipelineContext, Renderer, Result, RetryPolicy, Scheduler, SchedulerOptions, SeverityTag, Side,
    UrlPair,
};

const PROD: &str = "https://www.example.com";
const MIGRATED: &str = "https://new.example.com";

#[derive(Default)]
struct Counters {
    sessions: AtomicUsize,
    navigations: AtomicUsize,
}

/// Serves the same header/body/footer layout for every page. `/changed`
/// renders a different body on the migrated side and `/moved` redirects
/// there to another path.
struct FakeSession {
    counters: Arc<Counters>,
    migrated_url: Mutex<String>,
}

fn png(color: [u8; 4]) -> Vec<u8> {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 4, Rgba(color)));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).expect("encode png");
    out.into_inner()
}

fn node(selector: &str, is_footer: bool) -> OutlineNode {
    OutlineNode {
        selector: selector.to_string(),
        tag: if is_footer { "footer" } else { "main" }.to_string(),
        position: "static".to_string(),
        bounding_box: BoundingBox {
            x: 0.0,
            y: 0.0,
            width: 8.0,
            height: 4.0,
        },
        is_footer,
        contains_footer: false,
    }
}

#[async_trait]
impl PageSession for FakeSession {
    async fn navigate(&self, side: Side, url: &str) -> Result<Navigation> {
        self.counters.navigations.fetch_add(1, Ordering::SeqCst);
        let final_url = if side == Side::Migrated && url.ends_with("/moved") {
            format!("{MIGRATED}/somewhere-else")
        } else {
            url.to_string()
        };
        if side == Side::Migrated {
            *self.migrated_url.lock().unwrap() = url.to_string();
        }
        Ok(Navigation {
            final_url,
            blocked_media: Vec::new(),
        })
    }

    async fn outline(&self, _side: Side) -> Result<PageOutline> {
        Ok(PageOutline {
            header: Some("#h".into()),
            footer: Some("#f".into()),
            siblings: vec![node("#main", false), node("#f", true)],
            fixed: Vec::new(),
        })
    }

    async fn set_hidden(&self, _side: Side, _selectors: &[String], _hidden: bool) -> Result<()> {
        Ok(())
    }

    async fn capture(&self, side: Side, selector: &str) -> Result<Option<Vec<u8>>> {
        let changed = side == Side::Migrated
            && selector == "#main"
            && self.migrated_url.lock().unwrap().ends_with("/changed");
        let color = if changed {
            [240, 240, 240, 255]
        } else {
            [20, 20, 20, 255]
        };
        Ok(Some(png(color)))
    }

    async fn capture_page(&self, side: Side) -> Result<Vec<u8>> {
        let changed = side == Side::Migrated && self.migrated_url.lock().unwrap().ends_with("/changed");
        let color = if changed {
            [240, 240, 240, 255]
        } else {
            [20, 20, 20, 255]
        };
        Ok(png(color))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

struct FakeRenderer {
    counters: Arc<Counters>,
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn open_session(&self) -> Result<Box<dyn PageSession>> {
        self.counters.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            counters: self.counters.clone(),
            migrated_url: Mutex::new(String::new()),
        }))
    }
}

fn pair(path: &str) -> UrlPair {
    UrlPair {
        relative_url: path.to_string(),
        prod_url: format!("{PROD}{path}"),
        migrated_url: format!("{MIGRATED}{path}"),
    }
}

fn context(dir: &TempDir, ignore: IgnoreList) -> Arc<PipelineContext> {
    Arc::new(PipelineContext {
        layout: ArtifactLayout::new(dir.path()),
        prod_origin: PROD.to_string(),
        migrated_origin: MIGRATED.to_string(),
        ignore,
        capture: CaptureOptions::default(),
        diff: DiffOptions::default(),
        navigation_retry: RetryPolicy::default(),
    })
}

async fn run(
    dir: &TempDir,
    ignore: IgnoreList,
    counters: &Arc<Counters>,
    paths: &[&str],
) -> vrc_lib::RunOutcomes {
    let renderer = Arc::new(FakeRenderer {
        counters: counters.clone(),
    });
    let options = SchedulerOptions {
        workers: 2,
        task_timeout: Duration::from_secs(30),
        respawn_budget: 1,
    };
    let scheduler = Scheduler::new(renderer, context(dir, ignore), options, CancellationToken::new());
    scheduler
        .run(paths.iter().map(|p| pair(p)).collect())
        .await
}

fn compared<'a>(outcomes: &'a [PageOutcome], url: &str) -> &'a vrc_lib::PageResult {
    match outcomes.iter().find(|o| o.url() == url) {
        Some(PageOutcome::Compared(page)) => page,
        other => panic!("expected compared outcome for {url}, got {other:?}"),
    }
}

#[tokio::test]
async fn identical_pages_are_perfect_matches_with_no_failing_cases() {
    let dir = TempDir::new().expect("tempdir");
    let counters = Arc::new(Counters::default());
    let run = run(&dir, IgnoreList::default(), &counters, &["/", "/about"]).await;

    assert_eq!(run.outcomes.len(), 2);
    for url in ["/", "/about"] {
        let page = compared(&run.outcomes, url);
        assert_eq!(page.overall_tag, SeverityTag::PerfectMatch);
        assert_eq!(page.overall_mismatch, Some(0.0));
        let names: Vec<&str> = page.components.iter().map(|c| c.component.as_str()).collect();
        assert_eq!(names, vec!["header", "001", "footer"]);
        let full_page = page.full_page.as_ref().expect("full-page comparison");
        assert_eq!(full_page.component, "page");
        assert_eq!(full_page.mismatch_percent, Some(0.0));
    }

    let layout = ArtifactLayout::new(dir.path());
    assert!(layout.screenshot(Side::Prod, "index", "page").exists());
    assert!(layout.screenshot(Side::Migrated, "index", "page").exists());

    let summary = write_reports(&layout, &run.outcomes, true).expect("write reports");
    assert_eq!(summary.failing_cases, 0);
    assert!(summary.passed());
    assert!(layout.junit("body").exists());
    assert!(layout.html_report().exists());
    assert!(layout.summary().exists());
}

#[tokio::test]
async fn diverging_redirect_skips_capture() {
    let dir = TempDir::new().expect("tempdir");
    let counters = Arc::new(Counters::default());
    let run = run(&dir, IgnoreList::default(), &counters, &["/moved"]).await;

    match &run.outcomes[0] {
        PageOutcome::RedirectMismatch(redirect) => {
            assert_eq!(redirect.page.overall_tag, SeverityTag::RedirectUrlMismatch);
            assert!(redirect.page.components.is_empty());
            assert_eq!(redirect.migrated_final_url, format!("{MIGRATED}/somewhere-else"));
        }
        other => panic!("expected redirect mismatch, got {other:?}"),
    }

    let summary = write_reports(&ArtifactLayout::new(dir.path()), &run.outcomes, false)
        .expect("write reports");
    assert_eq!(summary.redirect_mismatches, 1);
    assert_eq!(summary.failing_cases, 1);
}

#[tokio::test]
async fn rerun_resumes_without_rendering() {
    let dir = TempDir::new().expect("tempdir");
    let counters = Arc::new(Counters::default());
    let paths = ["/", "/a", "/b"];
    let first = run(&dir, IgnoreList::default(), &counters, &paths).await;
    assert_eq!(first.dispatched, 3);
    let navigations = counters.navigations.load(Ordering::SeqCst);
    assert_eq!(navigations, 6);

    let second = run(&dir, IgnoreList::default(), &counters, &paths).await;
    assert_eq!(second.resumed, 3);
    assert_eq!(second.dispatched, 0);
    assert_eq!(counters.navigations.load(Ordering::SeqCst), navigations);
    assert_eq!(second.outcomes, first.outcomes);
}

#[tokio::test]
async fn changed_body_fails_unless_ignored() {
    let dir = TempDir::new().expect("tempdir");
    let counters = Arc::new(Counters::default());
    let run_plain = run(&dir, IgnoreList::default(), &counters, &["/changed"]).await;
    let body = compared(&run_plain.outcomes, "/changed")
        .component("001")
        .expect("body region")
        .clone();
    assert_eq!(body.tag, SeverityTag::CriticalDiff);
    assert_eq!(body.mismatch_percent, Some(100.0));
    assert!(body.diff_image.is_some());
    let full_page = compared(&run_plain.outcomes, "/changed")
        .full_page
        .clone()
        .expect("full-page comparison");
    assert_eq!(full_page.mismatch_percent, Some(100.0));
    assert!(full_page.diff_image.is_some());

    let summary = write_reports(&ArtifactLayout::new(dir.path()), &run_plain.outcomes, false)
        .expect("write reports");
    assert_eq!(summary.failing_cases, 1);

    let ignored_dir = TempDir::new().expect("tempdir");
    let ignore = IgnoreList::new(vec![IgnoreRule {
        url: "/changed".into(),
        component: "001".into(),
        percents: 100.0,
    }]);
    let run_ignored = run(&ignored_dir, ignore, &counters, &["/changed"]).await;
    let body = compared(&run_ignored.outcomes, "/changed")
        .component("001")
        .expect("body region")
        .clone();
    assert_eq!(body.tag, SeverityTag::IgnoredDiff);

    let summary = write_reports(
        &ArtifactLayout::new(ignored_dir.path()),
        &run_ignored.outcomes,
        false,
    )
    .expect("write reports");
    assert_eq!(summary.failing_cases, 0);
    let ignored = summary
        .suites
        .iter()
        .find(|s| s.name == "ignored")
        .expect("ignored suite");
    assert_eq!(ignored.tests, 1);
}
