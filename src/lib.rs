//! Visual Regression Comparator (VRC) Library
//!
//! Compares a production website against its migrated counterpart page by
//! page. Each page is rendered on both environments, split into a header,
//! ordinal body blocks and a footer, and every region is diffed perceptually.
//! Region verdicts roll up into a height-weighted page score, and the run is
//! reported as JUnit suites plus an HTML page.
//!
//! # Module Overview
//!
//! - [`browser`] - Renderer traits and the Playwright helper implementation
//! - [`segment`] / [`capture`] - Region discovery and capture
//! - [`diff`] - Perceptual pixel comparison
//! - [`severity`] / [`aggregate`] - Tags, ignore rules and page scores
//! - [`pipeline`] / [`scheduler`] - Per-page flow and the worker pool
//! - [`store`] / [`report`] - Persisted results and JUnit/HTML output
//! - [`urls`] - URL lists, origins and preflight checks
//! - [`config`] - Configuration file support
//! - [`output`] - JSON output schemas
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use vrc_lib::{
//!     ArtifactLayout, Config, Environments, IgnoreList, PipelineContext, PlaywrightRenderer,
//!     Scheduler,
//! };
//!
//! # async fn example() -> vrc_lib::Result<()> {
//! let config = Config::default();
//! let env = Environments::from_env()?;
//! let pairs = env.pairs(&["/".to_string(), "/about".to_string()])?;
//!
//! let layout = ArtifactLayout::new(&config.output_dir);
//! let ctx = Arc::new(PipelineContext {
//!     layout: layout.clone(),
//!     prod_origin: env.prod_origin.clone(),
//!     migrated_origin: env.migrated_origin.clone(),
//!     ignore: IgnoreList::default(),
//!     capture: config.capture_options(),
//!     diff: config.diff_options(),
//!     navigation_retry: config.retry_policy(),
//! });
//! let renderer = Arc::new(PlaywrightRenderer::new(
//!     config.browser_options(env.migrated_headers.clone()),
//! ));
//!
//! let scheduler = Scheduler::new(renderer, ctx, config.scheduler_options(), CancellationToken::new());
//! let run = scheduler.run(pairs).await;
//! let summary = vrc_lib::report::write_reports(&layout, &run.outcomes, true)?;
//! println!("{} failing cases", summary.failing_cases);
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod browser;
pub mod capture;
pub mod config;
pub mod diff;
pub mod error;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod retry;
pub mod scheduler;
pub mod segment;
pub mod severity;
pub mod store;
pub mod types;
pub mod urls;
pub mod viewport;

pub use aggregate::{aggregate_page, IgnoreList, IgnoreRule};
pub use browser::{BrowserOptions, PageSession, PlaywrightRenderer, Renderer};
pub use config::Config;
pub use diff::{compare_regions, DiffOptions};
pub use error::{ErrorCategory, ErrorPayload, Result, VrcError};
pub use naming::{file_name_for, ArtifactLayout};
pub use output::{
    CheckUrlsOutput, DiffUrlsOutput, ErrorOutput, ReportOutput, RunOutput, VrcOutput,
    VRC_OUTPUT_VERSION,
};
pub use pipeline::{compare_pair, PipelineContext};
pub use report::{write_reports, Summary};
pub use retry::RetryPolicy;
pub use scheduler::{RunOutcomes, Scheduler, SchedulerOptions};
pub use severity::{classify, SeverityTag};
pub use store::ResultStore;
pub use types::{ComponentResult, PageOutcome, PageResult, Side, UrlPair};
pub use urls::Environments;
pub use viewport::Viewport;
