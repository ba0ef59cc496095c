//! Browser automation for rendering both environments of a page.
//!
//! The pipeline only talks to the [`Renderer`] and [`PageSession`] traits;
//! the shipped implementation drives Playwright through a Node.js helper.
//!
//! # Module Structure
//!
//! - [`manager`] - Playwright renderer and helper sessions
//! - [`playwright`] - Helper script, error mapping and availability checks
//! - [`dom`] - Page outline conversion from helper output
//!
//! # Example
//!
//! ```no_run
//! use vrc_lib::browser::{BrowserOptions, PlaywrightRenderer, Renderer};
//! use vrc_lib::types::Side;
//!
//! # async fn example() -> vrc_lib::Result<()> {
//! let renderer = PlaywrightRenderer::new(BrowserOptions::default());
//! let session = renderer.open_session().await?;
//! let nav = session.navigate(Side::Prod, "https://example.com").await?;
//! println!("landed on {}", nav.final_url);
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

mod dom;
mod manager;
mod playwright;

use async_trait::async_trait;

use crate::types::{Navigation, PageOutline, Side};
use crate::Result;

pub use manager::{
    BrowserOptions, PlaywrightRenderer, PlaywrightSession, DEFAULT_IMAGE_TIMEOUT,
    DEFAULT_LAUNCH_TIMEOUT, DEFAULT_NAVIGATION_TIMEOUT, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_SETTLE_DELAY,
};

/// A live browser holding one page per side.
///
/// Methods take `&self` so a session can be shared with retry closures;
/// implementations serialize access internally.
#[async_trait]
pub trait PageSession: Send + Sync {
    /// Loads `url` on the given side, freezing animations and blocking media.
    async fn navigate(&self, side: Side, url: &str) -> Result<Navigation>;

    /// Describes header, footer, body siblings and fixed elements.
    async fn outline(&self, side: Side) -> Result<PageOutline>;

    async fn set_hidden(&self, side: Side, selectors: &[String], hidden: bool) -> Result<()>;

    /// PNG bytes of the element, or `None` when it has zero area.
    async fn capture(&self, side: Side, selector: &str) -> Result<Option<Vec<u8>>>;

    /// PNG bytes of the whole scrollable page.
    async fn capture_page(&self, side: Side) -> Result<Vec<u8>>;

    async fn close(&self) -> Result<()>;
}

/// Opens browser sessions; one per worker.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn open_session(&self) -> Result<Box<dyn PageSession>>;
}
