//! Playwright-backed renderer.
//!
//! Each [`PlaywrightSession`] owns one Node.js helper process (one browser,
//! one context, one page per side) and talks to it over JSON lines. Sessions
//! are reused across tasks by a worker and torn down when the worker exits
//! or the session is replaced after a timeout.

use async_trait::async_trait;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex, OnceCell};
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use super::dom::{convert_raw_outline, RawOutline};
use super::playwright::{
    ensure_node_available, ensure_playwright_available, map_playwright_status_error,
    map_spawn_error, HELPER_SCRIPT,
};
use super::{PageSession, Renderer};
use crate::types::{Navigation, PageOutline, Side};
use crate::{Result, VrcError, Viewport};

/// Default timeout for page navigation.
pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for a single helper request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Default timeout for launching the helper and its browser.
pub const DEFAULT_LAUNCH_TIMEOUT: Duration = Duration::from_secs(45);

/// Default delay between scrolling a region into view and capturing it.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Default wait for images inside a region to load.
pub const DEFAULT_IMAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration options for browser sessions.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// The Node.js command to use (default: "node").
    pub node_command: String,
    /// Viewport dimensions for both pages.
    pub viewport: Viewport,
    /// Whether to run in headless mode.
    pub headless: bool,
    /// Timeout for page navigation.
    pub navigation_timeout: Duration,
    /// Timeout for a single helper request.
    pub request_timeout: Duration,
    /// Timeout for launching the helper.
    pub launch_timeout: Duration,
    pub settle_delay: Duration,
    pub image_timeout: Duration,
    /// Selector locating the page header.
    pub header_selector: String,
    /// Selector locating the page footer.
    pub footer_selector: String,
    /// Extra HTTP headers sent by the migrated page only.
    pub migrated_headers: BTreeMap<String, String>,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            node_command: "node".to_string(),
            viewport: Viewport::default(),
            headless: true,
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            launch_timeout: DEFAULT_LAUNCH_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
            image_timeout: DEFAULT_IMAGE_TIMEOUT,
            header_selector: "header".to_string(),
            footer_selector: "footer".to_string(),
            migrated_headers: BTreeMap::new(),
        }
    }
}

impl BrowserOptions {
    fn helper_config(&self) -> Value {
        json!({
            "width": self.viewport.width,
            "height": self.viewport.height,
            "headless": self.headless,
            "navigationTimeoutMs": self.navigation_timeout.as_millis() as u64,
            "settleMs": self.settle_delay.as_millis() as u64,
            "imageTimeoutMs": self.image_timeout.as_millis() as u64,
            "headerSelector": self.header_selector,
            "footerSelector": self.footer_selector,
            "migratedHeaders": self.migrated_headers,
        })
    }
}

/// Opens Playwright helper sessions.
#[derive(Debug)]
pub struct PlaywrightRenderer {
    options: BrowserOptions,
    checked: OnceCell<()>,
}

impl PlaywrightRenderer {
    pub fn new(options: BrowserOptions) -> Self {
        Self {
            options,
            checked: OnceCell::new(),
        }
    }

    pub fn options(&self) -> &BrowserOptions {
        &self.options
    }

    /// Fails fast when Node or Playwright is missing, once per renderer.
    pub async fn ensure_available(&self) -> Result<()> {
        let node = &self.options.node_command;
        self.checked
            .get_or_try_init(|| async move {
                ensure_node_available(node).await?;
                ensure_playwright_available(node).await
            })
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl Renderer for PlaywrightRenderer {
    async fn open_session(&self) -> Result<Box<dyn PageSession>> {
        self.ensure_available().await?;
        let session = PlaywrightSession::launch(&self.options).await?;
        Ok(Box::new(session))
    }
}

struct HelperIo {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
}

/// Reply line from the helper; op-specific fields are kept in `payload`.
#[derive(Debug, serde::Deserialize)]
struct HelperResponse {
    id: Option<u64>,
    status: String,
    kind: Option<String>,
    message: Option<String>,
    #[serde(flatten)]
    payload: Map<String, Value>,
}

impl HelperResponse {
    fn into_result(self) -> Result<Map<String, Value>> {
        if self.status == "ok" || self.status == "ready" {
            return Ok(self.payload);
        }
        let kind = self.kind.unwrap_or_else(|| self.status.clone());
        let message = self
            .message
            .unwrap_or_else(|| "no additional details".to_string());
        Err(map_playwright_status_error(&kind, message))
    }
}

/// One live helper process.
pub struct PlaywrightSession {
    io: Mutex<HelperIo>,
    request_timeout: Duration,
}

impl PlaywrightSession {
    async fn launch(options: &BrowserOptions) -> Result<Self> {
        let mut cmd = Command::new(&options.node_command);
        cmd.arg("-e")
            .arg(HELPER_SCRIPT)
            .arg(options.helper_config().to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|err| map_spawn_error(err, &options.node_command))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| VrcError::browser("helper stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| VrcError::browser("helper stdout unavailable"))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "vrc::helper", "{}", line);
                }
            });
        }

        let mut io = HelperIo {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 1,
        };

        match timeout(options.launch_timeout, read_response(&mut io.stdout, 0)).await {
            Ok(Ok(response)) => {
                response.into_result()?;
            }
            Ok(Err(err)) => return Err(err),
            Err(_) => {
                let _ = io.child.kill().await;
                return Err(VrcError::timeout(format!(
                    "Playwright helper did not start within {:?}",
                    options.launch_timeout
                )));
            }
        }
        debug!("playwright helper ready");

        Ok(Self {
            io: Mutex::new(io),
            request_timeout: options.request_timeout,
        })
    }

    async fn request<R: DeserializeOwned>(&self, op: &str, args: impl Serialize) -> Result<R> {
        let mut io = self.io.lock().await;
        let id = io.next_id;
        io.next_id += 1;

        let mut message = match serde_json::to_value(args)? {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(VrcError::browser(format!(
                    "helper arguments must be an object, got {other}"
                )))
            }
        };
        message.insert("id".to_string(), json!(id));
        message.insert("op".to_string(), json!(op));
        let line = serde_json::to_string(&message)?;
        trace!(op, id, "helper request");

        let response = timeout(self.request_timeout, exchange(&mut io, &line, id))
            .await
            .map_err(|_| {
                VrcError::timeout(format!(
                    "helper op '{op}' exceeded {:?}",
                    self.request_timeout
                ))
            })??;

        let payload = response.into_result()?;
        serde_json::from_value(Value::Object(payload)).map_err(VrcError::from)
    }
}

async fn exchange(io: &mut HelperIo, line: &str, id: u64) -> Result<HelperResponse> {
    io.stdin.write_all(line.as_bytes()).await?;
    io.stdin.write_all(b"\n").await?;
    io.stdin.flush().await?;
    read_response(&mut io.stdout, id).await
}

async fn read_response(
    stdout: &mut Lines<BufReader<ChildStdout>>,
    id: u64,
) -> Result<HelperResponse> {
    loop {
        let line = stdout
            .next_line()
            .await?
            .ok_or_else(|| VrcError::browser("Playwright helper exited unexpectedly"))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let response: HelperResponse = match serde_json::from_str(trimmed) {
            Ok(response) => response,
            Err(_) => {
                // Stray console output from page scripts; not part of the protocol.
                trace!(line = trimmed, "ignoring non-protocol helper output");
                continue;
            }
        };
        match response.id {
            Some(got) if got == id => return Ok(response),
            Some(got) => warn!(expected = id, got, "discarding stale helper response"),
            None => return Ok(response),
        }
    }
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct NavigateReply {
    final_url: String,
    #[serde(default)]
    blocked_media: Vec<String>,
}

#[derive(serde::Deserialize)]
struct OutlineReply {
    outline: RawOutline,
}

#[derive(serde::Deserialize)]
struct CaptureReply {
    png: Option<String>,
}

#[derive(serde::Deserialize)]
struct Empty {}

fn decode_png(encoded: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| VrcError::browser(format!("invalid screenshot payload: {e}")))
}

#[async_trait]
impl PageSession for PlaywrightSession {
    async fn navigate(&self, side: Side, url: &str) -> Result<Navigation> {
        let reply: NavigateReply = self
            .request("navigate", json!({ "side": side, "url": url }))
            .await?;
        Ok(Navigation {
            final_url: reply.final_url,
            blocked_media: reply.blocked_media,
        })
    }

    async fn outline(&self, side: Side) -> Result<PageOutline> {
        let reply: OutlineReply = self.request("outline", json!({ "side": side })).await?;
        Ok(convert_raw_outline(reply.outline))
    }

    async fn set_hidden(&self, side: Side, selectors: &[String], hidden: bool) -> Result<()> {
        if selectors.is_empty() {
            return Ok(());
        }
        let _: Empty = self
            .request(
                "setHidden",
                json!({ "side": side, "selectors": selectors, "hidden": hidden }),
            )
            .await?;
        Ok(())
    }

    async fn capture(&self, side: Side, selector: &str) -> Result<Option<Vec<u8>>> {
        let reply: CaptureReply = self
            .request("capture", json!({ "side": side, "selector": selector }))
            .await?;
        reply.png.as_deref().map(decode_png).transpose()
    }

    async fn capture_page(&self, side: Side) -> Result<Vec<u8>> {
        let reply: CaptureReply = self.request("capturePage", json!({ "side": side })).await?;
        let encoded = reply
            .png
            .ok_or_else(|| VrcError::browser("full-page screenshot returned no image"))?;
        decode_png(&encoded)
    }

    async fn close(&self) -> Result<()> {
        let result: Result<Empty> = self.request("close", json!({})).await;
        let mut io = self.io.lock().await;
        if let Err(err) = result {
            debug!(error = %err, "helper did not close cleanly; killing");
            let _ = io.child.kill().await;
        }
        let _ = io.child.wait().await;
        Ok(())
    }
}
