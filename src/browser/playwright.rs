//! Playwright integration for headless browser automation.
//!
//! This module contains the long-lived Playwright helper script, error
//! mapping, and availability checks for Node.js and Playwright.

use crate::{Result, VrcError};
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Helper process driving one browser with one context and two pages.
///
/// Configuration arrives as a JSON argument. Requests are JSON lines on stdin
/// (`{id, op, ...}`) and every request gets exactly one JSON line back on
/// stdout (`{id, status, ...}`). A `{id: 0, status: "ready"}` line is written
/// once the browser is up.
pub(crate) const HELPER_SCRIPT: &str = r#"
const readline = require('readline');
const config = JSON.parse(process.argv[1]);

const MEDIA_EXT = /\.(mp4|webm|ogg|ogv|mov|m4v|mp3|wav|m3u8)(\?|$)/i;
const FREEZE_CSS = `*, *::before, *::after {
  animation: none !important;
  transition: none !important;
  caret-color: transparent !important;
  scroll-behavior: auto !important;
}`;

let browser;
const pages = {};
const blocked = { prod: [], migrated: [] };

function send(obj) {
  process.stdout.write(JSON.stringify(obj) + '\n');
}

function messageOf(err) {
  return err && err.message ? err.message : String(err);
}

function kindOf(err) {
  return err && err.name === 'TimeoutError' ? 'timeout' : 'browser';
}

async function start() {
  const { chromium } = require('playwright');
  browser = await chromium.launch({ headless: config.headless });
  const context = await browser.newContext({
    viewport: { width: config.width, height: config.height }
  });
  for (const side of ['prod', 'migrated']) {
    const page = await context.newPage();
    if (side === 'migrated' && config.migratedHeaders && Object.keys(config.migratedHeaders).length) {
      await page.setExtraHTTPHeaders(config.migratedHeaders);
    }
    await page.route('**/*', (route) => {
      const request = route.request();
      if (request.resourceType() === 'media' || MEDIA_EXT.test(request.url())) {
        let name;
        try {
          name = new URL(request.url()).pathname.split('/').pop() || request.url();
        } catch (_) {
          name = request.url();
        }
        blocked[side].push(name);
        return route.abort();
      }
      return route.continue();
    });
    pages[side] = page;
  }
}

async function navigate({ side, url }) {
  const page = pages[side];
  blocked[side] = [];
  await page.goto(url, { waitUntil: 'networkidle', timeout: config.navigationTimeoutMs });
  await page.addStyleTag({ content: FREEZE_CSS });
  await page.evaluate(() => {
    for (const animation of document.getAnimations()) {
      try { animation.finish(); } catch (_) { animation.cancel(); }
    }
  });
  return { finalUrl: page.url(), blockedMedia: [...new Set(blocked[side])] };
}

async function outline({ side }) {
  const result = await pages[side].evaluate(({ headerSelector, footerSelector }) => {
    let counter = document.querySelectorAll('[data-vrc-node]').length;
    const mark = (el) => {
      if (!el.hasAttribute('data-vrc-node')) {
        el.setAttribute('data-vrc-node', String(counter++));
      }
      return `[data-vrc-node="${el.getAttribute('data-vrc-node')}"]`;
    };
    const header = document.querySelector(headerSelector);
    const footer = document.querySelector(footerSelector);
    const fixed = [];
    for (const el of document.body.querySelectorAll('*')) {
      if (getComputedStyle(el).position === 'fixed') {
        el.setAttribute('data-vrc-fixed', '');
        fixed.push(mark(el));
      }
    }
    const siblings = [];
    if (header) {
      for (let node = header.nextElementSibling; node; node = node.nextElementSibling) {
        const rect = node.getBoundingClientRect();
        siblings.push({
          selector: mark(node),
          tag: node.tagName.toLowerCase(),
          position: getComputedStyle(node).position,
          boundingBox: { x: rect.x, y: rect.y + window.scrollY, width: rect.width, height: rect.height },
          isFooter: footer !== null && node === footer,
          containsFooter: footer !== null && node !== footer && node.contains(footer)
        });
      }
    }
    return {
      header: header ? mark(header) : null,
      footer: footer ? mark(footer) : null,
      siblings,
      fixed
    };
  }, { headerSelector: config.headerSelector, footerSelector: config.footerSelector });
  return { outline: result };
}

async function setHidden({ side, selectors, hidden }) {
  await pages[side].evaluate(({ selectors, hidden }) => {
    for (const selector of selectors) {
      for (const el of document.querySelectorAll(selector)) {
        if (hidden) {
          if (!el.hasAttribute('data-vrc-visibility')) {
            el.setAttribute('data-vrc-visibility', el.style.visibility || '');
          }
          el.style.visibility = 'hidden';
        } else if (el.hasAttribute('data-vrc-visibility')) {
          el.style.visibility = el.getAttribute('data-vrc-visibility');
          el.removeAttribute('data-vrc-visibility');
        }
      }
    }
  }, { selectors, hidden });
  return {};
}

async function capture({ side, selector }) {
  const page = pages[side];
  const locator = page.locator(selector).first();
  if ((await locator.count()) === 0) {
    return { png: null };
  }
  const box = await locator.boundingBox();
  if (!box || box.width === 0 || box.height === 0) {
    return { png: null };
  }
  await locator.scrollIntoViewIfNeeded({ timeout: config.navigationTimeoutMs });
  await page.waitForTimeout(config.settleMs);
  await locator.evaluate((el, timeoutMs) => Promise.race([
    Promise.all([...el.querySelectorAll('img')].map((img) => img.complete ? null : new Promise((resolve) => {
      img.addEventListener('load', resolve, { once: true });
      img.addEventListener('error', resolve, { once: true });
    }))),
    new Promise((resolve) => setTimeout(resolve, timeoutMs))
  ]), config.imageTimeoutMs);
  const buffer = await locator.screenshot({ animations: 'disabled', timeout: config.navigationTimeoutMs });
  return { png: buffer.toString('base64') };
}

async function capturePage({ side }) {
  const page = pages[side];
  await page.waitForTimeout(config.settleMs);
  const buffer = await page.screenshot({ fullPage: true, animations: 'disabled', timeout: config.navigationTimeoutMs });
  return { png: buffer.toString('base64') };
}

const handlers = { navigate, outline, setHidden, capture, capturePage };

const ready = start().then(
  () => send({ id: 0, status: 'ready' }),
  (err) => {
    send({ id: 0, status: 'error', kind: 'launch', message: messageOf(err) });
    process.exit(1);
  }
);

async function shutdown() {
  if (browser) {
    const current = browser;
    browser = null;
    await current.close();
  }
}

async function handle(line) {
  let request;
  try {
    request = JSON.parse(line);
  } catch (_) {
    send({ id: null, status: 'error', kind: 'protocol', message: 'invalid request line' });
    return;
  }
  await ready;
  if (request.op === 'close') {
    await shutdown();
    send({ id: request.id, status: 'ok' });
    process.exit(0);
  }
  const handler = handlers[request.op];
  if (!handler) {
    send({ id: request.id, status: 'error', kind: 'protocol', message: `unknown op ${request.op}` });
    return;
  }
  try {
    const result = await handler(request);
    send({ id: request.id, status: 'ok', ...result });
  } catch (err) {
    send({ id: request.id, status: 'error', kind: kindOf(err), message: messageOf(err) });
  }
}

let chain = Promise.resolve();
const rl = readline.createInterface({ input: process.stdin });
rl.on('line', (line) => {
  chain = chain.then(() => handle(line));
});
rl.on('close', async () => {
  await chain;
  await shutdown();
  process.exit(0);
});
"#;

/// Timeout for checking node/playwright availability.
pub(crate) const NODE_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Script to check if Playwright is installed.
const PLAYWRIGHT_CHECK_SCRIPT: &str = "require('playwright'); process.stdout.write('ok');";

/// Error line written by a failing helper or check script.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct ScriptError {
    pub status: String,
    pub message: String,
}

/// Maps a spawn error to an appropriate VrcError.
pub(crate) fn map_spawn_error(err: io::Error, command: &str) -> VrcError {
    if err.kind() == io::ErrorKind::NotFound {
        VrcError::browser(format!(
            "Unable to spawn Playwright helper; '{}' was not found on PATH",
            command
        ))
    } else {
        VrcError::Io(err)
    }
}

/// Maps Playwright stderr output to an appropriate VrcError.
pub(crate) fn map_playwright_error(status_text: impl Into<String>, stderr: &str) -> VrcError {
    if let Ok(error) = serde_json::from_str::<ScriptError>(stderr) {
        return map_playwright_status_error(&error.status, error.message);
    }

    let lower = stderr.to_ascii_lowercase();

    if lower.contains("cannot find module 'playwright'") {
        return VrcError::browser(
            "Playwright npm package is missing; install with `npm install playwright`.",
        );
    }

    if lower.contains("timeout") {
        return VrcError::timeout(format!(
            "Playwright timed out: {}. Hint: increase --nav-timeout or --task-timeout.",
            stderr.trim()
        ));
    }

    VrcError::browser(format!(
        "Playwright exited with status {}: {}",
        status_text.into(),
        stderr.trim()
    ))
}

/// Maps a helper error response to an appropriate VrcError.
pub(crate) fn map_playwright_status_error(kind: &str, message: String) -> VrcError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("cannot find module 'playwright'") {
        VrcError::browser(
            "Playwright npm package is missing; install with `npm install playwright`.",
        )
    } else if kind == "timeout" || lower.contains("timeout") {
        VrcError::timeout(format!(
            "Playwright error ({}): {}. Hint: increase --nav-timeout or --task-timeout.",
            kind, message
        ))
    } else {
        VrcError::browser(format!("Playwright error ({}): {}", kind, message))
    }
}

/// Ensures Node.js is available on the system.
pub(crate) async fn ensure_node_available(node_command: &str) -> Result<()> {
    let mut cmd = Command::new(node_command);
    cmd.arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    let status = tokio::time::timeout(NODE_CHECK_TIMEOUT, cmd.status())
        .await
        .map_err(|_| {
            VrcError::browser(format!(
                "Timed out checking node availability after {:?}",
                NODE_CHECK_TIMEOUT
            ))
        })?
        .map_err(|err| map_spawn_error(err, node_command))?;

    if !status.success() {
        return Err(VrcError::browser(format!(
            "Node command {:?} is not available (exit {})",
            node_command, status
        )));
    }

    Ok(())
}

/// Ensures Playwright npm package is installed.
pub(crate) async fn ensure_playwright_available(node_command: &str) -> Result<()> {
    let mut cmd = Command::new(node_command);
    cmd.arg("-e")
        .arg(PLAYWRIGHT_CHECK_SCRIPT)
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    let output = tokio::time::timeout(NODE_CHECK_TIMEOUT, cmd.output())
        .await
        .map_err(|_| {
            VrcError::browser(format!(
                "Timed out checking Playwright availability after {:?}",
                NODE_CHECK_TIMEOUT
            ))
        })?
        .map_err(|err| map_spawn_error(err, node_command))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(map_playwright_error(
            format!("{:?}", output.status),
            &stderr,
        ));
    }

    Ok(())
}
