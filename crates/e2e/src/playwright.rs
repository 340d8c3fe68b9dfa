//! Playwright browser automation
//!
//! A generated node script keeps one browser page open and answers
//! newline-delimited JSON commands on stdin/stdout.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{E2eError, E2eResult};
use crate::page::{Element, Page};
use crate::spec::{Locator, Viewport};

/// Extra wait on top of a command's own timeout before the bridge counts as hung
const BRIDGE_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl fmt::Display for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(E2eError::Configuration(format!(
                "unknown browser '{}': use chromium, firefox or webkit",
                other
            ))),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,
    pub viewport: Viewport,
    pub launch_timeout: Duration,
    /// Directory whose `node_modules` holds the `playwright` package
    pub node_project_dir: Option<PathBuf>,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            viewport: Viewport::default(),
            launch_timeout: Duration::from_secs(30),
            node_project_dir: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Command<'a> {
    Goto { url: &'a str, timeout_ms: u64 },
    Viewport { width: u32, height: u32 },
    Query { locator: &'a Locator, properties: &'a [String] },
    Click { locator: &'a Locator, timeout_ms: u64 },
    Title,
    Close,
}

#[derive(Debug, Serialize)]
struct Request<'a> {
    id: u64,
    #[serde(flatten)]
    command: Command<'a>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ErrorKind {
    Timeout,
    Selector,
    Other,
}

#[derive(Debug, Deserialize)]
struct Response {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    kind: Option<ErrorKind>,
    #[serde(default)]
    error: Option<String>,
}

impl Response {
    /// Turn a bridge failure into the matching error
    fn into_result(self, what: &str, wait: Duration) -> E2eResult<Self> {
        if self.ok {
            return Ok(self);
        }
        let message = self.error.unwrap_or_else(|| "unknown bridge error".to_string());
        Err(match self.kind {
            Some(ErrorKind::Timeout) => E2eError::timeout(what, wait),
            Some(ErrorKind::Selector) => E2eError::InvalidSelector {
                selector: what.to_string(),
                reason: message,
            },
            _ => E2eError::Playwright(message),
        })
    }
}

/// Browser page driven through a long-lived node process
pub struct PlaywrightPage {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    url: Option<Url>,
    next_id: u64,
    _script_dir: TempDir,
}

impl PlaywrightPage {
    /// Start the bridge and wait until the browser page is open
    pub async fn launch(config: PlaywrightConfig) -> E2eResult<Self> {
        check_playwright_installed().await?;

        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("folio-bridge.js");
        std::fs::write(&script_path, build_bridge_script(&config))?;

        let project_dir = match &config.node_project_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };

        info!(
            "Launching {} ({}) via Playwright",
            config.browser,
            if config.headless { "headless" } else { "headed" }
        );

        let mut child = TokioCommand::new("node")
            .arg(&script_path)
            .current_dir(&project_dir)
            .env("NODE_PATH", project_dir.join("node_modules"))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| E2eError::Playwright(format!("failed to spawn node: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Playwright("bridge stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Playwright("bridge stdout unavailable".into()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!("[playwright] {}", line);
                }
            });
        }

        let mut page = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            url: None,
            next_id: 0,
            _script_dir: script_dir,
        };

        page.read_response(0, config.launch_timeout)
            .await?
            .into_result("browser launch", config.launch_timeout)?;

        Ok(page)
    }

    async fn call(&mut self, command: Command<'_>, what: &str, wait: Duration) -> E2eResult<Response> {
        self.next_id += 1;
        let id = self.next_id;

        let mut line = serde_json::to_string(&Request { id, command })?;
        debug!("-> {}", line);
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;

        self.read_response(id, wait + BRIDGE_GRACE)
            .await?
            .into_result(what, wait)
    }

    /// Next response carrying `id`; answers to abandoned commands are skipped
    async fn read_response(&mut self, id: u64, wait: Duration) -> E2eResult<Response> {
        let deadline = tokio::time::Instant::now() + wait;

        loop {
            let line = tokio::time::timeout_at(deadline, self.stdout.next_line())
                .await
                .map_err(|_| {
                    E2eError::Playwright(format!("bridge did not answer within {} ms", wait.as_millis()))
                })??
                .ok_or_else(|| E2eError::Playwright("bridge exited".into()))?;

            match serde_json::from_str::<Response>(&line) {
                Ok(resp) if resp.id == id => return Ok(resp),
                Ok(resp) => debug!("Skipping stale bridge response {}", resp.id),
                Err(_) => debug!("[bridge] {}", line),
            }
        }
    }

    fn update_url(&mut self, resp: &Response) {
        if let Some(url) = resp.url.as_deref().and_then(|u| Url::parse(u).ok()) {
            self.url = Some(url);
        }
    }

    /// SIGTERM first, then kill
    fn terminate(&mut self) {
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = self.child.id() {
                let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
            }
        }

        let _ = self.child.start_kill();
    }
}

#[async_trait]
impl Page for PlaywrightPage {
    async fn goto(&mut self, url: &Url, timeout: Duration) -> E2eResult<()> {
        let what = format!("navigation to {}", url);
        let resp = self
            .call(
                Command::Goto {
                    url: url.as_str(),
                    timeout_ms: timeout.as_millis() as u64,
                },
                &what,
                timeout,
            )
            .await?;
        self.update_url(&resp);
        Ok(())
    }

    async fn set_viewport(&mut self, viewport: Viewport) -> E2eResult<()> {
        self.call(
            Command::Viewport {
                width: viewport.width,
                height: viewport.height,
            },
            "viewport",
            BRIDGE_GRACE,
        )
        .await?;
        Ok(())
    }

    async fn query(&mut self, locator: &Locator, properties: &[String]) -> E2eResult<Vec<Element>> {
        let what = locator.to_string();
        let resp = self
            .call(Command::Query { locator, properties }, &what, BRIDGE_GRACE)
            .await?;
        Ok(serde_json::from_value(resp.value)?)
    }

    async fn click(&mut self, locator: &Locator, timeout: Duration) -> E2eResult<()> {
        let what = format!("clickable {}", locator);
        let resp = self
            .call(
                Command::Click {
                    locator,
                    timeout_ms: timeout.as_millis() as u64,
                },
                &what,
                timeout,
            )
            .await?;
        self.update_url(&resp);
        Ok(())
    }

    async fn title(&mut self) -> E2eResult<String> {
        let resp = self.call(Command::Title, "title", BRIDGE_GRACE).await?;
        Ok(resp.value.as_str().unwrap_or_default().to_string())
    }

    fn current_url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    async fn close(&mut self) -> E2eResult<()> {
        info!("Closing browser");
        if let Err(e) = self.call(Command::Close, "close", BRIDGE_GRACE).await {
            warn!("Bridge close failed: {}", e);
            self.terminate();
        }
        let _ = tokio::time::timeout(BRIDGE_GRACE, self.child.wait()).await;
        Ok(())
    }
}

impl Drop for PlaywrightPage {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            self.terminate();
        }
    }
}

/// Check that node can run the Playwright CLI
async fn check_playwright_installed() -> E2eResult<()> {
    let status = TokioCommand::new("npx")
        .args(["playwright", "--version"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match status {
        Ok(status) if status.success() => Ok(()),
        _ => Err(E2eError::PlaywrightNotFound),
    }
}

/// Render the node bridge for `config`
pub fn build_bridge_script(config: &PlaywrightConfig) -> String {
    BRIDGE_TEMPLATE
        .replace("__BROWSER__", config.browser.as_str())
        .replace("__HEADLESS__", if config.headless { "true" } else { "false" })
        .replace("__WIDTH__", &config.viewport.width.to_string())
        .replace("__HEIGHT__", &config.viewport.height.to_string())
}

const BRIDGE_TEMPLATE: &str = r##"
const readline = require('readline');
const playwright = require('playwright');

// Runs inside every document the page loads
function installResolver() {
  const norm = (s) => (s || '').replace(/\s+/g, ' ').trim();

  const resolve = (loc) => {
    const scopes = loc.within ? resolve(loc.within) : [document];
    const seen = new Set();
    let found = [];
    for (const scope of scopes) {
      for (const el of scope.querySelectorAll(loc.css || '*')) {
        if (!seen.has(el)) {
          seen.add(el);
          found.push(el);
        }
      }
    }
    if (loc.text != null) {
      const needle = norm(loc.text);
      found = found.filter((el) => norm(el.textContent).includes(needle));
      if (!loc.css) {
        found = found.filter((el) => !found.some((other) => other !== el && el.contains(other)));
      }
    }
    return loc.first ? found.slice(0, 1) : found;
  };

  const visible = (el) => {
    const style = window.getComputedStyle(el);
    if (style.visibility === 'hidden' || style.visibility === 'collapse') return false;
    const rect = el.getBoundingClientRect();
    return rect.width > 0 && rect.height > 0;
  };

  const snapshot = (loc, properties) =>
    resolve(loc).map((el) => {
      const style = window.getComputedStyle(el);
      const attributes = {};
      for (const attr of el.attributes) attributes[attr.name] = attr.value;
      const styles = {};
      for (const property of properties) styles[property] = style.getPropertyValue(property);
      return {
        tag: el.tagName.toLowerCase(),
        text: el.textContent || '',
        attributes,
        visible: visible(el),
        styles,
      };
    });

  window.__folio = { resolve, visible, snapshot };
}

(async () => {
  const browser = await playwright['__BROWSER__'].launch({ headless: __HEADLESS__ });
  const context = await browser.newContext({ viewport: { width: __WIDTH__, height: __HEIGHT__ } });
  await context.addInitScript(installResolver);
  const page = await context.newPage();

  const send = (msg) => process.stdout.write(JSON.stringify(msg) + '\n');

  const handlers = {
    async goto(cmd) {
      await page.goto(cmd.url, { timeout: cmd.timeout_ms, waitUntil: 'load' });
      return { url: page.url() };
    },
    async viewport(cmd) {
      await page.setViewportSize({ width: cmd.width, height: cmd.height });
      return {};
    },
    async query(cmd) {
      const value = await page.evaluate(
        ([loc, properties]) => window.__folio.snapshot(loc, properties),
        [cmd.locator, cmd.properties],
      );
      return { value };
    },
    async click(cmd) {
      const handle = await page.waitForFunction(
        (loc) => {
          const el = window.__folio.resolve(loc)[0];
          return el && window.__folio.visible(el) ? el : null;
        },
        cmd.locator,
        { timeout: cmd.timeout_ms, polling: 50 },
      );
      await handle.asElement().click({ timeout: cmd.timeout_ms });
      await page.waitForLoadState('load', { timeout: cmd.timeout_ms });
      return { url: page.url() };
    },
    async title() {
      return { value: await page.title() };
    },
    async close() {
      await browser.close();
      return {};
    },
  };

  send({ id: 0, ok: true });

  const rl = readline.createInterface({ input: process.stdin });
  for await (const line of rl) {
    if (!line.trim()) continue;
    let cmd;
    try {
      cmd = JSON.parse(line);
    } catch (error) {
      send({ id: 0, ok: false, kind: 'other', error: 'malformed command' });
      continue;
    }
    try {
      const result = await handlers[cmd.op](cmd);
      send({ id: cmd.id, ok: true, ...result });
      if (cmd.op === 'close') process.exit(0);
    } catch (error) {
      let kind = 'other';
      if (error.name === 'TimeoutError') kind = 'timeout';
      else if (/is not a valid selector/.test(error.message)) kind = 'selector';
      send({ id: cmd.id, ok: false, kind, error: error.message });
    }
  }
  await browser.close();
})().catch((error) => {
  process.stderr.write(String((error && error.stack) || error) + '\n');
  process.exit(1);
});
"##;
