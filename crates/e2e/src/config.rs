//! Run settings: TOML file, environment overrides, validation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{E2eError, E2eResult};
use crate::playwright::{Browser, PlaywrightConfig};
use crate::probe::parse_base_url;
use crate::runner::{
    RunnerConfig, DEFAULT_COMMAND_TIMEOUT, DEFAULT_PAGE_LOAD_TIMEOUT, DEFAULT_POLL_INTERVAL,
    DEFAULT_PROBE_TIMEOUT,
};
use crate::spec::Viewport;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080/";
pub const DEFAULT_OUTPUT_DIR: &str = "test-results";
pub const DEFAULT_CONFIG_FILE: &str = "folio.toml";

pub const ENV_BASE_URL: &str = "FOLIO_BASE_URL";
pub const ENV_DRIVER: &str = "FOLIO_DRIVER";
pub const ENV_BROWSER: &str = "FOLIO_BROWSER";
pub const ENV_VIEWPORT: &str = "FOLIO_VIEWPORT";
pub const ENV_COMMAND_TIMEOUT_MS: &str = "FOLIO_COMMAND_TIMEOUT_MS";
pub const ENV_PAGE_LOAD_TIMEOUT_MS: &str = "FOLIO_PAGE_LOAD_TIMEOUT_MS";
pub const ENV_OUTPUT_DIR: &str = "FOLIO_OUTPUT_DIR";

/// Which page driver runs the checks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// Fetch and inspect markup, no browser
    #[default]
    Static,
    /// Real browser through Playwright
    Playwright,
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverKind::Static => write!(f, "static"),
            DriverKind::Playwright => write!(f, "playwright"),
        }
    }
}

impl FromStr for DriverKind {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(DriverKind::Static),
            "playwright" | "browser" => Ok(DriverKind::Playwright),
            other => Err(E2eError::Configuration(format!(
                "unknown driver '{}': use static or playwright",
                other
            ))),
        }
    }
}

/// Settings for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_url: String,
    pub driver: DriverKind,
    pub browser: Browser,
    pub headless: bool,
    pub viewport: Viewport,
    pub command_timeout_ms: u64,
    pub page_load_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub probe_timeout_ms: u64,
    pub output_dir: PathBuf,
    /// Directory of YAML suites run instead of the built-in catalog
    pub specs_dir: Option<PathBuf>,
    /// Node project holding the `playwright` package
    pub node_project_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            driver: DriverKind::Static,
            browser: Browser::Chromium,
            headless: true,
            viewport: Viewport::default(),
            command_timeout_ms: DEFAULT_COMMAND_TIMEOUT.as_millis() as u64,
            page_load_timeout_ms: DEFAULT_PAGE_LOAD_TIMEOUT.as_millis() as u64,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT.as_millis() as u64,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            specs_dir: None,
            node_project_dir: None,
        }
    }
}

impl Settings {
    /// Load settings from `path` if it exists, defaults otherwise
    pub fn load(path: &Path) -> E2eResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let settings: Self = toml::from_str(&content)
                .map_err(|e| E2eError::Configuration(format!("{}: {}", path.display(), e)))?;
            Ok(settings)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply `FOLIO_*` overrides from the process environment
    pub fn apply_env(&mut self) -> E2eResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> E2eResult<()> {
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(driver) = lookup(ENV_DRIVER) {
            self.driver = driver.parse()?;
        }
        if let Some(browser) = lookup(ENV_BROWSER) {
            self.browser = browser.parse()?;
        }
        if let Some(viewport) = lookup(ENV_VIEWPORT) {
            self.viewport = viewport.parse()?;
        }
        if let Some(ms) = lookup(ENV_COMMAND_TIMEOUT_MS) {
            self.command_timeout_ms = parse_millis(ENV_COMMAND_TIMEOUT_MS, &ms)?;
        }
        if let Some(ms) = lookup(ENV_PAGE_LOAD_TIMEOUT_MS) {
            self.page_load_timeout_ms = parse_millis(ENV_PAGE_LOAD_TIMEOUT_MS, &ms)?;
        }
        if let Some(dir) = lookup(ENV_OUTPUT_DIR) {
            self.output_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    /// Validate into the runner's configuration
    pub fn runner_config(&self) -> E2eResult<RunnerConfig> {
        let base_url = parse_base_url(&self.base_url)?;

        for (name, ms) in [
            ("command_timeout_ms", self.command_timeout_ms),
            ("page_load_timeout_ms", self.page_load_timeout_ms),
            ("poll_interval_ms", self.poll_interval_ms),
        ] {
            if ms == 0 {
                return Err(E2eError::Configuration(format!("{} must be greater than 0", name)));
            }
        }

        Ok(RunnerConfig {
            base_url,
            viewport: self.viewport,
            command_timeout: Duration::from_millis(self.command_timeout_ms),
            page_load_timeout: Duration::from_millis(self.page_load_timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
        })
    }

    pub fn playwright_config(&self) -> PlaywrightConfig {
        PlaywrightConfig {
            browser: self.browser,
            headless: self.headless,
            viewport: self.viewport,
            node_project_dir: self.node_project_dir.clone(),
            ..Default::default()
        }
    }
}

fn parse_millis(key: &str, value: &str) -> E2eResult<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| E2eError::Configuration(format!("{} must be milliseconds, got '{}'", key, value)))
}
