//! Suite configuration.
//!
//! Values are read once at suite start from an optional YAML file and then
//! layered with explicit overrides by the caller (CLI flags, `BROWSER`).

use crate::capture::CaptureConfig;
use crate::engine::{ContextOptions, DEFAULT_VIEWPORT_HEIGHT, DEFAULT_VIEWPORT_WIDTH};
use crate::result::{HarnessError, HarnessResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "storefront.yaml";

/// Environment variable holding the grid username
pub const GRID_USERNAME_VAR: &str = "LT_USERNAME";

/// Environment variable holding the grid access key
pub const GRID_ACCESS_KEY_VAR: &str = "LT_ACCESS_KEY";

/// Environment variable holding the CI build number
pub const BUILD_NUMBER_VAR: &str = "BUILD_NUMBER";

/// Environment variable for the explicit browser override
pub const BROWSER_OVERRIDE_VAR: &str = "BROWSER";

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width in CSS pixels
    pub width: u32,
    /// Height in CSS pixels
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: DEFAULT_VIEWPORT_WIDTH,
            height: DEFAULT_VIEWPORT_HEIGHT,
        }
    }
}

/// Remote grid settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// WebSocket endpoint of the grid's CDP gateway
    pub endpoint: String,
    /// Browser name requested from the grid
    pub browser_name: String,
    /// Browser version requested from the grid
    pub browser_version: String,
    /// Operating system requested from the grid
    pub platform: String,
    /// Human-readable label shown on the grid dashboard
    pub run_label: String,
    /// Upper bound for the connect attempt before falling back to local
    pub connect_timeout_secs: u64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            endpoint: "wss://cdp.lambdatest.com/puppeteer".to_string(),
            browser_name: "Chrome".to_string(),
            browser_version: "latest".to_string(),
            platform: "Windows 11".to_string(),
            run_label: "Storefront Journey Suite".to_string(),
            connect_timeout_secs: 30,
        }
    }
}

impl GridConfig {
    /// Connect timeout as a duration
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Configuration for a suite run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Persisted browser choice (`chromium`, `firefox`, `webkit` or `cloud`)
    pub browser: Option<String>,
    /// Run local browsers headless
    pub headless: bool,
    /// Storefront base URL
    pub base_url: String,
    /// Directory for failure traces
    pub traces_dir: PathBuf,
    /// Directory for the run report
    pub report_dir: PathBuf,
    /// Viewport of every test context
    pub viewport: Viewport,
    /// Remote grid settings
    pub grid: GridConfig,
    /// Wait after a status relay before the context closes
    pub status_grace_ms: u64,
    /// Bound for the login outcome race
    pub login_timeout_ms: u64,
    /// Per-test trace recording
    pub capture: CaptureConfig,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            browser: None,
            headless: false,
            base_url: "https://ecommerce-playground.lambdatest.io/".to_string(),
            traces_dir: PathBuf::from("traces"),
            report_dir: PathBuf::from("target/storefront"),
            viewport: Viewport::default(),
            grid: GridConfig::default(),
            status_grace_ms: 2_000,
            login_timeout_ms: 15_000,
            capture: CaptureConfig::default(),
        }
    }
}

impl SuiteConfig {
    /// Create new config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a YAML file
    pub fn load(path: &Path) -> HarnessResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            HarnessError::config(format!("could not read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&text)
    }

    /// Load from a YAML file, falling back to defaults when it does not exist
    pub fn load_or_default(path: &Path) -> HarnessResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "config file absent, using defaults");
            Ok(Self::default())
        }
    }

    /// Parse YAML text
    pub fn from_yaml(text: &str) -> HarnessResult<Self> {
        let config: Self = serde_yaml_ng::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that cannot drive a run
    pub fn validate(&self) -> HarnessResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(HarnessError::config("base_url must not be empty"));
        }
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(HarnessError::config("viewport dimensions must be non-zero"));
        }
        Ok(())
    }

    /// Set the persisted browser choice
    #[must_use]
    pub fn with_browser(mut self, browser: impl Into<String>) -> Self {
        self.browser = Some(browser.into());
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the traces directory
    #[must_use]
    pub fn with_traces_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.traces_dir = dir.into();
        self
    }

    /// Set the report directory
    #[must_use]
    pub fn with_report_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.report_dir = dir.into();
        self
    }

    /// Set the status grace period
    #[must_use]
    pub const fn with_status_grace_ms(mut self, ms: u64) -> Self {
        self.status_grace_ms = ms;
        self
    }

    /// Set the trace recording options
    #[must_use]
    pub fn with_capture(mut self, capture: CaptureConfig) -> Self {
        self.capture = capture;
        self
    }

    /// Context options derived from the configured viewport
    #[must_use]
    pub const fn context_options(&self) -> ContextOptions {
        ContextOptions {
            viewport_width: self.viewport.width,
            viewport_height: self.viewport.height,
        }
    }

    /// Grace period after relaying a status
    #[must_use]
    pub const fn status_grace(&self) -> Duration {
        Duration::from_millis(self.status_grace_ms)
    }

    /// Login race bound
    #[must_use]
    pub const fn login_timeout(&self) -> Duration {
        Duration::from_millis(self.login_timeout_ms)
    }
}

/// Snapshot of process environment variables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessEnv {
    vars: HashMap<String, String>,
}

impl ProcessEnv {
    /// Empty environment
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the current process environment
    #[must_use]
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Add a variable
    #[must_use]
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Non-empty value of a variable
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }
}
