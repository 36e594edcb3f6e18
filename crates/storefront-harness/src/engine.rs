//! Automation engine seam.
//!
//! The browser-automation engine is consumed as a black box. Everything the
//! lifecycle needs from it goes through four object-safe traits so the real CDP
//! backend and the scripted [`MockEngine`](crate::mock::MockEngine) are
//! interchangeable:
//!
//! ```text
//! Engine ──launch/connect──► Browser ──new_context──► BrowserContext ──new_page──► Page
//! (suite)                    (suite)                  (per test)                   (per test)
//! ```

use crate::result::{HarnessError, HarnessResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default viewport width for every test context
pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1920;

/// Default viewport height for every test context
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 1080;

/// Locally launchable browser engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    /// Chromium / Chrome
    Chromium,
    /// Firefox
    Firefox,
    /// WebKit
    Webkit,
}

impl BrowserKind {
    /// Lowercase engine name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Chromium => "chromium",
            Self::Firefox => "firefox",
            Self::Webkit => "webkit",
        }
    }
}

impl fmt::Display for BrowserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BrowserKind {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chromium" => Ok(Self::Chromium),
            "firefox" => Ok(Self::Firefox),
            "webkit" => Ok(Self::Webkit),
            _ => Err(HarnessError::InvalidBrowser {
                name: s.to_string(),
            }),
        }
    }
}

/// Options for a local launch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Run without a visible window
    pub headless: bool,
}

impl LaunchOptions {
    /// Create launch options
    #[must_use]
    pub const fn new(headless: bool) -> Self {
        Self { headless }
    }
}

/// Options for a fresh isolated context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextOptions {
    /// Viewport width in CSS pixels
    pub viewport_width: u32,
    /// Viewport height in CSS pixels
    pub viewport_height: u32,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            viewport_width: DEFAULT_VIEWPORT_WIDTH,
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
        }
    }
}

impl ContextOptions {
    /// Set viewport dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }
}

/// Suite-scoped automation engine (the engine handle)
#[async_trait]
pub trait Engine: Send + Sync + fmt::Debug {
    /// Engine name for logs and errors
    fn name(&self) -> &'static str;

    /// Launch a local browser process
    async fn launch(
        &self,
        kind: BrowserKind,
        options: LaunchOptions,
    ) -> HarnessResult<Box<dyn Browser>>;

    /// Connect to a remote browser endpoint
    async fn connect(&self, endpoint: &str) -> HarnessResult<Box<dyn Browser>>;

    /// Release engine resources. Must tolerate repeated calls.
    async fn close(&self) -> HarnessResult<()>;
}

/// A launched or connected browser (the browser handle)
#[async_trait]
pub trait Browser: Send + Sync + fmt::Debug {
    /// Create a new isolated cookie/storage context
    async fn new_context(&self, options: ContextOptions) -> HarnessResult<Box<dyn BrowserContext>>;

    /// Close the browser or disconnect from it
    async fn close(&self) -> HarnessResult<()>;
}

/// An isolated browsing session
#[async_trait]
pub trait BrowserContext: Send + Sync + fmt::Debug {
    /// Open a page inside this context
    async fn new_page(&self) -> HarnessResult<Box<dyn Page>>;

    /// Close the context and every page in it
    async fn close(&self) -> HarnessResult<()>;
}

/// A single page inside a context
#[async_trait]
pub trait Page: Send + Sync + fmt::Debug {
    /// Navigate to a URL
    async fn goto(&self, url: &str) -> HarnessResult<()>;

    /// Type text into the first element matching `selector`
    async fn fill(&self, selector: &str, text: &str) -> HarnessResult<()>;

    /// Click the first element matching `selector`
    async fn click(&self, selector: &str) -> HarnessResult<()>;

    /// Text of the first visible element matching `selector` whose text
    /// contains `text` (any text when `None`); `None` when nothing matches.
    async fn probe(&self, selector: &str, text: Option<&str>) -> HarnessResult<Option<String>>;

    /// Evaluate `function` in the page with a single JSON argument
    async fn call_function(
        &self,
        function: &str,
        argument: &serde_json::Value,
    ) -> HarnessResult<serde_json::Value>;

    /// PNG screenshot of the viewport, or of the whole document when `full_page`
    async fn screenshot(&self, full_page: bool) -> HarnessResult<Vec<u8>>;

    /// Current URL
    async fn url(&self) -> HarnessResult<String>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod browser_kind_tests {
        use super::*;

        #[test]
        fn test_parse_is_case_insensitive() {
            assert_eq!("Chromium".parse::<BrowserKind>().unwrap(), BrowserKind::Chromium);
            assert_eq!("FIREFOX".parse::<BrowserKind>().unwrap(), BrowserKind::Firefox);
            assert_eq!(" webkit ".parse::<BrowserKind>().unwrap(), BrowserKind::Webkit);
        }

        #[test]
        fn test_parse_rejects_unknown() {
            let err = "netscape".parse::<BrowserKind>().unwrap_err();
            assert!(matches!(err, HarnessError::InvalidBrowser { ref name } if name == "netscape"));
        }

        #[test]
        fn test_display_round_trips_name() {
            for kind in [BrowserKind::Chromium, BrowserKind::Firefox, BrowserKind::Webkit] {
                assert_eq!(kind.to_string().parse::<BrowserKind>().unwrap(), kind);
            }
        }
    }

    mod context_options_tests {
        use super::*;

        #[test]
        fn test_default_viewport_is_1080p() {
            let options = ContextOptions::default();
            assert_eq!(options.viewport_width, 1920);
            assert_eq!(options.viewport_height, 1080);
        }

        #[test]
        fn test_with_viewport() {
            let options = ContextOptions::default().with_viewport(390, 844);
            assert_eq!(options.viewport_width, 390);
            assert_eq!(options.viewport_height, 844);
        }
    }
}
