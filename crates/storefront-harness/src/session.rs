//! Suite-scoped session: one engine handle and one browser handle per run.
//!
//! Remote connectivity failures are never suite-fatal. A failed or timed-out
//! grid connect is logged and replaced by a local Chromium launch.

use crate::config::SuiteConfig;
use crate::engine::{Browser, BrowserKind, Engine, LaunchOptions};
use crate::environment::{ExecutionTarget, ResolvedEnvironment};
use crate::grid::GridCapabilities;
use crate::result::{HarnessError, HarnessResult};
use std::fmt;
use std::sync::Arc;

/// How the suite's browser came to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserOrigin {
    /// Launched locally as requested
    Local,
    /// Connected to the remote grid
    Remote,
    /// Launched locally after the remote connect failed
    LocalFallback,
}

impl fmt::Display for BrowserOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Remote => "remote",
            Self::LocalFallback => "local (fallback)",
        })
    }
}

/// Owner of the engine and browser handles for a suite run
#[derive(Debug)]
pub struct SessionManager {
    engine: Arc<dyn Engine>,
    browser: Option<Box<dyn Browser>>,
    origin: BrowserOrigin,
    environment: ResolvedEnvironment,
    closed: bool,
}

impl SessionManager {
    /// Start the suite: launch locally or connect to the grid with fallback.
    ///
    /// Local launch failures (including an engine that cannot drive the
    /// requested browser) abort the suite.
    pub async fn start_suite(
        config: &SuiteConfig,
        environment: ResolvedEnvironment,
        engine: Arc<dyn Engine>,
    ) -> HarnessResult<Self> {
        tracing::info!(engine = engine.name(), target = ?environment.target, "starting suite session");

        let (browser, origin) = match environment.target {
            ExecutionTarget::Local => {
                let browser = engine
                    .launch(environment.browser, LaunchOptions::new(environment.headless))
                    .await?;
                tracing::info!(browser = %environment.browser, headless = environment.headless, "local browser launched");
                (browser, BrowserOrigin::Local)
            }
            ExecutionTarget::RemoteGrid => match connect_remote(engine.as_ref(), config, &environment).await {
                Ok(browser) => {
                    tracing::info!(endpoint = %config.grid.endpoint, "connected to remote grid");
                    (browser, BrowserOrigin::Remote)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "remote grid connection failed, falling back to local chromium");
                    let browser = engine
                        .launch(BrowserKind::Chromium, LaunchOptions::new(environment.headless))
                        .await?;
                    (browser, BrowserOrigin::LocalFallback)
                }
            },
        };

        Ok(Self {
            engine,
            browser: Some(browser),
            origin,
            environment,
            closed: false,
        })
    }

    /// Suite browser; `SuiteClosed` once teardown has begun
    pub fn browser(&self) -> HarnessResult<&dyn Browser> {
        if self.closed {
            return Err(HarnessError::SuiteClosed);
        }
        self.browser.as_deref().ok_or(HarnessError::SuiteClosed)
    }

    /// How the browser was obtained
    #[must_use]
    pub const fn origin(&self) -> BrowserOrigin {
        self.origin
    }

    /// Environment the suite was started with
    #[must_use]
    pub fn environment(&self) -> &ResolvedEnvironment {
        &self.environment
    }

    /// Whether test outcomes should be relayed to the grid.
    ///
    /// Only a live grid connection has a status channel; a local fallback
    /// browser does not.
    #[must_use]
    pub fn relays_status(&self) -> bool {
        self.environment.target.is_remote() && self.origin == BrowserOrigin::Remote
    }

    /// Whether teardown has begun
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close the browser, then the engine. Repeated calls are no-ops.
    pub async fn end_suite(&mut self) {
        if self.closed {
            tracing::debug!("suite session already closed");
            return;
        }
        self.closed = true;

        if let Some(browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                tracing::warn!(error = %e, "failed to close suite browser");
            }
        }
        if let Err(e) = self.engine.close().await {
            tracing::warn!(error = %e, "failed to close engine");
        }
        tracing::info!(origin = %self.origin, "suite session closed");
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if !self.closed {
            tracing::warn!("suite session dropped without end_suite");
        }
    }
}

async fn connect_remote(
    engine: &dyn Engine,
    config: &SuiteConfig,
    environment: &ResolvedEnvironment,
) -> HarnessResult<Box<dyn Browser>> {
    let capabilities = GridCapabilities::new(&config.grid, environment)?;
    tracing::debug!(?capabilities, "connecting to remote grid");
    let url = capabilities.connect_url(&config.grid.endpoint)?;

    tokio::time::timeout(config.grid.connect_timeout(), engine.connect(url.as_str()))
        .await
        .map_err(|_| HarnessError::ConnectTimeout {
            secs: config.grid.connect_timeout_secs,
        })?
}
