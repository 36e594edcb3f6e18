//! Per-test isolated contexts.
//!
//! Each test gets a fresh browser context sized to the configured viewport, a
//! page inside it, and a running capture. The page is wrapped in a
//! [`TracedPage`] so every action lands in the test's timeline.

use crate::capture::{lock_recorder, ActiveCapture, CaptureResolution, DiagnosticCapture, SharedRecorder};
use crate::engine::{Browser, BrowserContext, ContextOptions, Page};
use crate::outcome::TestOutcome;
use crate::result::HarnessResult;
use crate::status::RemoteStatusReporter;
use async_trait::async_trait;
use std::sync::Arc;

/// Page wrapper that records spans, snapshots and frames
#[derive(Debug)]
pub struct TracedPage {
    inner: Box<dyn Page>,
    recorder: SharedRecorder,
}

impl TracedPage {
    /// Wrap `inner`, recording into `recorder`
    #[must_use]
    pub fn new(inner: Box<dyn Page>, recorder: SharedRecorder) -> Self {
        Self { inner, recorder }
    }

    /// Recorder this page writes to
    #[must_use]
    pub fn recorder(&self) -> &SharedRecorder {
        &self.recorder
    }

    fn open_span(&self, name: &str, target: &str) -> String {
        let mut recorder = lock_recorder(&self.recorder);
        let id = recorder.start_span(name);
        recorder.annotate(&id, "target", target);
        id
    }

    fn close_span<T>(&self, id: &str, result: &HarnessResult<T>) {
        let mut recorder = lock_recorder(&self.recorder);
        if let Err(e) = result {
            recorder.error_span(id, &e.to_string());
        }
        recorder.end_span(id);
    }

    /// Snapshot the URL and, while the frame budget lasts, the viewport
    async fn after_action(&self, label: &str) {
        if let Ok(url) = self.inner.url().await {
            lock_recorder(&self.recorder).snapshot(&url);
        }
        if !lock_recorder(&self.recorder).wants_frame() {
            return;
        }
        match self.inner.screenshot(false).await {
            Ok(png) => lock_recorder(&self.recorder).frame(label, png),
            Err(e) => tracing::debug!(error = %e, "frame capture skipped"),
        }
    }
}

#[async_trait]
impl Page for TracedPage {
    async fn goto(&self, url: &str) -> HarnessResult<()> {
        tracing::debug!(url, "goto");
        let span = self.open_span("goto", url);
        let result = self.inner.goto(url).await;
        self.close_span(&span, &result);
        if result.is_ok() {
            self.after_action(&format!("goto {url}")).await;
        }
        result
    }

    async fn fill(&self, selector: &str, text: &str) -> HarnessResult<()> {
        tracing::debug!(selector, "fill");
        let span = self.open_span("fill", selector);
        let result = self.inner.fill(selector, text).await;
        self.close_span(&span, &result);
        result
    }

    async fn click(&self, selector: &str) -> HarnessResult<()> {
        tracing::debug!(selector, "click");
        let span = self.open_span("click", selector);
        let result = self.inner.click(selector).await;
        self.close_span(&span, &result);
        if result.is_ok() {
            self.after_action(&format!("click {selector}")).await;
        }
        result
    }

    async fn probe(&self, selector: &str, text: Option<&str>) -> HarnessResult<Option<String>> {
        self.inner.probe(selector, text).await
    }

    async fn call_function(
        &self,
        function: &str,
        argument: &serde_json::Value,
    ) -> HarnessResult<serde_json::Value> {
        let span = self.open_span("call_function", function);
        let result = self.inner.call_function(function, argument).await;
        self.close_span(&span, &result);
        result
    }

    async fn screenshot(&self, full_page: bool) -> HarnessResult<Vec<u8>> {
        self.inner.screenshot(full_page).await
    }

    async fn url(&self) -> HarnessResult<String> {
        self.inner.url().await
    }
}

/// Everything a single test owns: context, page and capture
#[derive(Debug)]
pub struct TestSession {
    name: String,
    context: Box<dyn BrowserContext>,
    page: Arc<TracedPage>,
    capture: ActiveCapture,
}

/// Result of tearing a session down
#[derive(Debug, Clone)]
pub struct SessionTeardown {
    /// How the capture was resolved
    pub capture: CaptureResolution,
    /// Whether a status was relayed to the grid
    pub status_relayed: bool,
}

impl TestSession {
    /// Test name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared handle to the test's page
    #[must_use]
    pub fn page(&self) -> Arc<TracedPage> {
        Arc::clone(&self.page)
    }

    /// Resolve the capture, relay the status (when a reporter is given), then
    /// close the context. Runs every step regardless of earlier failures.
    pub async fn close(
        self,
        outcome: &TestOutcome,
        status: Option<&RemoteStatusReporter>,
    ) -> SessionTeardown {
        let Self {
            name,
            context,
            page,
            capture,
        } = self;

        let capture = capture.resolve(outcome, Some(page.as_ref() as &dyn Page)).await;

        let status_relayed = match status {
            Some(reporter) => reporter.report(page.as_ref(), outcome).await,
            None => false,
        };

        if let Err(e) = context.close().await {
            tracing::warn!(test = %name, error = %e, "failed to close test context");
        }
        tracing::debug!(test = %name, "test context closed");

        SessionTeardown {
            capture,
            status_relayed,
        }
    }
}

/// Opens one isolated session per test
#[derive(Debug, Clone)]
pub struct TestContextFactory {
    options: ContextOptions,
    capture: DiagnosticCapture,
}

impl TestContextFactory {
    /// Create a factory
    #[must_use]
    pub fn new(options: ContextOptions, capture: DiagnosticCapture) -> Self {
        Self { options, capture }
    }

    /// Viewport options applied to every context
    #[must_use]
    pub const fn options(&self) -> ContextOptions {
        self.options
    }

    /// Create a fresh context, start recording, and open a page in it
    pub async fn open_test(&self, browser: &dyn Browser, name: &str) -> HarnessResult<TestSession> {
        let context = browser.new_context(self.options).await?;
        let capture = self.capture.start(name);

        let page = match context.new_page().await {
            Ok(page) => page,
            Err(e) => {
                drop(capture);
                if let Err(close_err) = context.close().await {
                    tracing::warn!(test = name, error = %close_err, "failed to close context after page error");
                }
                return Err(e);
            }
        };

        tracing::info!(test = name, "test context opened");
        Ok(TestSession {
            name: name.to_string(),
            context,
            page: Arc::new(TracedPage::new(page, capture.recorder())),
            capture,
        })
    }

    /// Tear down a session; see [`TestSession::close`]
    pub async fn close_test(
        &self,
        session: TestSession,
        outcome: &TestOutcome,
        status: Option<&RemoteStatusReporter>,
    ) -> SessionTeardown {
        session.close(outcome, status).await
    }
}
