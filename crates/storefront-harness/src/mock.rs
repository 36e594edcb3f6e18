//! Scripted in-process engine.
//!
//! Records every call for verification and can be told to fail remote
//! connects, launches, screenshots, element lookups or page evaluations, and can answer
//! page functions with scripted values. Selector signals are
//! scheduled relative to the page's last navigation or click, on the tokio
//! clock, so paused-time tests see them appear deterministically.

use crate::engine::{Browser, BrowserContext, BrowserKind, ContextOptions, Engine, LaunchOptions, Page};
use crate::result::{HarnessError, HarnessResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Message of a scripted page error, as Chromium reports it mid-navigation
pub const NAVIGATION_ERROR: &str =
    "Execution context was destroyed, most likely because of a navigation";

/// PNG signature returned for every mock screenshot
pub const MOCK_PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// A page function call seen by the mock
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Function source
    pub function: String,
    /// Argument passed to the function
    pub argument: serde_json::Value,
}

/// Element that becomes visible some time after the page's last action
#[derive(Debug, Clone)]
pub struct ScheduledSignal {
    /// CSS selector that matches it
    pub selector: String,
    /// Its text content
    pub text: String,
    /// Delay after the last navigation or click
    pub appears_after: Duration,
}

#[derive(Debug, Default)]
struct MockState {
    call_history: Vec<String>,
    evaluations: Vec<Evaluation>,
    contexts_created: usize,
    open_contexts: usize,
    connect_failure: Option<String>,
    connect_hangs: bool,
    launch_failure: Option<String>,
    screenshot_failure: bool,
    evaluate_failure: bool,
    navigation_errors: usize,
    function_results: Vec<(String, serde_json::Value)>,
    signals: Vec<ScheduledSignal>,
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock engine for unit and integration testing
#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    state: Arc<Mutex<MockState>>,
}

impl MockEngine {
    /// Create new mock engine
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every remote connect fail with `message`
    #[must_use]
    pub fn with_connect_failure(self, message: impl Into<String>) -> Self {
        lock(&self.state).connect_failure = Some(message.into());
        self
    }

    /// Make every remote connect hang forever
    #[must_use]
    pub fn with_hanging_connect(self) -> Self {
        lock(&self.state).connect_hangs = true;
        self
    }

    /// Make every local launch fail with `message`
    #[must_use]
    pub fn with_launch_failure(self, message: impl Into<String>) -> Self {
        lock(&self.state).launch_failure = Some(message.into());
        self
    }

    /// Make every screenshot fail
    #[must_use]
    pub fn with_screenshot_failure(self) -> Self {
        lock(&self.state).screenshot_failure = true;
        self
    }

    /// Make every page function call fail
    #[must_use]
    pub fn with_evaluate_failure(self) -> Self {
        lock(&self.state).evaluate_failure = true;
        self
    }

    /// Make the next `count` element lookups fail as if the page were navigating
    #[must_use]
    pub fn with_navigation_errors(self, count: usize) -> Self {
        lock(&self.state).navigation_errors = count;
        self
    }

    /// Answer page functions whose source contains `marker` with `value`
    #[must_use]
    pub fn with_function_result(self, marker: &str, value: serde_json::Value) -> Self {
        lock(&self.state)
            .function_results
            .push((marker.to_string(), value));
        self
    }

    /// Schedule an element to appear `after` the last navigation or click
    #[must_use]
    pub fn with_signal(self, selector: &str, text: &str, after: Duration) -> Self {
        lock(&self.state).signals.push(ScheduledSignal {
            selector: selector.to_string(),
            text: text.to_string(),
            appears_after: after,
        });
        self
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        lock(&self.state).call_history.clone()
    }

    /// Check if a call starting with `prefix` was made
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        lock(&self.state)
            .call_history
            .iter()
            .any(|c| c.starts_with(prefix))
    }

    /// Number of calls starting with `prefix`
    #[must_use]
    pub fn call_count(&self, prefix: &str) -> usize {
        lock(&self.state)
            .call_history
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    /// Page function calls seen so far
    #[must_use]
    pub fn evaluations(&self) -> Vec<Evaluation> {
        lock(&self.state).evaluations.clone()
    }

    /// Contexts created over the engine's lifetime
    #[must_use]
    pub fn contexts_created(&self) -> usize {
        lock(&self.state).contexts_created
    }

    /// Contexts created and not yet closed
    #[must_use]
    pub fn open_contexts(&self) -> usize {
        lock(&self.state).open_contexts
    }

    fn record(&self, call: String) {
        lock(&self.state).call_history.push(call);
    }
}

#[async_trait]
impl Engine for MockEngine {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn launch(
        &self,
        kind: BrowserKind,
        options: LaunchOptions,
    ) -> HarnessResult<Box<dyn Browser>> {
        self.record(format!("launch:{kind}:headless={}", options.headless));
        if let Some(message) = lock(&self.state).launch_failure.clone() {
            return Err(HarnessError::BrowserLaunchError { message });
        }
        Ok(Box::new(MockBrowser {
            state: Arc::clone(&self.state),
            label: kind.to_string(),
        }))
    }

    async fn connect(&self, endpoint: &str) -> HarnessResult<Box<dyn Browser>> {
        self.record(format!("connect:{endpoint}"));
        let (failure, hangs) = {
            let state = lock(&self.state);
            (state.connect_failure.clone(), state.connect_hangs)
        };
        if hangs {
            std::future::pending::<()>().await;
        }
        if let Some(message) = failure {
            return Err(HarnessError::ConnectionFailed { message });
        }
        Ok(Box::new(MockBrowser {
            state: Arc::clone(&self.state),
            label: "remote".to_string(),
        }))
    }

    async fn close(&self) -> HarnessResult<()> {
        self.record("engine_close".to_string());
        Ok(())
    }
}

/// Browser handed out by [`MockEngine`]
#[derive(Debug)]
pub struct MockBrowser {
    state: Arc<Mutex<MockState>>,
    label: String,
}

#[async_trait]
impl Browser for MockBrowser {
    async fn new_context(&self, options: ContextOptions) -> HarnessResult<Box<dyn BrowserContext>> {
        let id = {
            let mut state = lock(&self.state);
            state.contexts_created += 1;
            state.open_contexts += 1;
            let id = state.contexts_created;
            state.call_history.push(format!(
                "new_context:{id}:{}x{}",
                options.viewport_width, options.viewport_height
            ));
            id
        };
        Ok(Box::new(MockContext {
            state: Arc::clone(&self.state),
            id,
            closed: Arc::new(AtomicBool::new(false)),
        }))
    }

    async fn close(&self) -> HarnessResult<()> {
        lock(&self.state)
            .call_history
            .push(format!("browser_close:{}", self.label));
        Ok(())
    }
}

/// Context handed out by [`MockBrowser`]
#[derive(Debug)]
pub struct MockContext {
    state: Arc<Mutex<MockState>>,
    id: usize,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl BrowserContext for MockContext {
    async fn new_page(&self) -> HarnessResult<Box<dyn Page>> {
        lock(&self.state)
            .call_history
            .push(format!("new_page:{}", self.id));
        Ok(Box::new(MockPage {
            state: Arc::clone(&self.state),
            context_closed: Arc::clone(&self.closed),
            url: Mutex::new("about:blank".to_string()),
            last_action: Mutex::new(Instant::now()),
        }))
    }

    async fn close(&self) -> HarnessResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let mut state = lock(&self.state);
            state.open_contexts = state.open_contexts.saturating_sub(1);
            state.call_history.push(format!("context_close:{}", self.id));
        }
        Ok(())
    }
}

/// Page handed out by [`MockContext`]
#[derive(Debug)]
pub struct MockPage {
    state: Arc<Mutex<MockState>>,
    context_closed: Arc<AtomicBool>,
    url: Mutex<String>,
    last_action: Mutex<Instant>,
}

impl MockPage {
    fn ensure_open(&self) -> HarnessResult<()> {
        if self.context_closed.load(Ordering::SeqCst) {
            return Err(HarnessError::page("target page, context or browser has been closed"));
        }
        Ok(())
    }

    fn touch(&self) {
        *self.last_action.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn record(&self, call: String) {
        lock(&self.state).call_history.push(call);
    }
}

#[async_trait]
impl Page for MockPage {
    async fn goto(&self, url: &str) -> HarnessResult<()> {
        self.ensure_open()?;
        self.record(format!("goto:{url}"));
        *self.url.lock().unwrap_or_else(PoisonError::into_inner) = url.to_string();
        self.touch();
        Ok(())
    }

    async fn fill(&self, selector: &str, text: &str) -> HarnessResult<()> {
        self.ensure_open()?;
        self.record(format!("fill:{selector}:{}", text.chars().count()));
        Ok(())
    }

    async fn click(&self, selector: &str) -> HarnessResult<()> {
        self.ensure_open()?;
        self.record(format!("click:{selector}"));
        self.touch();
        Ok(())
    }

    async fn probe(&self, selector: &str, text: Option<&str>) -> HarnessResult<Option<String>> {
        self.ensure_open()?;
        let since = *self.last_action.lock().unwrap_or_else(PoisonError::into_inner);
        let elapsed = Instant::now().saturating_duration_since(since);
        let mut state = lock(&self.state);
        if state.navigation_errors > 0 {
            state.navigation_errors -= 1;
            return Err(HarnessError::EvaluationError {
                message: NAVIGATION_ERROR.to_string(),
            });
        }
        Ok(state
            .signals
            .iter()
            .filter(|s| s.selector == selector && elapsed >= s.appears_after)
            .find(|s| text.map_or(true, |t| s.text.contains(t)))
            .map(|s| s.text.clone()))
    }

    async fn call_function(
        &self,
        function: &str,
        argument: &serde_json::Value,
    ) -> HarnessResult<serde_json::Value> {
        self.ensure_open()?;
        let mut state = lock(&self.state);
        state.call_history.push(format!("call_function:{function}"));
        if state.evaluate_failure {
            return Err(HarnessError::EvaluationError {
                message: "mock evaluation failure".to_string(),
            });
        }
        state.evaluations.push(Evaluation {
            function: function.to_string(),
            argument: argument.clone(),
        });
        Ok(state
            .function_results
            .iter()
            .find(|(marker, _)| function.contains(marker.as_str()))
            .map_or(serde_json::Value::Null, |(_, value)| value.clone()))
    }

    async fn screenshot(&self, full_page: bool) -> HarnessResult<Vec<u8>> {
        self.ensure_open()?;
        let mut state = lock(&self.state);
        state.call_history.push(if full_page {
            "screenshot:full".to_string()
        } else {
            "screenshot:viewport".to_string()
        });
        if state.screenshot_failure {
            return Err(HarnessError::ScreenshotError {
                message: "mock screenshot failure".to_string(),
            });
        }
        Ok(MOCK_PNG.to_vec())
    }

    async fn url(&self) -> HarnessResult<String> {
        self.ensure_open()?;
        Ok(self.url.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }
}
