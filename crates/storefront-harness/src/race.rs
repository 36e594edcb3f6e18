//! Outcome race: wait for the first of two mutually exclusive UI signals.

use crate::engine::Page;
use crate::result::{HarnessError, HarnessResult};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

/// Default bound for a race
pub const DEFAULT_RACE_TIMEOUT: Duration = Duration::from_secs(15);

/// Default polling interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Text reported when the error signal has no text
pub const NO_MESSAGE: &str = "<no message>";

/// An observable UI condition
#[async_trait]
pub trait Signal: Send + Sync {
    /// Human readable description for timeout errors
    fn description(&self) -> String;

    /// Text of the signal if it is currently observable
    async fn observe(&self) -> HarnessResult<Option<String>>;
}

/// Signal backed by a visible element matching a selector and optional text
#[derive(Debug)]
pub struct SelectorSignal<'a> {
    page: &'a dyn Page,
    selector: String,
    text: Option<String>,
}

impl<'a> SelectorSignal<'a> {
    /// Any visible element matching `selector`
    #[must_use]
    pub fn new(page: &'a dyn Page, selector: impl Into<String>) -> Self {
        Self {
            page,
            selector: selector.into(),
            text: None,
        }
    }

    /// Only elements whose text contains `text`
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

#[async_trait]
impl<'a> Signal for SelectorSignal<'a> {
    fn description(&self) -> String {
        match &self.text {
            Some(text) => format!("{} with text '{text}'", self.selector),
            None => self.selector.clone(),
        }
    }

    async fn observe(&self) -> HarnessResult<Option<String>> {
        self.page.probe(&self.selector, self.text.as_deref()).await
    }
}

/// Races a success signal against an error signal
#[derive(Debug, Clone, Copy)]
pub struct OutcomeRace {
    timeout: Duration,
    poll_interval: Duration,
}

impl Default for OutcomeRace {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_RACE_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl OutcomeRace {
    /// Race with the default 15 s bound
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bound
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the polling interval
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Wait until either signal is observable, then verify with the error
    /// signal checked first. Returns the success signal's text.
    pub async fn run(&self, success: &dyn Signal, error: &dyn Signal) -> HarnessResult<String> {
        self.wait_for_either(success, error).await?;

        if let Some(text) = error.observe().await? {
            let text = text.trim();
            return Err(HarnessError::ApplicationError {
                message: if text.is_empty() {
                    NO_MESSAGE.to_string()
                } else {
                    text.to_string()
                },
            });
        }

        success.observe().await?.ok_or_else(|| {
            HarnessError::assertion(format!("{} should be visible", success.description()))
        })
    }

    async fn wait_for_either(&self, success: &dyn Signal, error: &dyn Signal) -> HarnessResult<()> {
        let deadline = Instant::now() + self.timeout;
        let mut last_error = None;
        loop {
            if observable(error, &mut last_error).await || observable(success, &mut last_error).await {
                return Ok(());
            }
            if Instant::now() >= deadline {
                let mut waiting_for = format!("{} or {}", success.description(), error.description());
                if let Some(e) = last_error {
                    waiting_for.push_str(&format!(" (last page error: {e})"));
                }
                return Err(HarnessError::Timeout {
                    ms: self.timeout.as_millis() as u64,
                    waiting_for,
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// A signal that errors while polling is "not observable yet": the page may be
/// mid-navigation and its execution context gone.
async fn observable(signal: &dyn Signal, last_error: &mut Option<HarnessError>) -> bool {
    match signal.observe().await {
        Ok(found) => found.is_some(),
        Err(e) => {
            tracing::debug!(signal = %signal.description(), error = %e, "signal not observable yet");
            *last_error = Some(e);
            false
        }
    }
}
