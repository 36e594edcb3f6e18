//! Remote status relay.
//!
//! The grid exposes its status channel as an inspected page function call: the
//! harness evaluates a no-op function whose single string argument carries the
//! action and the status/remark pair. The grid proxy reads the argument, the
//! return value is ignored.

use crate::engine::Page;
use crate::outcome::TestOutcome;
use crate::result::HarnessResult;
use serde::Serialize;
use std::time::Duration;

/// Action name recognized by the grid
pub const STATUS_ACTION: &str = "setTestStatus";

/// Prefix the grid proxy looks for in the function argument
pub const STATUS_CHANNEL_PREFIX: &str = "lambdatest_action: ";

/// No-op page function used as the carrier
pub const STATUS_CHANNEL_FUNCTION: &str = "_ => {}";

/// Maximum remark length in characters
pub const MAX_REASON_CHARS: usize = 255;

/// Marker appended to truncated remarks
pub const TRUNCATION_MARKER: &str = "...";

/// Remark sent for passing tests
pub const PASSED_REASON: &str = "Test Completed Successfully";

/// Remark sent for failures without a message
pub const UNKNOWN_FAILURE_REASON: &str = "Unknown Error";

/// Make a remark safe for the grid dashboard.
///
/// Double quotes become single quotes, CR/LF become spaces, and anything longer
/// than [`MAX_REASON_CHARS`] is cut so that the result including
/// [`TRUNCATION_MARKER`] is exactly [`MAX_REASON_CHARS`] characters.
#[must_use]
pub fn sanitize_reason(reason: &str) -> String {
    let cleaned: String = reason
        .chars()
        .map(|c| match c {
            '"' => '\'',
            '\n' | '\r' => ' ',
            other => other,
        })
        .collect();

    if cleaned.chars().count() <= MAX_REASON_CHARS {
        return cleaned;
    }
    let keep = MAX_REASON_CHARS - TRUNCATION_MARKER.len();
    let mut truncated: String = cleaned.chars().take(keep).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

/// Status as the grid spells it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    /// Test passed
    Passed,
    /// Test failed
    Failed,
}

/// Sanitized status/remark pair for one test
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeReport {
    /// Pass or fail
    pub status: ReportStatus,
    /// Sanitized remark
    #[serde(rename = "remark")]
    pub reason: String,
}

#[derive(Serialize)]
struct StatusAction<'a> {
    action: &'static str,
    arguments: &'a OutcomeReport,
}

impl OutcomeReport {
    /// Build from a test outcome
    #[must_use]
    pub fn from_outcome(outcome: &TestOutcome) -> Self {
        match outcome {
            TestOutcome::Passed => Self {
                status: ReportStatus::Passed,
                reason: sanitize_reason(PASSED_REASON),
            },
            TestOutcome::Failed { message } => {
                let message = if message.trim().is_empty() {
                    UNKNOWN_FAILURE_REASON
                } else {
                    message.as_str()
                };
                Self {
                    status: ReportStatus::Failed,
                    reason: sanitize_reason(message),
                }
            }
        }
    }

    /// `{"action":"setTestStatus","arguments":{"status":..,"remark":..}}`
    pub fn to_payload(&self) -> HarnessResult<String> {
        Ok(serde_json::to_string(&StatusAction {
            action: STATUS_ACTION,
            arguments: self,
        })?)
    }

    /// Argument handed to the carrier function
    pub fn channel_argument(&self) -> HarnessResult<serde_json::Value> {
        Ok(serde_json::Value::String(format!(
            "{STATUS_CHANNEL_PREFIX}{}",
            self.to_payload()?
        )))
    }
}

/// Relays each test's outcome to the remote grid
#[derive(Debug, Clone)]
pub struct RemoteStatusReporter {
    grace: Duration,
}

impl RemoteStatusReporter {
    /// Create a reporter that waits `grace` after each transmission
    #[must_use]
    pub const fn new(grace: Duration) -> Self {
        Self { grace }
    }

    /// Grace period
    #[must_use]
    pub const fn grace(&self) -> Duration {
        self.grace
    }

    /// Send the outcome through the page. Returns whether it was transmitted.
    ///
    /// Failures are logged and swallowed; the grace wait only follows a
    /// successful transmission.
    pub async fn report(&self, page: &dyn Page, outcome: &TestOutcome) -> bool {
        let report = OutcomeReport::from_outcome(outcome);
        match self.transmit(page, &report).await {
            Ok(()) => {
                tracing::info!(status = ?report.status, "test status relayed to grid");
                tokio::time::sleep(self.grace).await;
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to relay test status to grid");
                false
            }
        }
    }

    async fn transmit(&self, page: &dyn Page, report: &OutcomeReport) -> HarnessResult<()> {
        let argument = report.channel_argument()?;
        page.call_function(STATUS_CHANNEL_FUNCTION, &argument).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod sanitize_tests {
        use super::*;

        #[test]
        fn test_quotes_and_newlines() {
            assert_eq!(
                sanitize_reason("expected \"$10\"\r\nfound \"$12\""),
                "expected '$10'  found '$12'"
            );
        }

        #[test]
        fn test_exactly_max_is_untouched() {
            let reason = "x".repeat(MAX_REASON_CHARS);
            assert_eq!(sanitize_reason(&reason), reason);
        }

        #[test]
        fn test_long_reason_is_truncated_with_marker() {
            let reason = "y".repeat(400);
            let sanitized = sanitize_reason(&reason);
            assert_eq!(sanitized.chars().count(), MAX_REASON_CHARS);
            assert!(sanitized.ends_with(TRUNCATION_MARKER));
            assert!(sanitized.starts_with(&"y".repeat(252)));
        }

        #[test]
        fn test_truncation_counts_characters() {
            let reason = "é".repeat(300);
            let sanitized = sanitize_reason(&reason);
            assert_eq!(sanitized.chars().count(), MAX_REASON_CHARS);
        }
    }

    mod report_tests {
        use super::*;

        #[test]
        fn test_passed_report() {
            let report = OutcomeReport::from_outcome(&TestOutcome::Passed);
            assert_eq!(report.status, ReportStatus::Passed);
            assert_eq!(report.reason, PASSED_REASON);
        }

        #[test]
        fn test_blank_failure_is_unknown() {
            let report = OutcomeReport::from_outcome(&TestOutcome::failed("  "));
            assert_eq!(report.status, ReportStatus::Failed);
            assert_eq!(report.reason, UNKNOWN_FAILURE_REASON);
        }

        #[test]
        fn test_payload_shape() {
            let report = OutcomeReport::from_outcome(&TestOutcome::failed("price \"mismatch\"\n"));
            let payload: serde_json::Value =
                serde_json::from_str(&report.to_payload().unwrap()).unwrap();
            assert_eq!(payload["action"], STATUS_ACTION);
            assert_eq!(payload["arguments"]["status"], "failed");
            assert_eq!(payload["arguments"]["remark"], "price 'mismatch' ");
        }

        #[test]
        fn test_channel_argument_is_prefixed_string() {
            let report = OutcomeReport::from_outcome(&TestOutcome::Passed);
            let argument = report.channel_argument().unwrap();
            let text = argument.as_str().unwrap();
            let json = text.strip_prefix(STATUS_CHANNEL_PREFIX).unwrap();
            let payload: serde_json::Value = serde_json::from_str(json).unwrap();
            assert_eq!(payload["arguments"]["status"], "passed");
        }
    }

    mod reporter_tests {
        use super::*;
        use crate::engine::{BrowserKind, ContextOptions, Engine, LaunchOptions};
        use crate::mock::MockEngine;

        async fn page_on(engine: &MockEngine) -> Box<dyn Page> {
            engine
                .launch(BrowserKind::Chromium, LaunchOptions::new(true))
                .await
                .unwrap()
                .new_context(ContextOptions::default())
                .await
                .unwrap()
                .new_page()
                .await
                .unwrap()
        }

        #[tokio::test(start_paused = true)]
        async fn test_report_waits_grace_period() {
            let engine = MockEngine::new();
            let page = page_on(&engine).await;
            let reporter = RemoteStatusReporter::new(Duration::from_secs(2));

            let start = tokio::time::Instant::now();
            assert!(reporter.report(page.as_ref(), &TestOutcome::failed("boom")).await);
            assert!(start.elapsed() >= Duration::from_secs(2));

            let evaluations = engine.evaluations();
            assert_eq!(evaluations.len(), 1);
            assert_eq!(evaluations[0].function, STATUS_CHANNEL_FUNCTION);
        }

        #[tokio::test(start_paused = true)]
        async fn test_transmission_failure_is_swallowed() {
            let engine = MockEngine::new().with_evaluate_failure();
            let page = page_on(&engine).await;
            let reporter = RemoteStatusReporter::new(Duration::from_secs(2));

            let start = tokio::time::Instant::now();
            assert!(!reporter.report(page.as_ref(), &TestOutcome::Passed).await);
            assert!(start.elapsed() < Duration::from_secs(2));
        }
    }
}
