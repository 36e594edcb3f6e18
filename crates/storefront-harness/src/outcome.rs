//! Pass/fail outcome of a single test.

use crate::result::HarnessResult;
use serde::{Deserialize, Serialize};

/// Outcome of one test body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TestOutcome {
    /// Body completed without error
    Passed,
    /// Body returned an error or panicked
    Failed {
        /// Failure message
        message: String,
    },
}

impl TestOutcome {
    /// Failed outcome
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Outcome of a body's result
    #[must_use]
    pub fn from_result(result: &HarnessResult<()>) -> Self {
        match result {
            Ok(()) => Self::Passed,
            Err(e) => Self::failed(e.to_string()),
        }
    }

    /// Check if the test passed
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Failure message, if any
    #[must_use]
    pub fn failure_message(&self) -> Option<&str> {
        match self {
            Self::Passed => None,
            Self::Failed { message } => Some(message),
        }
    }
}
