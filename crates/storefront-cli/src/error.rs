//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// At least one journey failed
    #[error("{failed} of {total} journeys failed")]
    TestsFailed {
        /// Failed journeys
        failed: usize,
        /// Journeys run
        total: usize,
    },

    /// Harness error
    #[error(transparent)]
    Harness(#[from] storefront_harness::HarnessError),

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_harness::HarnessError;

    #[test]
    fn test_harness_errors_pass_through() {
        let err: CliError = HarnessError::MissingCredentials {
            missing: "LT_ACCESS_KEY".into(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Cloud credentials (LT_ACCESS_KEY) not found in the environment"
        );
    }

    #[test]
    fn test_failed_count_message() {
        let err = CliError::TestsFailed { failed: 1, total: 2 };
        assert_eq!(err.to_string(), "1 of 2 journeys failed");
    }
}
