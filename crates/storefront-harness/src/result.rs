//! Result and error types for the storefront harness.

use crate::cart::Money;
use thiserror::Error;

/// Result type for harness operations
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Errors that can occur while running storefront journeys
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Browser name did not match a known engine
    #[error("Invalid browser name '{name}': expected chromium, firefox, webkit or cloud")]
    InvalidBrowser {
        /// Name as configured
        name: String,
    },

    /// Remote grid selected without credentials in the environment
    #[error("Cloud credentials ({missing}) not found in the environment")]
    MissingCredentials {
        /// Comma separated list of the missing variables
        missing: String,
    },

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunchError {
        /// Error message
        message: String,
    },

    /// Engine cannot drive the requested browser kind
    #[error("Browser '{browser}' is not supported by the {engine} engine")]
    UnsupportedBrowser {
        /// Requested browser
        browser: String,
        /// Engine name
        engine: String,
    },

    /// Connection to a remote browser failed
    #[error("Failed to connect to browser: {message}")]
    ConnectionFailed {
        /// Error message
        message: String,
    },

    /// Remote connect did not complete in time
    #[error("Remote grid connection timed out after {secs}s")]
    ConnectTimeout {
        /// Timeout in seconds
        secs: u64,
    },

    /// Suite-scoped browser used after teardown began
    #[error("Suite session is closed")]
    SuiteClosed,

    /// Context or page error
    #[error("Page error: {message}")]
    PageError {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    NavigationError {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// In-page evaluation failed
    #[error("Evaluation failed: {message}")]
    EvaluationError {
        /// Error message
        message: String,
    },

    /// Operation timed out
    #[error("Timed out after {ms}ms waiting for {waiting_for}")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
        /// What was awaited
        waiting_for: String,
    },

    /// Application rendered an error banner
    #[error("Login failed with application error: {message}")]
    ApplicationError {
        /// Extracted banner text
        message: String,
    },

    /// Cart line total disagrees with unit price times quantity
    #[error("Price calculation failed for {product}! Expected: {expected} Actual: {actual}")]
    PriceMismatch {
        /// Product of the cart line
        product: String,
        /// Unit price times quantity
        expected: Money,
        /// Displayed line total
        actual: Money,
    },

    /// Assertion failed
    #[error("Assertion failed: {message}")]
    AssertionFailed {
        /// Error message
        message: String,
    },

    /// Screenshot error
    #[error("Screenshot failed: {message}")]
    ScreenshotError {
        /// Error message
        message: String,
    },

    /// Registration redirected somewhere other than the success route
    #[error("Registration redirected unexpectedly to: {location}")]
    UnexpectedRedirect {
        /// Location header value (or `<none>`)
        location: String,
    },

    /// Registration endpoint answered with a non-200, non-redirect status
    #[error("Registration API error {status}\nBody: {body}")]
    RegistrationHttp {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// Email collision persisted across every attempt
    #[error("Failed to register user after {attempts} attempts: email collision ({email})")]
    RegistrationExhausted {
        /// Attempts made
        attempts: u32,
        /// Last email tried
        email: String,
    },

    /// Registration form stayed on the page without a known marker
    #[error("Failed to register user: response implies validation error\nBody: {body}")]
    RegistrationRejected {
        /// Response body
        body: String,
    },

    /// Trace archive could not be written
    #[error("Trace archive error: {message}")]
    Archive {
        /// Error message
        message: String,
    },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl HarnessError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a page error
    #[must_use]
    pub fn page(message: impl Into<String>) -> Self {
        Self::PageError {
            message: message.into(),
        }
    }

    /// Create an assertion failure
    #[must_use]
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::AssertionFailed {
            message: message.into(),
        }
    }

    /// Whether the error aborts the suite before any test runs
    #[must_use]
    pub const fn is_suite_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidBrowser { .. }
                | Self::MissingCredentials { .. }
                | Self::Config { .. }
                | Self::UnsupportedBrowser { .. }
                | Self::BrowserLaunchError { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suite_fatal_classification() {
        assert!(HarnessError::InvalidBrowser {
            name: "opera".into()
        }
        .is_suite_fatal());
        assert!(HarnessError::MissingCredentials {
            missing: "LT_USERNAME".into()
        }
        .is_suite_fatal());
        assert!(!HarnessError::ConnectTimeout { secs: 30 }.is_suite_fatal());
        assert!(!HarnessError::SuiteClosed.is_suite_fatal());
    }

    #[test]
    fn test_registration_messages_are_distinct() {
        let redirect = HarnessError::UnexpectedRedirect {
            location: "/login".into(),
        }
        .to_string();
        let http = HarnessError::RegistrationHttp {
            status: 500,
            body: "boom".into(),
        }
        .to_string();
        let exhausted = HarnessError::RegistrationExhausted {
            attempts: 2,
            email: "a@b.c".into(),
        }
        .to_string();
        let rejected = HarnessError::RegistrationRejected {
            body: "nope".into(),
        }
        .to_string();

        assert!(redirect.contains("redirected unexpectedly"));
        assert!(http.contains("500") && http.contains("boom"));
        assert!(exhausted.contains("after 2 attempts"));
        assert!(rejected.contains("validation error"));
    }

    #[test]
    fn test_application_error_message() {
        let err = HarnessError::ApplicationError {
            message: "Warning: No match".into(),
        };
        assert_eq!(
            err.to_string(),
            "Login failed with application error: Warning: No match"
        );
    }
}
