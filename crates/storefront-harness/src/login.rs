//! Storefront login page.

use crate::engine::Page;
use crate::race::{OutcomeRace, SelectorSignal};
use crate::result::HarnessResult;
use std::time::Duration;

/// Login route, relative to the storefront base URL
pub const LOGIN_ROUTE: &str = "index.php?route=account/login";

/// Email input
pub const EMAIL_INPUT: &str = "#input-email";

/// Password input
pub const PASSWORD_INPUT: &str = "#input-password";

/// Submit button
pub const LOGIN_BUTTON: &str = "input[type='submit'][value='Login']";

/// Application error banner
pub const ERROR_BANNER: &str = ".alert-danger";

/// Heading shown after a successful login
pub const ACCOUNT_HEADING: &str = "h2";

/// Text of [`ACCOUNT_HEADING`] after a successful login
pub const ACCOUNT_HEADING_TEXT: &str = "My Account";

/// Page object for the account login form
#[derive(Debug)]
pub struct LoginPage<'a> {
    page: &'a dyn Page,
    base_url: String,
    race: OutcomeRace,
}

impl<'a> LoginPage<'a> {
    /// Login page on `page` for the storefront at `base_url`
    #[must_use]
    pub fn new(page: &'a dyn Page, base_url: impl Into<String>) -> Self {
        Self {
            page,
            base_url: base_url.into(),
            race: OutcomeRace::new(),
        }
    }

    /// Bound for the outcome race
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.race = self.race.with_timeout(timeout);
        self
    }

    /// Absolute URL of the login form
    #[must_use]
    pub fn url(&self) -> String {
        format!("{}/{LOGIN_ROUTE}", self.base_url.trim_end_matches('/'))
    }

    /// Navigate to the login form
    pub async fn open(&self) -> HarnessResult<()> {
        self.page.goto(&self.url()).await
    }

    /// Fill the form, submit, and race the account heading against the
    /// error banner. The banner wins if both are visible.
    pub async fn login(&self, email: &str, password: &str) -> HarnessResult<()> {
        self.page.fill(EMAIL_INPUT, email).await?;
        self.page.fill(PASSWORD_INPUT, password).await?;
        self.page.click(LOGIN_BUTTON).await?;

        let success = SelectorSignal::new(self.page, ACCOUNT_HEADING).with_text(ACCOUNT_HEADING_TEXT);
        let error = SelectorSignal::new(self.page, ERROR_BANNER);
        self.race.run(&success, &error).await?;
        tracing::info!(email, "logged in");
        Ok(())
    }
}
