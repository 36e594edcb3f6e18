//! Lifecycle runner.
//!
//! [`Harness::start`] is the before-suite hook, [`Harness::run`] wraps one
//! test body with before-test and after-test, and [`Harness::finish`] is the
//! after-suite hook. After-test always runs, whether the body returned an
//! error or panicked:
//!
//! ```text
//! open context ─► start capture ─► body ─► resolve capture ─► relay status ─► close context
//! ```

use crate::accessibility::{self, AccessibilityAudit};
use crate::capture::{lock_recorder, DiagnosticCapture, EventLevel};
use crate::config::{ProcessEnv, SuiteConfig};
use crate::context::{TestContextFactory, TracedPage};
use crate::engine::{Engine, Page};
use crate::environment::{EnvironmentResolver, ResolvedEnvironment};
use crate::login::LoginPage;
use crate::outcome::TestOutcome;
use crate::report::{Attachment, Reporter, StepEntry, TestResultEntry};
use crate::result::{HarnessError, HarnessResult};
use crate::session::SessionManager;
use crate::status::RemoteStatusReporter;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::{AssertUnwindSafe, Location};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Journal {
    steps: Vec<StepEntry>,
    parameters: Vec<(String, String)>,
}

/// Handle a test body works with
#[derive(Debug, Clone)]
pub struct TestContext {
    name: String,
    page: Arc<TracedPage>,
    base_url: String,
    login_timeout: Duration,
    started: Instant,
    journal: Arc<Mutex<Journal>>,
}

impl TestContext {
    /// Test name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The test's page
    #[must_use]
    pub fn page(&self) -> &dyn Page {
        self.page.as_ref()
    }

    /// Storefront base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL of a route relative to the base URL
    #[must_use]
    pub fn url(&self, route: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            route.trim_start_matches('/')
        )
    }

    /// Login page object on this test's page
    #[must_use]
    pub fn login_page(&self) -> LoginPage<'_> {
        LoginPage::new(self.page(), self.base_url.clone()).with_timeout(self.login_timeout)
    }

    /// Scan the current page for accessibility violations. Findings are
    /// logged and recorded as a report parameter; the test never fails here.
    pub async fn check_accessibility(&self) -> Option<AccessibilityAudit> {
        let audit = accessibility::check_accessibility(self.page()).await?;
        lock_recorder(self.page.recorder()).event(
            "accessibility",
            if audit.violations.is_empty() {
                EventLevel::Info
            } else {
                EventLevel::Warn
            },
            &format!("{} violation(s), score {}", audit.violations.len(), audit.score),
        );
        self.parameter("Accessibility Violations", audit.violations.len().to_string());
        Some(audit)
    }

    /// Open a named step; recorded in the trace and the report
    #[track_caller]
    pub fn step(&self, name: &str) {
        let location = Location::caller();
        {
            let mut recorder = lock_recorder(self.page.recorder());
            recorder.source(name, location);
            recorder.event("step", EventLevel::Info, name);
        }
        tracing::info!(test = %self.name, step = name, "step");
        self.journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .steps
            .push(StepEntry {
                name: name.to_string(),
                offset_ms: self.started.elapsed().as_millis() as u64,
                location: format!("{}:{}", location.file(), location.line()),
            });
    }

    /// Record a report parameter
    pub fn parameter(&self, key: impl Into<String>, value: impl Into<String>) {
        self.journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .parameters
            .push((key.into(), value.into()));
    }
}

/// Suite runner owning the session, the context factory and the report
#[derive(Debug)]
pub struct Harness {
    config: SuiteConfig,
    session: SessionManager,
    factory: TestContextFactory,
    status: RemoteStatusReporter,
    reporter: Reporter,
}

impl Harness {
    /// Resolve the environment, then start the suite
    pub async fn launch(
        config: SuiteConfig,
        explicit_browser: Option<String>,
        env: &ProcessEnv,
        engine: Arc<dyn Engine>,
    ) -> HarnessResult<Self> {
        let environment = EnvironmentResolver::from_config(&config, explicit_browser).resolve(env)?;
        Self::start(config, environment, engine).await
    }

    /// Before-suite: open the suite session
    pub async fn start(
        config: SuiteConfig,
        environment: ResolvedEnvironment,
        engine: Arc<dyn Engine>,
    ) -> HarnessResult<Self> {
        config.validate()?;
        let session = SessionManager::start_suite(&config, environment, engine).await?;
        let factory = TestContextFactory::new(
            config.context_options(),
            DiagnosticCapture::new(config.traces_dir.clone(), config.capture.clone()),
        );
        Ok(Self {
            status: RemoteStatusReporter::new(config.status_grace()),
            reporter: Reporter::new().with_name(config.grid.run_label.clone()),
            config,
            session,
            factory,
        })
    }

    /// Suite session
    #[must_use]
    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Results so far
    #[must_use]
    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    /// Run one test with guaranteed teardown and record its result
    pub async fn run<F, Fut>(&mut self, name: &str, body: F) -> TestOutcome
    where
        F: FnOnce(TestContext) -> Fut,
        Fut: Future<Output = HarnessResult<()>>,
    {
        let started = Instant::now();
        tracing::info!(test = name, "test started");

        let opened = match self.session.browser() {
            Ok(browser) => self.factory.open_test(browser, name).await,
            Err(e) => Err(e),
        };
        let session = match opened {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(test = name, error = %e, "could not open test context");
                let outcome = TestOutcome::failed(e.to_string());
                self.reporter
                    .record(TestResultEntry::from_outcome(name, started.elapsed(), &outcome));
                return outcome;
            }
        };

        let journal = Arc::new(Mutex::new(Journal::default()));
        let context = TestContext {
            name: name.to_string(),
            page: session.page(),
            base_url: self.config.base_url.clone(),
            login_timeout: self.config.login_timeout(),
            started,
            journal: Arc::clone(&journal),
        };

        let result = match AssertUnwindSafe(body(context)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(HarnessError::assertion(panic_message(panic.as_ref()))),
        };
        let outcome = TestOutcome::from_result(&result);

        let status = self.session.relays_status().then_some(&self.status);
        let teardown = session.close(&outcome, status).await;

        let Journal { steps, parameters } = std::mem::take(
            &mut *journal.lock().unwrap_or_else(PoisonError::into_inner),
        );
        let mut entry = TestResultEntry::from_outcome(name, started.elapsed(), &outcome)
            .with_steps(steps)
            .with_parameters(parameters);
        if let Some(png) = teardown.capture.screenshot.clone() {
            entry = entry.with_attachment(Attachment::png("Failure Screenshot", png));
        }
        if let Some(path) = teardown.capture.trace_path() {
            entry = entry.with_attachment(Attachment::trace(path));
        }
        self.reporter.record(entry);

        match outcome.failure_message() {
            None => tracing::info!(test = name, "test passed"),
            Some(message) => tracing::warn!(test = name, error = message, "test failed"),
        }
        outcome
    }

    /// After-suite: close the session and hand back the report
    pub async fn finish(mut self) -> Reporter {
        self.session.end_suite().await;
        tracing::info!(summary = %self.reporter.summary(), "suite finished");
        std::mem::take(&mut self.reporter)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    format!("test panicked: {detail}")
}
