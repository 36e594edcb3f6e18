//! Command handlers

use crate::commands::{EnvArgs, RegisterArgs, RunArgs};
use crate::config::{load_suite_config, CliConfig, Verbosity};
use crate::error::{CliError, CliResult};
use crate::journeys::{self, Journey};
use crate::output::Printer;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use storefront_harness::{
    BrowserKind, Engine, EnvironmentResolver, ExecutionTarget, Harness, ProcessEnv,
    RegistrationIdentity, RegistrationReceipt, ResilientRegistrar, ResolvedEnvironment,
    SuiteConfig,
};

/// What `env` prints
#[derive(Debug, Serialize)]
pub struct EnvironmentSummary {
    /// `local` or `remote-grid`
    pub target: &'static str,
    /// Browser launched locally (or used for fallback)
    pub browser: String,
    /// Headless flag
    pub headless: bool,
    /// Whether the bundled CDP engine can start this browser
    pub launchable: bool,
    /// Source that chose the browser
    pub source: String,
    /// CI or local build label
    pub build: String,
    /// Grid user, for remote runs
    pub grid_user: Option<String>,
    /// Grid endpoint, for remote runs
    pub grid_endpoint: Option<String>,
    /// Storefront base URL
    pub base_url: String,
}

impl EnvironmentSummary {
    /// Summarize a resolved environment
    #[must_use]
    pub fn new(config: &SuiteConfig, env: &ResolvedEnvironment) -> Self {
        let remote = env.target.is_remote();
        Self {
            target: match env.target {
                ExecutionTarget::Local => "local",
                ExecutionTarget::RemoteGrid => "remote-grid",
            },
            browser: env.browser.to_string(),
            headless: env.headless,
            launchable: remote || env.browser == BrowserKind::Chromium,
            source: env.source.to_string(),
            build: env.build_label.clone(),
            grid_user: env.credentials.as_ref().map(|c| c.username.clone()),
            grid_endpoint: remote.then(|| config.grid.endpoint.clone()),
            base_url: config.base_url.clone(),
        }
    }
}

/// `env`: resolve the execution environment without starting a browser
pub fn run_env(cli: CliConfig, config_path: &Path, args: &EnvArgs, env: &ProcessEnv) -> CliResult<()> {
    let config = args.suite.apply(load_suite_config(config_path)?);
    let resolved = EnvironmentResolver::from_config(&config, args.suite.browser.clone()).resolve(env)?;
    let summary = EnvironmentSummary::new(&config, &resolved);

    let printer = Printer::new(cli.color.should_color(), cli.verbosity.is_quiet());
    if !summary.launchable {
        tracing::warn!(browser = %summary.browser, "browser cannot be launched by the CDP engine");
        printer.warning(&format!(
            "{} resolves, but `run` can only launch chromium with the CDP engine",
            summary.browser
        ));
    }
    if args.json {
        printer.line(&serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    printer.header("Execution environment");
    printer.field("target", summary.target);
    printer.field("browser", &summary.browser);
    printer.field("headless", &summary.headless.to_string());
    printer.field("source", &summary.source);
    printer.field("build", &summary.build);
    if let Some(user) = &summary.grid_user {
        printer.field("grid user", user);
    }
    if let Some(endpoint) = &summary.grid_endpoint {
        printer.field("endpoint", endpoint);
    }
    printer.field("base url", &summary.base_url);
    Ok(())
}

/// `register`: create one account through the registration form
pub async fn run_register(cli: CliConfig, config_path: &Path, args: &RegisterArgs) -> CliResult<()> {
    let config = args.suite.apply(load_suite_config(config_path)?);
    let mut identity = RegistrationIdentity::generate();
    if let Some(email) = &args.email {
        if !email.contains('@') {
            return Err(CliError::invalid_argument(format!("'{email}' is not an email address")));
        }
        identity.email.clone_from(email);
    }

    let receipt = ResilientRegistrar::http(&config.base_url)?
        .register(&mut identity)
        .await?;

    let printer = Printer::new(cli.color.should_color(), cli.verbosity.is_quiet());
    printer.success(&format!("registered after {} attempt(s)", receipt.attempts));
    for (key, value) in registration_fields(&receipt, &identity, cli.verbosity) {
        printer.field(key, &value);
    }
    Ok(())
}

/// Fields printed after a registration; the password only with `-v`
fn registration_fields(
    receipt: &RegistrationReceipt,
    identity: &RegistrationIdentity,
    verbosity: Verbosity,
) -> Vec<(&'static str, String)> {
    let mut fields = vec![("email", receipt.email.clone())];
    if verbosity.is_verbose() {
        fields.push(("password", identity.password.clone()));
    }
    fields
}

/// `run`: execute the selected journeys in one suite session
pub async fn run_suite(
    cli: CliConfig,
    config_path: &Path,
    args: &RunArgs,
    env: &ProcessEnv,
    engine: Arc<dyn Engine>,
) -> CliResult<()> {
    let printer = Printer::new(cli.color.should_color(), cli.verbosity.is_quiet());
    let selected = journeys::select(args.filter.as_deref());

    if args.list {
        for journey in journeys::all() {
            printer.field(journey.name, journey.description);
        }
        return Ok(());
    }
    if selected.is_empty() {
        return Err(CliError::invalid_argument(format!(
            "no journey matches '{}'",
            args.filter.as_deref().unwrap_or_default()
        )));
    }

    let config = args.apply(load_suite_config(config_path)?);
    let report_dir = config.report_dir.clone();
    let started = Instant::now();

    let mut harness = Harness::launch(config, args.suite.browser.clone(), env, engine).await?;
    printer.header(&format!("Running {} journey(s) ({})", selected.len(), harness.session().origin()));
    run_journeys(&mut harness, &selected, &printer).await;

    let mut reporter = harness.finish().await;
    let json = reporter.write(&report_dir)?;
    tracing::info!(path = %json.display(), "report written");
    printer.summary(reporter.passed_count(), reporter.failed_count(), started.elapsed());

    if reporter.all_passed() {
        Ok(())
    } else {
        Err(CliError::TestsFailed {
            failed: reporter.failed_count(),
            total: reporter.total_count(),
        })
    }
}

async fn run_journeys(harness: &mut Harness, selected: &[Journey], printer: &Printer) {
    for journey in selected {
        let outcome = harness.run(journey.name, journey.run).await;
        match outcome.failure_message() {
            None => printer.success(journey.name),
            Some(reason) => printer.failure(journey.name, reason),
        }
    }
}
