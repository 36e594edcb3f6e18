//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use storefront_harness::config::{BROWSER_OVERRIDE_VAR, DEFAULT_CONFIG_FILE};
use storefront_harness::SuiteConfig;

/// Storefront: browser journey suites for the storefront
#[derive(Parser, Debug)]
#[command(name = "storefront")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (warnings and errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Suite configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE, global = true)]
    pub config: PathBuf,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve and print the execution environment
    Env(EnvArgs),

    /// Register a fresh account through the storefront's registration form
    Register(RegisterArgs),

    /// Run the built-in journey suite
    Run(RunArgs),
}

/// Options shared by every command that touches the suite configuration
#[derive(Args, Debug, Clone, Default)]
pub struct SuiteArgs {
    /// Browser: chromium, firefox, webkit or cloud (CDP engine: chromium only)
    ///
    /// firefox and webkit resolve, but `run` aborts with an unsupported-browser error.
    #[arg(short, long, env = BROWSER_OVERRIDE_VAR)]
    pub browser: Option<String>,

    /// Run the local browser headless
    #[arg(long)]
    pub headless: bool,

    /// Storefront base URL
    #[arg(long)]
    pub base_url: Option<String>,
}

impl SuiteArgs {
    /// Apply flag overrides on top of the file configuration
    #[must_use]
    pub fn apply(&self, mut config: SuiteConfig) -> SuiteConfig {
        if self.headless {
            config.headless = true;
        }
        if let Some(url) = &self.base_url {
            config.base_url.clone_from(url);
        }
        config
    }
}

/// Arguments for the env command
#[derive(Parser, Debug)]
pub struct EnvArgs {
    /// Suite options
    #[command(flatten)]
    pub suite: SuiteArgs,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the register command
#[derive(Parser, Debug)]
pub struct RegisterArgs {
    /// Suite options
    #[command(flatten)]
    pub suite: SuiteArgs,

    /// Email to register instead of a generated one
    #[arg(long)]
    pub email: Option<String>,
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Suite options
    #[command(flatten)]
    pub suite: SuiteArgs,

    /// Only run journeys whose name contains this text
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Trace archive directory
    #[arg(long)]
    pub traces_dir: Option<PathBuf>,

    /// Report output directory
    #[arg(long)]
    pub report_dir: Option<PathBuf>,

    /// Launch Chromium without its sandbox
    #[arg(long)]
    pub no_sandbox: bool,

    /// List journeys and exit
    #[arg(long)]
    pub list: bool,
}

impl RunArgs {
    /// Apply flag overrides on top of the file configuration
    #[must_use]
    pub fn apply(&self, config: SuiteConfig) -> SuiteConfig {
        let mut config = self.suite.apply(config);
        if let Some(dir) = &self.traces_dir {
            config.traces_dir.clone_from(dir);
        }
        if let Some(dir) = &self.report_dir {
            config.report_dir.clone_from(dir);
        }
        config
    }
}

/// Color argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorArg {
    /// Color when stdout is a terminal
    #[default]
    Auto,
    /// Always color
    Always,
    /// Never color
    Never,
}
