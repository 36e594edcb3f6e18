//! Storefront CLI library
//!
//! Lifecycle driver for storefront journey suites: resolves the execution
//! environment, registers accounts over HTTP and runs the built-in journeys
//! against a local browser or a remote grid.

#![warn(missing_docs)]

mod commands;
mod config;
mod error;
pub mod journeys;
mod output;
mod runner;

pub use commands::{Cli, ColorArg, Commands, EnvArgs, RegisterArgs, RunArgs, SuiteArgs};
pub use config::{init_logging, load_suite_config, CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use journeys::Journey;
pub use output::Printer;
pub use runner::{run_env, run_register, run_suite, EnvironmentSummary};
