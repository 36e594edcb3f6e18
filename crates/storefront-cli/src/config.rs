//! CLI configuration and logging setup

use crate::commands::{Cli, ColorArg};
use crate::error::{CliError, CliResult};
use std::path::Path;
use storefront_harness::SuiteConfig;
use tracing_subscriber::EnvFilter;

/// CLI verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Warnings and errors only
    Quiet,
    /// Lifecycle transitions
    #[default]
    Normal,
    /// Page actions and retries
    Verbose,
    /// Everything
    Debug,
}

impl Verbosity {
    /// Derive from the `-q` / `-v` flags
    #[must_use]
    pub const fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Debug,
        }
    }

    /// Check if quiet mode
    #[must_use]
    pub const fn is_quiet(self) -> bool {
        matches!(self, Self::Quiet)
    }

    /// Check if `-v` or more was given
    #[must_use]
    pub const fn is_verbose(self) -> bool {
        matches!(self, Self::Verbose | Self::Debug)
    }

    /// Default log directive when `RUST_LOG` is unset
    #[must_use]
    pub const fn directive(self) -> &'static str {
        match self {
            Self::Quiet => "warn",
            Self::Normal => "info",
            Self::Verbose => "debug",
            Self::Debug => "trace",
        }
    }
}

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorChoice {
    /// Always use colors
    Always,
    /// Use colors when output is a terminal
    #[default]
    Auto,
    /// Never use colors
    Never,
}

impl ColorChoice {
    /// Should use colors based on output detection
    #[must_use]
    pub fn should_color(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => std::io::IsTerminal::is_terminal(&std::io::stdout()),
        }
    }
}

impl From<ColorArg> for ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

/// CLI configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct CliConfig {
    /// Verbosity level
    pub verbosity: Verbosity,
    /// Color output choice
    pub color: ColorChoice,
}

impl CliConfig {
    /// Build from parsed arguments
    #[must_use]
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            verbosity: Verbosity::from_flags(cli.quiet, cli.verbose),
            color: cli.color.into(),
        }
    }
}

/// Install the global `tracing` subscriber on stderr.
///
/// `RUST_LOG` wins over the verbosity flags when it is set.
pub fn init_logging(config: CliConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.verbosity.directive()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(config.color.should_color())
        .with_target(false)
        .try_init();
}

/// Load the suite configuration file; a missing file yields defaults
pub fn load_suite_config(path: &Path) -> CliResult<SuiteConfig> {
    SuiteConfig::load_or_default(path)
        .map_err(|e| CliError::config(format!("{}: {e}", path.display())))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod verbosity_tests {
        use super::*;

        #[test]
        fn test_quiet_wins_over_verbose() {
            assert_eq!(Verbosity::from_flags(true, 3), Verbosity::Quiet);
        }

        #[test]
        fn test_is_verbose() {
            assert!(!Verbosity::from_flags(false, 0).is_verbose());
            assert!(Verbosity::from_flags(false, 1).is_verbose());
            assert!(Verbosity::from_flags(false, 2).is_verbose());
            assert!(!Verbosity::from_flags(true, 2).is_verbose());
        }

        #[test]
        fn test_directives() {
            assert_eq!(Verbosity::from_flags(false, 0).directive(), "info");
            assert_eq!(Verbosity::from_flags(false, 1).directive(), "debug");
            assert_eq!(Verbosity::from_flags(true, 0).directive(), "warn");
        }
    }

    mod color_tests {
        use super::*;

        #[test]
        fn test_explicit_choices() {
            assert!(ColorChoice::from(ColorArg::Always).should_color());
            assert!(!ColorChoice::from(ColorArg::Never).should_color());
        }
    }

    mod load_tests {
        use super::*;

        #[test]
        fn test_missing_file_yields_defaults() {
            let dir = tempfile::tempdir().unwrap();
            let config = load_suite_config(&dir.path().join("absent.yaml")).unwrap();
            assert_eq!(config, SuiteConfig::default());
        }

        #[test]
        fn test_invalid_file_names_the_path() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("storefront.yaml");
            std::fs::write(&path, "base_url: ''\n").unwrap();
            let err = load_suite_config(&path).unwrap_err();
            assert!(err.to_string().contains("storefront.yaml"));
        }
    }
}
