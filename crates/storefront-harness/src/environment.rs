//! Execution target resolution.
//!
//! The browser choice is taken from the first source that has a value:
//! explicit override, then persisted configuration, then the built-in default.
//! Choosing the remote grid requires both grid credentials in the process
//! environment; their absence aborts the suite before any session exists.

use crate::config::{
    ProcessEnv, SuiteConfig, BUILD_NUMBER_VAR, GRID_ACCESS_KEY_VAR, GRID_USERNAME_VAR,
};
use crate::engine::BrowserKind;
use crate::result::{HarnessError, HarnessResult};
use std::fmt;

/// Browser value that selects the remote grid
pub const REMOTE_GRID_KEYWORD: &str = "cloud";

/// Where the browser runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionTarget {
    /// Locally launched browser
    Local,
    /// Third-party cloud grid
    RemoteGrid,
}

impl ExecutionTarget {
    /// Check if remote
    #[must_use]
    pub const fn is_remote(self) -> bool {
        matches!(self, Self::RemoteGrid)
    }
}

/// Which source supplied the browser choice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Run-time override (CLI flag or `BROWSER`)
    Override,
    /// Persisted configuration file
    Persisted,
    /// Hard default
    Default,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Override => "override",
            Self::Persisted => "config",
            Self::Default => "default",
        })
    }
}

/// A candidate browser value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserSource {
    /// Source kind
    pub kind: SourceKind,
    /// Value, if the source has one
    pub value: Option<String>,
}

/// Remote grid credentials
#[derive(Clone, PartialEq, Eq)]
pub struct GridCredentials {
    /// Grid username
    pub username: String,
    /// Grid access key
    pub access_key: String,
}

impl fmt::Debug for GridCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridCredentials")
            .field("username", &self.username)
            .field("access_key", &"<redacted>")
            .finish()
    }
}

/// Fully resolved environment for one suite run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEnvironment {
    /// Local or remote execution
    pub target: ExecutionTarget,
    /// Browser to launch locally (also the fallback engine for remote runs)
    pub browser: BrowserKind,
    /// Headless flag for local launches
    pub headless: bool,
    /// Grid credentials, present iff the target is remote
    pub credentials: Option<GridCredentials>,
    /// Label of the CI build, or `Local Build`
    pub build_label: String,
    /// Which source won
    pub source: SourceKind,
}

/// Resolves the execution target from an ordered source chain
#[derive(Debug, Clone, Default)]
pub struct EnvironmentResolver {
    sources: Vec<BrowserSource>,
    headless: bool,
}

impl EnvironmentResolver {
    /// Create a resolver with no sources (resolves to the default)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver seeded from a config file and an optional explicit override
    #[must_use]
    pub fn from_config(config: &SuiteConfig, explicit: Option<String>) -> Self {
        Self::new()
            .with_override(explicit)
            .with_persisted(config.browser.clone())
            .with_headless(config.headless)
    }

    /// Append the explicit run-time override source
    #[must_use]
    pub fn with_override(mut self, value: Option<String>) -> Self {
        self.sources.push(BrowserSource {
            kind: SourceKind::Override,
            value,
        });
        self
    }

    /// Append the persisted configuration source
    #[must_use]
    pub fn with_persisted(mut self, value: Option<String>) -> Self {
        self.sources.push(BrowserSource {
            kind: SourceKind::Persisted,
            value,
        });
        self
    }

    /// Set the headless flag
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// First non-empty source value, or the Chromium default
    #[must_use]
    pub fn choice(&self) -> (SourceKind, String) {
        self.sources
            .iter()
            .find_map(|s| {
                s.value
                    .as_deref()
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(|v| (s.kind, v.to_string()))
            })
            .unwrap_or_else(|| (SourceKind::Default, BrowserKind::Chromium.name().to_string()))
    }

    /// Resolve against the given process environment
    pub fn resolve(&self, env: &ProcessEnv) -> HarnessResult<ResolvedEnvironment> {
        let (source, choice) = self.choice();
        let build_label = build_label(env);

        if choice.eq_ignore_ascii_case(REMOTE_GRID_KEYWORD) {
            let credentials = grid_credentials(env)?;
            tracing::info!(%source, build = %build_label, "execution target: remote grid");
            return Ok(ResolvedEnvironment {
                target: ExecutionTarget::RemoteGrid,
                browser: BrowserKind::Chromium,
                headless: self.headless,
                credentials: Some(credentials),
                build_label,
                source,
            });
        }

        let browser: BrowserKind = choice.parse()?;
        tracing::info!(%source, %browser, headless = self.headless, "execution target: local");
        Ok(ResolvedEnvironment {
            target: ExecutionTarget::Local,
            browser,
            headless: self.headless,
            credentials: None,
            build_label,
            source,
        })
    }
}

fn grid_credentials(env: &ProcessEnv) -> HarnessResult<GridCredentials> {
    let username = env.get(GRID_USERNAME_VAR);
    let access_key = env.get(GRID_ACCESS_KEY_VAR);
    match (username, access_key) {
        (Some(username), Some(access_key)) => Ok(GridCredentials {
            username: username.to_string(),
            access_key: access_key.to_string(),
        }),
        _ => {
            let missing: Vec<&str> = [
                (GRID_USERNAME_VAR, username.is_none()),
                (GRID_ACCESS_KEY_VAR, access_key.is_none()),
            ]
            .iter()
            .filter(|(_, absent)| *absent)
            .map(|(name, _)| *name)
            .collect();
            Err(HarnessError::MissingCredentials {
                missing: missing.join(", "),
            })
        }
    }
}

fn build_label(env: &ProcessEnv) -> String {
    env.get(BUILD_NUMBER_VAR).map_or_else(
        || "Local Build".to_string(),
        |number| format!("CI Build {number}"),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn cloud_env() -> ProcessEnv {
        ProcessEnv::new()
            .with_var(GRID_USERNAME_VAR, "shopper")
            .with_var(GRID_ACCESS_KEY_VAR, "s3cret")
    }

    mod source_chain_tests {
        use super::*;

        #[test]
        fn test_default_is_local_chromium() {
            let env = EnvironmentResolver::new().resolve(&ProcessEnv::new()).unwrap();
            assert_eq!(env.target, ExecutionTarget::Local);
            assert_eq!(env.browser, BrowserKind::Chromium);
            assert_eq!(env.source, SourceKind::Default);
            assert!(env.credentials.is_none());
        }

        #[test]
        fn test_override_beats_persisted() {
            let resolver = EnvironmentResolver::new()
                .with_override(Some("webkit".into()))
                .with_persisted(Some("firefox".into()));
            let env = resolver.resolve(&ProcessEnv::new()).unwrap();
            assert_eq!(env.browser, BrowserKind::Webkit);
            assert_eq!(env.source, SourceKind::Override);
        }

        #[test]
        fn test_blank_override_falls_through() {
            let resolver = EnvironmentResolver::new()
                .with_override(Some("  ".into()))
                .with_persisted(Some("Firefox".into()));
            let env = resolver.resolve(&ProcessEnv::new()).unwrap();
            assert_eq!(env.browser, BrowserKind::Firefox);
            assert_eq!(env.source, SourceKind::Persisted);
        }

        #[test]
        fn test_from_config() {
            let config = SuiteConfig::new().with_browser("firefox").with_headless(true);
            let env = EnvironmentResolver::from_config(&config, None)
                .resolve(&ProcessEnv::new())
                .unwrap();
            assert_eq!(env.browser, BrowserKind::Firefox);
            assert!(env.headless);
        }

        #[test]
        fn test_invalid_name_is_fatal() {
            let err = EnvironmentResolver::new()
                .with_override(Some("lynx".into()))
                .resolve(&ProcessEnv::new())
                .unwrap_err();
            assert!(matches!(err, HarnessError::InvalidBrowser { .. }));
            assert!(err.is_suite_fatal());
        }
    }

    mod remote_tests {
        use super::*;

        #[test]
        fn test_cloud_with_credentials() {
            let env = EnvironmentResolver::new()
                .with_override(Some("CLOUD".into()))
                .resolve(&cloud_env())
                .unwrap();
            assert_eq!(env.target, ExecutionTarget::RemoteGrid);
            let credentials = env.credentials.unwrap();
            assert_eq!(credentials.username, "shopper");
            assert_eq!(credentials.access_key, "s3cret");
        }

        #[test]
        fn test_cloud_without_credentials_is_fatal() {
            let err = EnvironmentResolver::new()
                .with_persisted(Some("cloud".into()))
                .resolve(&ProcessEnv::new())
                .unwrap_err();
            match err {
                HarnessError::MissingCredentials { missing } => {
                    assert_eq!(missing, "LT_USERNAME, LT_ACCESS_KEY");
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        #[test]
        fn test_cloud_with_one_credential_is_fatal() {
            let env = ProcessEnv::new().with_var(GRID_USERNAME_VAR, "shopper");
            let err = EnvironmentResolver::new()
                .with_persisted(Some("cloud".into()))
                .resolve(&env)
                .unwrap_err();
            assert!(
                matches!(err, HarnessError::MissingCredentials { ref missing } if missing == "LT_ACCESS_KEY")
            );
        }

        #[test]
        fn test_credentials_debug_is_redacted() {
            let credentials = GridCredentials {
                username: "shopper".into(),
                access_key: "s3cret".into(),
            };
            let debug = format!("{credentials:?}");
            assert!(debug.contains("shopper"));
            assert!(!debug.contains("s3cret"));
        }
    }

    mod build_label_tests {
        use super::*;

        #[test]
        fn test_ci_build_label() {
            let env = cloud_env().with_var(BUILD_NUMBER_VAR, "481");
            let resolved = EnvironmentResolver::new()
                .with_override(Some("cloud".into()))
                .resolve(&env)
                .unwrap();
            assert_eq!(resolved.build_label, "CI Build 481");
        }

        #[test]
        fn test_local_build_label() {
            let resolved = EnvironmentResolver::new().resolve(&ProcessEnv::new()).unwrap();
            assert_eq!(resolved.build_label, "Local Build");
        }
    }
}
