//! Remote grid capability descriptor.

use crate::config::GridConfig;
use crate::environment::ResolvedEnvironment;
use crate::result::{HarnessError, HarnessResult};
use reqwest::Url;
use serde::Serialize;

/// Query parameter carrying the serialized capabilities
pub const CAPABILITIES_PARAM: &str = "capabilities";

/// Capabilities sent to the grid when connecting
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridCapabilities {
    /// Requested browser
    pub browser_name: String,
    /// Requested browser version
    pub browser_version: String,
    /// Requested operating system
    pub platform: String,
    /// Run label shown on the dashboard
    pub name: String,
    /// Build identifier
    pub build: String,
    /// Grid username
    pub user: String,
    /// Grid access key
    pub access_key: String,
}

impl std::fmt::Debug for GridCapabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridCapabilities")
            .field("browser_name", &self.browser_name)
            .field("browser_version", &self.browser_version)
            .field("platform", &self.platform)
            .field("name", &self.name)
            .field("build", &self.build)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl GridCapabilities {
    /// Build from grid settings and the resolved environment
    pub fn new(grid: &GridConfig, env: &ResolvedEnvironment) -> HarnessResult<Self> {
        let credentials = env.credentials.as_ref().ok_or_else(|| {
            HarnessError::MissingCredentials {
                missing: "grid credentials".to_string(),
            }
        })?;
        Ok(Self {
            browser_name: grid.browser_name.clone(),
            browser_version: grid.browser_version.clone(),
            platform: grid.platform.clone(),
            name: grid.run_label.clone(),
            build: env.build_label.clone(),
            user: credentials.username.clone(),
            access_key: credentials.access_key.clone(),
        })
    }

    /// Serialize to the JSON wire format
    pub fn to_json(&self) -> HarnessResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Endpoint URL with the capabilities attached as a query parameter
    pub fn connect_url(&self, endpoint: &str) -> HarnessResult<Url> {
        let mut url = Url::parse(endpoint)
            .map_err(|e| HarnessError::config(format!("invalid grid endpoint {endpoint}: {e}")))?;
        let json = self.to_json()?;
        url.query_pairs_mut().append_pair(CAPABILITIES_PARAM, &json);
        Ok(url)
    }
}
