//! Static client settings.
//!
//! [`ClientConfig`] is plain data: it can be built in code or deserialized
//! by surrounding tooling. Building a
//! [`ManagementClient`](crate::client::ManagementClient) never rejects it:
//! header values are checked per request, the base URL when a scoped URL is
//! composed.

use crate::error::{ManagementError, ManagementResult};
use serde::{Deserialize, Serialize};
use url::Url;

use std::time::Duration;

/// Token endpoint template. `{tenant}` is replaced by [`ClientConfig::token_url_for`].
pub const DEFAULT_AZURE_TOKEN_URL: &str =
    "https://login.microsoftonline.com/{tenant}.onmicrosoft.com/oauth2/token";

/// Base URL of the Azure Resource Manager API.
pub const DEFAULT_AZURE_MANAGEMENT_URL: &str = "https://management.azure.com";

/// User agent sent with every request unless overridden.
pub const DEFAULT_USER_AGENT: &str = "azure-rm-sdk-for-rust";

/// Default connection timeout (10 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default read/response timeout (60 seconds).
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Endpoint and header settings for a [`ManagementClient`](crate::client::ManagementClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub token_url: String,
    pub management_base_url: String,
    pub user_agent: String,
    /// Sent as `x-ms-version` when set.
    pub api_version: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            token_url: DEFAULT_AZURE_TOKEN_URL.to_string(),
            management_base_url: DEFAULT_AZURE_MANAGEMENT_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            api_version: None,
        }
    }
}

impl ClientConfig {
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn with_management_base_url(mut self, url: impl Into<String>) -> Self {
        self.management_base_url = url.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Render the token URL for a tenant.
    pub fn token_url_for(&self, tenant: &str) -> String {
        self.token_url.replace("{tenant}", tenant)
    }

    /// Parse the management base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementError::Configuration`] when the URL is empty or
    /// does not parse.
    pub(crate) fn management_url(&self) -> ManagementResult<Url> {
        Url::parse(&self.management_base_url).map_err(|e| {
            ManagementError::Configuration(format!(
                "invalid management base URL {:?}: {e}",
                self.management_base_url
            ))
        })
    }
}
