//! Per-install settings for a Meta business account connection.

use serde::Deserialize;

use concierge_client::{AuthScheme, VendorCredential};
use concierge_types::settings::require_non_empty;
use concierge_types::ConciergeError;

fn default_graph_base() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_graph_version() -> String {
    "v19.0".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetaSettings {
    /// System-user access token captured during connect.
    pub access_token: String,
    #[serde(default = "default_graph_base")]
    pub graph_base_url: String,
    /// Graph version segment for every call; individual calls can still
    /// pin a different one.
    #[serde(default = "default_graph_version")]
    pub graph_version: String,
    /// Token echoed back during webhook subscription handshakes.
    /// Required once the events webhook is wired up.
    #[serde(default)]
    pub verify_token: Option<String>,
    /// App secret for event signature checks. Required once the events
    /// webhook is wired up.
    #[serde(default)]
    pub app_secret: Option<String>,
}

impl MetaSettings {
    pub fn validate(&self) -> Result<(), ConciergeError> {
        require_non_empty("access_token", &self.access_token)?;
        require_non_empty("graph_base_url", &self.graph_base_url)?;
        require_non_empty("graph_version", &self.graph_version)?;
        Ok(())
    }

    pub fn credential(&self) -> VendorCredential {
        VendorCredential::new(
            &self.graph_base_url,
            AuthScheme::QueryToken {
                param: "access_token".into(),
                token: self.access_token.clone(),
            },
        )
    }
}
