//! Static app manifests: the declarative surface an app exposes to the
//! host runtime (tools plus named webhooks).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::WebhookMethod;

/// Description of a single tool an app exposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Dotted tool name, unique within the app ("calendar.reserve").
    pub name: String,
    pub description: String,
    /// JSON schema for the tool's arguments.
    pub input_schema: Value,
}

/// Description of a named webhook endpoint an app handles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookDefinition {
    /// Hook name, unique within the app ("events", "sms").
    pub name: String,
    pub description: String,
    /// Methods the vendor delivers on. Subscription handshakes add GET.
    pub methods: Vec<WebhookMethod>,
}

/// Everything the host needs to know about an app without instantiating
/// it: identity, tool inventory, webhook inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppManifest {
    /// App name, unique across the registry ("petbooqz").
    pub name: String,
    pub description: String,
    pub tools: Vec<ToolDefinition>,
    pub webhooks: Vec<WebhookDefinition>,
}

impl AppManifest {
    pub fn tool(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn webhook(&self, name: &str) -> Option<&WebhookDefinition> {
        self.webhooks.iter().find(|w| w.name == name)
    }
}
