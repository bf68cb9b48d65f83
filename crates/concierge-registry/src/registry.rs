//! The app directory.
//!
//! Maps app names to factories and dispatches tool calls and webhook
//! deliveries. Apps are constructed per invocation from the install
//! settings the host passes in; the registry itself holds no install
//! state. See `docs/architecture.md` section 7.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use concierge_types::{
    AppFactory, AppManifest, ConciergeError, HostServices, IntegrationApp, ToolResult,
    WebhookRequest, WebhookResponse,
};

/// Directory of every installable app, keyed by app name.
pub struct AppRegistry {
    factories: HashMap<String, Arc<dyn AppFactory>>,
}

impl AppRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// The registry with all three vendor apps wired in.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(concierge_petbooqz::PetbooqzFactory));
        registry.register(Arc::new(concierge_meta::MetaFactory));
        registry.register(Arc::new(concierge_twilio::TwilioFactory));
        registry
    }

    /// Registers a factory under its manifest name.
    pub fn register(&mut self, factory: Arc<dyn AppFactory>) {
        let name = factory.manifest().name;
        if self.factories.insert(name.clone(), factory).is_some() {
            warn!(app = %name, "replacing an already registered app");
        } else {
            info!(app = %name, "registered app");
        }
    }

    /// App names in stable order.
    pub fn app_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Every app's manifest, ordered by app name.
    pub fn manifests(&self) -> Vec<AppManifest> {
        let mut manifests: Vec<AppManifest> =
            self.factories.values().map(|f| f.manifest()).collect();
        manifests.sort_by(|a, b| a.name.cmp(&b.name));
        manifests
    }

    pub fn manifest(&self, app: &str) -> Option<AppManifest> {
        self.factories.get(app).map(|f| f.manifest())
    }

    /// Dispatches one tool invocation to the named app.
    pub async fn call_tool(
        &self,
        app: &str,
        tool: &str,
        settings: &Value,
        host: HostServices,
        args: Value,
    ) -> Result<ToolResult, ConciergeError> {
        debug!(app, tool, "dispatching tool call");
        self.create(app, settings, host)?.call_tool(tool, args).await
    }

    /// Dispatches one webhook delivery to the named app. A rejected
    /// signature comes back as a 401 response rather than an error, so
    /// the host relays it to the vendor as-is.
    pub async fn handle_webhook(
        &self,
        app: &str,
        webhook: &str,
        settings: &Value,
        host: HostServices,
        request: WebhookRequest,
    ) -> Result<WebhookResponse, ConciergeError> {
        debug!(app, webhook, "dispatching webhook delivery");
        let outcome = self
            .create(app, settings, host)?
            .handle_webhook(webhook, request)
            .await;
        match outcome {
            Err(ConciergeError::SignatureInvalid(reason)) => {
                warn!(app, webhook, reason = %reason, "webhook signature rejected");
                Ok(WebhookResponse::unauthorized(reason))
            }
            other => other,
        }
    }

    fn create(
        &self,
        app: &str,
        settings: &Value,
        host: HostServices,
    ) -> Result<Box<dyn IntegrationApp>, ConciergeError> {
        let factory = self
            .factories
            .get(app)
            .ok_or_else(|| ConciergeError::Validation(format!("no app named `{app}`")))?;
        factory.create(settings, host)
    }
}

impl Default for AppRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
