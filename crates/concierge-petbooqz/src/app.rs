//! App wiring: install settings in, tool dispatch out.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use concierge_types::settings::parse_settings;
use concierge_types::{
    AppFactory, AppManifest, ConciergeError, HostServices, IntegrationApp, ToolResult,
    WebhookRequest, WebhookResponse,
};

use crate::booking::{BookingCoordinator, BookingOptions};
use crate::client::PetbooqzClient;
use crate::settings::PetbooqzSettings;
use crate::tools;

pub const APP_NAME: &str = "petbooqz";

/// One install of the Petbooqz app, bound to one practice server.
pub struct PetbooqzApp {
    coordinator: BookingCoordinator,
}

impl PetbooqzApp {
    pub fn from_settings(settings: &Value) -> Result<Self, ConciergeError> {
        let settings: PetbooqzSettings = parse_settings(settings)?;
        settings.validate()?;
        let client = PetbooqzClient::new(&settings)?;
        let options = BookingOptions {
            release_on_confirm_failure: settings.release_on_confirm_failure,
        };
        Ok(Self {
            coordinator: BookingCoordinator::new(client, options),
        })
    }
}

#[async_trait]
impl IntegrationApp for PetbooqzApp {
    async fn call_tool(&self, name: &str, args: Value) -> Result<ToolResult, ConciergeError> {
        debug!(tool = name, "dispatching petbooqz tool");
        tools::dispatch(&self.coordinator, name, args).await
    }

    async fn handle_webhook(
        &self,
        name: &str,
        _request: WebhookRequest,
    ) -> Result<WebhookResponse, ConciergeError> {
        Err(ConciergeError::Validation(format!(
            "petbooqz has no webhook named `{name}`"
        )))
    }
}

pub struct PetbooqzFactory;

impl AppFactory for PetbooqzFactory {
    fn manifest(&self) -> AppManifest {
        AppManifest {
            name: APP_NAME.into(),
            description:
                "Veterinary practice management: appointment booking against the practice calendar."
                    .into(),
            tools: tools::definitions(),
            webhooks: Vec::new(),
        }
    }

    fn create(
        &self,
        settings: &Value,
        _host: HostServices,
    ) -> Result<Box<dyn IntegrationApp>, ConciergeError> {
        Ok(Box::new(PetbooqzApp::from_settings(settings)?))
    }
}
