//! App wiring: telephony tools plus the three inbound callbacks.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use concierge_types::settings::parse_settings;
use concierge_types::{
    AppFactory, AppManifest, ConciergeError, HostServices, IntegrationApp, ToolResult,
    WebhookDefinition, WebhookMethod, WebhookRequest, WebhookResponse,
};

use crate::client::TwilioClient;
use crate::settings::TwilioSettings;
use crate::{tools, webhook};

pub const APP_NAME: &str = "twilio";

/// One install of the Twilio app, bound to one account.
pub struct TwilioApp {
    settings: TwilioSettings,
    client: TwilioClient,
    host: HostServices,
}

impl TwilioApp {
    pub fn from_settings(settings: &Value, host: HostServices) -> Result<Self, ConciergeError> {
        let settings: TwilioSettings = parse_settings(settings)?;
        settings.validate()?;
        let client = TwilioClient::new(&settings)?;
        Ok(Self {
            settings,
            client,
            host,
        })
    }
}

#[async_trait]
impl IntegrationApp for TwilioApp {
    async fn call_tool(&self, name: &str, args: Value) -> Result<ToolResult, ConciergeError> {
        debug!(tool = name, "dispatching twilio tool");
        tools::dispatch(&self.client, &self.settings, &self.host, name, args).await
    }

    async fn handle_webhook(
        &self,
        name: &str,
        request: WebhookRequest,
    ) -> Result<WebhookResponse, ConciergeError> {
        match name {
            "sms" => webhook::handle_sms(&self.settings, &self.host, request).await,
            "voice" => webhook::handle_voice(&self.settings, &self.host, request).await,
            "bundle-status" => {
                webhook::handle_bundle_status(&self.settings, &self.host, request).await
            }
            other => Err(ConciergeError::Validation(format!(
                "twilio has no webhook named `{other}`"
            ))),
        }
    }
}

pub struct TwilioFactory;

impl AppFactory for TwilioFactory {
    fn manifest(&self) -> AppManifest {
        AppManifest {
            name: APP_NAME.into(),
            description:
                "Twilio telephony: SMS, inbound voice forwarding, number provisioning, and regulatory compliance."
                    .into(),
            tools: tools::definitions(),
            webhooks: vec![
                WebhookDefinition {
                    name: "sms".into(),
                    description: "Receives inbound SMS for provisioned numbers.".into(),
                    methods: vec![WebhookMethod::Post],
                },
                WebhookDefinition {
                    name: "voice".into(),
                    description: "Answers inbound calls with forwarding TwiML.".into(),
                    methods: vec![WebhookMethod::Post],
                },
                WebhookDefinition {
                    name: "bundle-status".into(),
                    description: "Tracks regulatory bundle review outcomes.".into(),
                    methods: vec![WebhookMethod::Post],
                },
            ],
        }
    }

    fn create(
        &self,
        settings: &Value,
        host: HostServices,
    ) -> Result<Box<dyn IntegrationApp>, ConciergeError> {
        Ok(Box::new(TwilioApp::from_settings(settings, host)?))
    }
}
