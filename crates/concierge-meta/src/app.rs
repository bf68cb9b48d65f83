//! App wiring: Graph tools plus the inbound events webhook.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use concierge_types::settings::parse_settings;
use concierge_types::{
    AppFactory, AppManifest, ConciergeError, HostServices, IntegrationApp, ToolResult,
    WebhookDefinition, WebhookMethod, WebhookRequest, WebhookResponse,
};

use crate::client::GraphClient;
use crate::settings::MetaSettings;
use crate::{tools, webhook};

pub const APP_NAME: &str = "meta";

/// One install of the Meta app, bound to one business's Graph
/// connection.
pub struct MetaApp {
    settings: MetaSettings,
    client: GraphClient,
    host: HostServices,
}

impl MetaApp {
    pub fn from_settings(settings: &Value, host: HostServices) -> Result<Self, ConciergeError> {
        let settings: MetaSettings = parse_settings(settings)?;
        settings.validate()?;
        let client = GraphClient::new(&settings)?;
        Ok(Self {
            settings,
            client,
            host,
        })
    }
}

#[async_trait]
impl IntegrationApp for MetaApp {
    async fn call_tool(&self, name: &str, args: Value) -> Result<ToolResult, ConciergeError> {
        debug!(tool = name, "dispatching meta tool");
        tools::dispatch(&self.client, name, args).await
    }

    async fn handle_webhook(
        &self,
        name: &str,
        request: WebhookRequest,
    ) -> Result<WebhookResponse, ConciergeError> {
        match name {
            "events" => webhook::handle_events(&self.settings, &self.host, request).await,
            other => Err(ConciergeError::Validation(format!(
                "meta has no webhook named `{other}`"
            ))),
        }
    }
}

pub struct MetaFactory;

impl AppFactory for MetaFactory {
    fn manifest(&self) -> AppManifest {
        AppManifest {
            name: APP_NAME.into(),
            description:
                "Meta Graph API: WhatsApp messaging, business phone numbers, and Instagram account discovery."
                    .into(),
            tools: tools::definitions(),
            webhooks: vec![WebhookDefinition {
                name: "events".into(),
                description:
                    "Receives Graph webhook events: the subscription handshake on GET, signed message batches on POST."
                        .into(),
                methods: vec![WebhookMethod::Get, WebhookMethod::Post],
            }],
        }
    }

    fn create(
        &self,
        settings: &Value,
        host: HostServices,
    ) -> Result<Box<dyn IntegrationApp>, ConciergeError> {
        Ok(Box::new(MetaApp::from_settings(settings, host)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_types::memory::InMemoryHost;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn app(server: &MockServer, host: &InMemoryHost) -> MetaApp {
        MetaApp::from_settings(
            &json!({
                "access_token": "install-token",
                "graph_base_url": server.uri(),
                "verify_token": "verify-token"
            }),
            host.services(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn send_tool_returns_the_message_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v19.0/pn-1/messages"))
            .and(query_param("access_token", "install-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messages": [{"id": "wamid.B7"}]
            })))
            .mount(&server)
            .await;

        let host = InMemoryHost::new();
        let result = app(&server, &host)
            .call_tool(
                "messages.send",
                json!({"phone_number_id": "pn-1", "to": "+15550002222", "body": "See you at 5pm"}),
            )
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.data["message_id"], "wamid.B7");
    }

    #[tokio::test]
    async fn vendor_failures_fold_into_the_tool_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v19.0/pn-1/messages"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"message": "Recipient is not a valid WhatsApp user",
                          "type": "GraphMethodException", "code": 131026}
            })))
            .mount(&server)
            .await;

        let host = InMemoryHost::new();
        let result = app(&server, &host)
            .call_tool(
                "messages.send",
                json!({"phone_number_id": "pn-1", "to": "+15550002222", "body": "hi"}),
            )
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("not a valid WhatsApp user"));
    }

    #[tokio::test]
    async fn events_webhook_answers_the_handshake_through_the_app() {
        let server = MockServer::start().await;
        let host = InMemoryHost::new();
        let request = WebhookRequest {
            method: WebhookMethod::Get,
            url: "https://hooks.host.example/apps/meta/events".into(),
            headers: vec![],
            query: vec![
                ("hub.mode".into(), "subscribe".into()),
                ("hub.verify_token".into(), "verify-token".into()),
                ("hub.challenge".into(), "1158201444".into()),
            ],
            body: vec![],
        };

        let response = app(&server, &host)
            .handle_webhook("events", request)
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "1158201444");
    }

    #[tokio::test]
    async fn unknown_tools_and_webhooks_are_validation_errors() {
        let server = MockServer::start().await;
        let host = InMemoryHost::new();
        let app = app(&server, &host);

        let err = app.call_tool("messages.react", json!({})).await.unwrap_err();
        assert!(matches!(err, ConciergeError::Validation(_)));

        let request = WebhookRequest {
            method: WebhookMethod::Post,
            url: "https://hooks.host.example/apps/meta/statuses".into(),
            headers: vec![],
            query: vec![],
            body: vec![],
        };
        let err = app.handle_webhook("statuses", request).await.unwrap_err();
        assert!(matches!(err, ConciergeError::Validation(_)));
    }

    #[test]
    fn manifest_lists_tools_and_the_events_webhook() {
        let manifest = MetaFactory.manifest();
        assert_eq!(manifest.name, "meta");
        let names: Vec<&str> = manifest.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "messages.send",
                "accounts.phone_numbers",
                "pages.instagram_accounts",
            ]
        );
        assert_eq!(manifest.webhooks.len(), 1);
        assert_eq!(manifest.webhooks[0].name, "events");
        assert_eq!(
            manifest.webhooks[0].methods,
            vec![WebhookMethod::Get, WebhookMethod::Post]
        );
    }
}
