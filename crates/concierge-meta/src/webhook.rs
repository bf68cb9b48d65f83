//! Inbound Graph events: subscription handshake, signature check, and
//! message normalization.
//!
//! Payload handling is deliberately forgiving. The vendor batches
//! entries and mixes message events with delivery statuses, and shapes
//! drift; anything that cannot be normalized is skipped with a warning
//! while the rest of the batch still goes through. The signature check
//! is the one hard gate, and it runs before any parsing.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use concierge_types::{
    ChannelKind, ConciergeError, HostServices, InboundMessage, RecordFilter, WebhookMethod,
    WebhookRequest, WebhookResponse,
};
use concierge_webhooks::{answer_subscribe_challenge, verify_body_hmac};

use crate::settings::MetaSettings;

/// Host record model holding one connected messaging channel.
const CHANNEL_MODEL: &str = "channel";
/// Channel field matched against the receiving phone number.
const CHANNEL_PHONE_FIELD: &str = "phone_number";

const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

#[derive(Deserialize, Default)]
struct EventBody {
    #[serde(default)]
    entry: Vec<Entry>,
}

#[derive(Deserialize)]
struct Entry {
    #[serde(default)]
    changes: Vec<Change>,
}

#[derive(Deserialize)]
struct Change {
    #[serde(default)]
    field: String,
    #[serde(default)]
    value: ChangeValue,
}

#[derive(Deserialize, Default)]
struct ChangeValue {
    #[serde(default)]
    metadata: Option<Metadata>,
    #[serde(default)]
    contacts: Vec<Contact>,
    #[serde(default)]
    messages: Vec<Message>,
    #[serde(default)]
    statuses: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct Metadata {
    #[serde(default)]
    display_phone_number: Option<String>,
}

#[derive(Deserialize)]
struct Contact {
    #[serde(default)]
    wa_id: Option<String>,
    #[serde(default)]
    profile: Option<Profile>,
}

#[derive(Deserialize)]
struct Profile {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct Message {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    text: Option<TextBody>,
}

#[derive(Deserialize)]
struct TextBody {
    #[serde(default)]
    body: String,
}

/// Entry point for the `events` webhook.
pub async fn handle_events(
    settings: &MetaSettings,
    host: &HostServices,
    request: WebhookRequest,
) -> Result<WebhookResponse, ConciergeError> {
    match request.method {
        WebhookMethod::Get => {
            let verify_token = settings.verify_token.as_deref().ok_or_else(|| {
                ConciergeError::Settings(
                    "verify_token is required to answer subscription handshakes".into(),
                )
            })?;
            Ok(answer_subscribe_challenge(verify_token, &request))
        }
        WebhookMethod::Post => {
            let app_secret = settings.app_secret.as_deref().ok_or_else(|| {
                ConciergeError::Settings(
                    "app_secret is required to verify event signatures".into(),
                )
            })?;
            verify_body_hmac(app_secret, &request.body, request.header(SIGNATURE_HEADER))?;

            let body: EventBody = match serde_json::from_slice(&request.body) {
                Ok(body) => body,
                Err(err) => {
                    // The vendor retries on non-2xx, and a payload that
                    // failed to parse will not parse next time either.
                    warn!(error = %err, "discarding unparseable event payload");
                    return Ok(WebhookResponse::ok_json(json!({"received": false})));
                }
            };

            let outcome = ingest(host, body).await?;
            Ok(WebhookResponse::ok_json(json!({
                "received": true,
                "delivered": outcome.delivered,
                "skipped": outcome.skipped
            })))
        }
    }
}

#[derive(Default)]
struct IngestOutcome {
    delivered: usize,
    skipped: usize,
}

async fn ingest(host: &HostServices, body: EventBody) -> Result<IngestOutcome, ConciergeError> {
    let mut outcome = IngestOutcome::default();
    for entry in body.entry {
        for change in entry.changes {
            if change.field != "messages" {
                debug!(field = %change.field, "ignoring change on unhandled field");
                continue;
            }
            let value = change.value;
            if !value.statuses.is_empty() {
                debug!(count = value.statuses.len(), "ignoring delivery statuses");
            }
            if value.messages.is_empty() {
                continue;
            }
            let pending = value.messages.len();

            let Some(to) = value
                .metadata
                .as_ref()
                .and_then(|m| m.display_phone_number.clone())
            else {
                warn!("change carries messages but no receiving number, skipping");
                outcome.skipped += pending;
                continue;
            };
            let Some(channel_id) = find_channel(host, &to).await? else {
                warn!(to, "no channel record for receiving number, skipping");
                outcome.skipped += pending;
                continue;
            };

            for message in value.messages {
                let (Some(id), Some(from)) = (message.id, message.from) else {
                    warn!("message without id or sender, skipping");
                    outcome.skipped += 1;
                    continue;
                };
                let text = message.text.map(|t| t.body).unwrap_or_default();
                if text.trim().is_empty() {
                    warn!(message_id = %id, "message has no text body, skipping");
                    outcome.skipped += 1;
                    continue;
                }
                let profile_name = value
                    .contacts
                    .iter()
                    .find(|c| c.wa_id.as_deref() == Some(from.as_str()))
                    .and_then(|c| c.profile.as_ref())
                    .and_then(|p| p.name.clone());

                let inbound = InboundMessage {
                    external_id: id,
                    from,
                    to: to.clone(),
                    body: text,
                    timestamp: parse_timestamp(message.timestamp.as_deref()),
                    channel: ChannelKind::WhatsApp,
                    metadata: json!({"profile_name": profile_name}),
                };
                host.messages.receive(&channel_id, inbound).await?;
                outcome.delivered += 1;
            }
        }
    }
    Ok(outcome)
}

async fn find_channel(
    host: &HostServices,
    phone: &str,
) -> Result<Option<String>, ConciergeError> {
    let records = host
        .records
        .list(CHANNEL_MODEL, &RecordFilter::by(CHANNEL_PHONE_FIELD, phone))
        .await?;
    Ok(records.into_iter().next().map(|r| r.id))
}

/// The vendor sends unix seconds as a string. Anything unreadable
/// falls back to arrival time.
fn parse_timestamp(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(|s| s.parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_types::memory::InMemoryHost;
    use hmac::{Hmac, Mac};
    use serde_json::Value;
    use sha2::Sha256;

    const APP_SECRET: &str = "app-secret";
    const VERIFY_TOKEN: &str = "verify-token";

    fn settings() -> MetaSettings {
        MetaSettings {
            access_token: "install-token".into(),
            graph_base_url: "https://graph.facebook.com".into(),
            graph_version: "v19.0".into(),
            verify_token: Some(VERIFY_TOKEN.into()),
            app_secret: Some(APP_SECRET.into()),
        }
    }

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn signed_post(body: Vec<u8>) -> WebhookRequest {
        let signature = sign(APP_SECRET, &body);
        WebhookRequest {
            method: WebhookMethod::Post,
            url: "https://hooks.host.example/apps/meta/events".into(),
            headers: vec![("X-Hub-Signature-256".into(), signature)],
            query: vec![],
            body,
        }
    }

    fn message_event(to: &str, from: &str, body: &str, id: &str) -> Value {
        json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "waba-1",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "metadata": {"display_phone_number": to, "phone_number_id": "pn-1"},
                        "contacts": [{"profile": {"name": "Jane"}, "wa_id": from}],
                        "messages": [{
                            "from": from,
                            "id": id,
                            "timestamp": "1764687600",
                            "type": "text",
                            "text": {"body": body}
                        }]
                    }
                }]
            }]
        })
    }

    async fn host_with_channel(phone: &str) -> (InMemoryHost, String) {
        let host = InMemoryHost::new();
        let id = host
            .records
            .insert(CHANNEL_MODEL, json!({"phone_number": phone, "transport": "whatsapp"}))
            .await;
        (host, id)
    }

    #[tokio::test]
    async fn subscription_handshake_echoes_the_challenge() {
        let host = InMemoryHost::new();
        let request = WebhookRequest {
            method: WebhookMethod::Get,
            url: "https://hooks.host.example/apps/meta/events".into(),
            headers: vec![],
            query: vec![
                ("hub.mode".into(), "subscribe".into()),
                ("hub.verify_token".into(), VERIFY_TOKEN.into()),
                ("hub.challenge".into(), "424242".into()),
            ],
            body: vec![],
        };
        let response = handle_events(&settings(), &host.services(), request)
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "424242");
    }

    #[tokio::test]
    async fn signed_text_message_is_normalized_and_delivered() {
        let (host, channel_id) = host_with_channel("+15550001111").await;
        let payload = message_event("+15550001111", "15550002222", "Hello from Jane", "wamid.X1");
        let response = handle_events(
            &settings(),
            &host.services(),
            signed_post(payload.to_string().into_bytes()),
        )
        .await
        .unwrap();

        assert_eq!(response.status, 200);
        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["delivered"], 1);
        assert_eq!(body["skipped"], 0);

        let received = host.messages.received().await;
        assert_eq!(received.len(), 1);
        let (routed_to, message) = &received[0];
        assert_eq!(routed_to, &channel_id);
        assert_eq!(message.external_id, "wamid.X1");
        assert_eq!(message.from, "15550002222");
        assert_eq!(message.to, "+15550001111");
        assert_eq!(message.body, "Hello from Jane");
        assert_eq!(message.channel, ChannelKind::WhatsApp);
        assert_eq!(message.metadata["profile_name"], "Jane");
        assert_eq!(message.timestamp.timestamp(), 1764687600);
    }

    #[tokio::test]
    async fn tampered_bodies_are_rejected_before_any_parsing() {
        let (host, _) = host_with_channel("+15550001111").await;
        let payload = message_event("+15550001111", "15550002222", "Hello", "wamid.X1");
        let mut request = signed_post(payload.to_string().into_bytes());
        // One flipped byte invalidates the signature and the JSON, so
        // a parse attempt would surface as a Serialization error.
        request.body[0] = b'X';

        let err = handle_events(&settings(), &host.services(), request)
            .await
            .unwrap_err();
        assert!(matches!(err, ConciergeError::SignatureInvalid(_)));
        assert_eq!(host.messages.count().await, 0);
    }

    #[tokio::test]
    async fn missing_signature_header_is_rejected() {
        let (host, _) = host_with_channel("+15550001111").await;
        let payload = message_event("+15550001111", "15550002222", "Hello", "wamid.X1");
        let mut request = signed_post(payload.to_string().into_bytes());
        request.headers.clear();

        let err = handle_events(&settings(), &host.services(), request)
            .await
            .unwrap_err();
        assert!(matches!(err, ConciergeError::SignatureInvalid(_)));
    }

    #[tokio::test]
    async fn undeliverable_messages_are_skipped_while_the_rest_land() {
        let (host, channel_id) = host_with_channel("+15550001111").await;
        let payload = json!({
            "object": "whatsapp_business_account",
            "entry": [
                message_event("+15550001111", "15550002222", "Booking please", "wamid.G1")["entry"][0],
                // Image message, no text body.
                {
                    "id": "waba-1",
                    "changes": [{
                        "field": "messages",
                        "value": {
                            "metadata": {"display_phone_number": "+15550001111"},
                            "messages": [{"from": "15550003333", "id": "wamid.G2",
                                          "timestamp": "1764687601", "type": "image"}]
                        }
                    }]
                },
                // Number nobody connected.
                message_event("+15559999999", "15550004444", "Hi?", "wamid.G3")["entry"][0]
            ]
        });

        let response = handle_events(
            &settings(),
            &host.services(),
            signed_post(payload.to_string().into_bytes()),
        )
        .await
        .unwrap();

        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["delivered"], 1);
        assert_eq!(body["skipped"], 2);

        let received = host.messages.received().await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, channel_id);
        assert_eq!(received[0].1.external_id, "wamid.G1");
    }

    #[tokio::test]
    async fn status_only_payloads_are_acknowledged_without_deliveries() {
        let (host, _) = host_with_channel("+15550001111").await;
        let payload = json!({
            "entry": [{
                "changes": [{
                    "field": "messages",
                    "value": {
                        "metadata": {"display_phone_number": "+15550001111"},
                        "statuses": [{"id": "wamid.S1", "status": "delivered"}]
                    }
                }]
            }]
        });

        let response = handle_events(
            &settings(),
            &host.services(),
            signed_post(payload.to_string().into_bytes()),
        )
        .await
        .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(host.messages.count().await, 0);
    }

    #[tokio::test]
    async fn unparseable_but_correctly_signed_payloads_are_discarded() {
        let (host, _) = host_with_channel("+15550001111").await;
        let response = handle_events(
            &settings(),
            &host.services(),
            signed_post(b"definitely not json".to_vec()),
        )
        .await
        .unwrap();
        assert_eq!(response.status, 200);
        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["received"], false);
    }

    #[tokio::test]
    async fn missing_webhook_secrets_are_settings_errors() {
        let host = InMemoryHost::new();
        let mut bare = settings();
        bare.app_secret = None;
        bare.verify_token = None;

        let post = signed_post(b"{}".to_vec());
        let err = handle_events(&bare, &host.services(), post).await.unwrap_err();
        assert!(matches!(err, ConciergeError::Settings(_)));

        let get = WebhookRequest {
            method: WebhookMethod::Get,
            url: "https://hooks.host.example/apps/meta/events".into(),
            headers: vec![],
            query: vec![],
            body: vec![],
        };
        let err = handle_events(&bare, &host.services(), get).await.unwrap_err();
        assert!(matches!(err, ConciergeError::Settings(_)));
    }
}
