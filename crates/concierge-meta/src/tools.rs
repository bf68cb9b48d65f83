//! Tool surface of the Meta app: definitions and dispatch.

use serde::Deserialize;
use serde_json::{json, Value};

use concierge_types::{parse_args, ConciergeError, ToolDefinition, ToolResult};

use crate::client::GraphClient;

#[derive(Deserialize)]
struct SendArgs {
    phone_number_id: String,
    to: String,
    body: String,
}

#[derive(Deserialize)]
struct PhoneNumbersArgs {
    waba_id: String,
}

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "messages.send".into(),
            description: "Send a plain-text WhatsApp message from a business phone number.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "phone_number_id": {"type": "string", "description": "Sending business phone number id"},
                    "to": {"type": "string", "description": "Recipient in E.164 form"},
                    "body": {"type": "string"}
                },
                "required": ["phone_number_id", "to", "body"]
            }),
        },
        ToolDefinition {
            name: "accounts.phone_numbers".into(),
            description: "List the phone numbers attached to a WhatsApp business account.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "waba_id": {"type": "string", "description": "WhatsApp business account id"}
                },
                "required": ["waba_id"]
            }),
        },
        ToolDefinition {
            name: "pages.instagram_accounts".into(),
            description:
                "Discover Instagram professional accounts behind the connected business's pages."
                    .into(),
            input_schema: json!({"type": "object", "properties": {}}),
        },
    ]
}

pub async fn dispatch(
    client: &GraphClient,
    name: &str,
    args: Value,
) -> Result<ToolResult, ConciergeError> {
    match name {
        "messages.send" => {
            let args: SendArgs = parse_args(args)?;
            ToolResult::from_outcome(
                client
                    .send_text(&args.phone_number_id, &args.to, &args.body)
                    .await
                    .map(|id| json!({"message_id": id})),
            )
        }
        "accounts.phone_numbers" => {
            let args: PhoneNumbersArgs = parse_args(args)?;
            ToolResult::from_outcome(
                client
                    .phone_numbers(&args.waba_id)
                    .await
                    .map(|numbers| json!({"phone_numbers": numbers})),
            )
        }
        "pages.instagram_accounts" => ToolResult::from_outcome(
            client.instagram_accounts().await.and_then(|lookup| {
                let value = serde_json::to_value(&lookup)?;
                Ok(value)
            }),
        ),
        other => Err(ConciergeError::Validation(format!(
            "meta has no tool named `{other}`"
        ))),
    }
}
