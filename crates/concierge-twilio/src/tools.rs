//! Tool surface of the Twilio app: definitions and dispatch.
//!
//! Provisioning and compliance submission are the two tools with real
//! orchestration: both mint host callback URLs before talking to the
//! vendor, and both leave a host record behind so the webhooks can
//! route what comes back.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use concierge_types::{
    parse_args, ConciergeError, HostServices, NewRecord, ToolDefinition, ToolResult,
};

use crate::app::APP_NAME;
use crate::client::TwilioClient;
use crate::settings::TwilioSettings;
use crate::webhook::{CHANNEL_MODEL, SUBMISSION_MODEL};

fn default_number_type() -> String {
    "local".to_string()
}

fn default_end_user_type() -> String {
    "business".to_string()
}

fn empty_object() -> Value {
    json!({})
}

#[derive(Deserialize)]
struct SendArgs {
    to: String,
    from: Option<String>,
    body: String,
}

#[derive(Deserialize)]
struct SearchArgs {
    country: String,
    area_code: Option<String>,
}

#[derive(Deserialize)]
struct ProvisionArgs {
    phone_number: String,
    forward_to: Option<String>,
}

#[derive(Deserialize)]
struct SubmitArgs {
    friendly_name: String,
    email: String,
    iso_country: String,
    #[serde(default = "default_number_type")]
    number_type: String,
    #[serde(default = "default_end_user_type")]
    end_user_type: String,
    /// Vendor per-regulation field set for the end-user item.
    #[serde(default = "empty_object")]
    end_user_attributes: Value,
    document_type: String,
    #[serde(default = "empty_object")]
    document_attributes: Value,
    /// Host file id of the uploaded document; resolved to a fetchable
    /// URL and embedded in the document attributes.
    #[serde(default)]
    document_file_id: Option<String>,
}

#[derive(Deserialize)]
struct StatusArgs {
    bundle_sid: String,
}

fn require_object(field: &str, value: &Value) -> Result<(), ConciergeError> {
    if value.is_object() {
        Ok(())
    } else {
        Err(ConciergeError::Validation(format!(
            "`{field}` must be a JSON object"
        )))
    }
}

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "messages.send".into(),
            description: "Send an SMS, from an explicit number or the install default.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "to": {"type": "string", "description": "Recipient in E.164 form"},
                    "from": {"type": "string", "description": "Sending number; defaults to the install's from_number"},
                    "body": {"type": "string"}
                },
                "required": ["to", "body"]
            }),
        },
        ToolDefinition {
            name: "numbers.search".into(),
            description: "Search purchasable local numbers by country and area code.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "country": {"type": "string", "description": "ISO country code, e.g. US or AU"},
                    "area_code": {"type": "string"}
                },
                "required": ["country"]
            }),
        },
        ToolDefinition {
            name: "numbers.provision".into(),
            description:
                "Purchase a number, wire its SMS and voice callbacks to this app, and create the channel record."
                    .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "phone_number": {"type": "string", "description": "Number from a prior search, E.164"},
                    "forward_to": {"type": "string", "description": "Where inbound calls are dialed onward"}
                },
                "required": ["phone_number"]
            }),
        },
        ToolDefinition {
            name: "compliance.submit".into(),
            description:
                "Create and submit a regulatory bundle: end-user and supporting document assigned, status callback registered."
                    .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "friendly_name": {"type": "string"},
                    "email": {"type": "string", "description": "Contact for review outcomes"},
                    "iso_country": {"type": "string"},
                    "number_type": {"type": "string", "default": "local"},
                    "end_user_type": {"type": "string", "default": "business"},
                    "end_user_attributes": {"type": "object"},
                    "document_type": {"type": "string", "description": "Vendor document type, e.g. business_registration"},
                    "document_attributes": {"type": "object"},
                    "document_file_id": {"type": "string", "description": "Host file id of the uploaded document"}
                },
                "required": ["friendly_name", "email", "iso_country", "document_type"]
            }),
        },
        ToolDefinition {
            name: "compliance.status".into(),
            description: "Fetch the current review state of a regulatory bundle.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "bundle_sid": {"type": "string"}
                },
                "required": ["bundle_sid"]
            }),
        },
    ]
}

pub async fn dispatch(
    client: &TwilioClient,
    settings: &TwilioSettings,
    host: &HostServices,
    name: &str,
    args: Value,
) -> Result<ToolResult, ConciergeError> {
    match name {
        "messages.send" => {
            let args: SendArgs = parse_args(args)?;
            let from = settings.resolve_from(args.from.as_deref())?;
            ToolResult::from_outcome(
                client
                    .send_sms(&args.to, &from, &args.body)
                    .await
                    .map(|sms| json!({"message_sid": sms.sid, "status": sms.status})),
            )
        }
        "numbers.search" => {
            let args: SearchArgs = parse_args(args)?;
            ToolResult::from_outcome(
                client
                    .search_local_numbers(&args.country, args.area_code.as_deref())
                    .await
                    .map(|numbers| json!({"numbers": numbers})),
            )
        }
        "numbers.provision" => {
            let args: ProvisionArgs = parse_args(args)?;
            ToolResult::from_outcome(provision(client, host, args).await)
        }
        "compliance.submit" => {
            let args: SubmitArgs = parse_args(args)?;
            require_object("end_user_attributes", &args.end_user_attributes)?;
            require_object("document_attributes", &args.document_attributes)?;
            ToolResult::from_outcome(submit_compliance(client, host, args).await)
        }
        "compliance.status" => {
            let args: StatusArgs = parse_args(args)?;
            ToolResult::from_outcome(client.bundle_status(&args.bundle_sid).await.map(|bundle| {
                json!({
                    "bundle_sid": bundle.sid,
                    "status": bundle.status,
                    "failure_reason": bundle.failure_reason,
                    "valid_until": bundle.valid_until
                })
            }))
        }
        other => Err(ConciergeError::Validation(format!(
            "twilio has no tool named `{other}`"
        ))),
    }
}

/// Purchase flow: mint the two callback URLs, buy the number against
/// them, then record the channel so inbound traffic can be routed.
async fn provision(
    client: &TwilioClient,
    host: &HostServices,
    args: ProvisionArgs,
) -> Result<Value, ConciergeError> {
    let sms = host.webhooks.register(APP_NAME, "sms").await?;
    let voice = host.webhooks.register(APP_NAME, "voice").await?;
    let number = client
        .provision_number(&args.phone_number, Some(&sms.url), Some(&voice.url))
        .await?;

    let mut fields = json!({
        "phone_number": number.phone_number,
        "number_sid": number.sid,
        "sms_callback_id": sms.id,
        "voice_callback_id": voice.id
    });
    if let Some(forward) = &args.forward_to {
        fields["forward_to"] = json!(forward);
    }
    let record = host
        .records
        .create(NewRecord {
            model: CHANNEL_MODEL.to_string(),
            fields,
        })
        .await?;
    info!(
        phone_number = %number.phone_number,
        channel_record_id = %record.id,
        "number provisioned and channel recorded"
    );
    Ok(json!({
        "number_sid": number.sid,
        "phone_number": number.phone_number,
        "channel_record_id": record.id
    }))
}

/// The linear compliance sequence: status callback, bundle, end-user,
/// supporting document, assignments, submission, tracking record.
async fn submit_compliance(
    client: &TwilioClient,
    host: &HostServices,
    args: SubmitArgs,
) -> Result<Value, ConciergeError> {
    let callback = host.webhooks.register(APP_NAME, "bundle-status").await?;
    let bundle = client
        .create_bundle(
            &args.friendly_name,
            &args.email,
            &args.iso_country,
            &args.number_type,
            &args.end_user_type,
            Some(&callback.url),
        )
        .await?;
    let end_user = client
        .create_end_user(&args.friendly_name, &args.end_user_type, &args.end_user_attributes)
        .await?;

    let mut document_attributes = args.document_attributes;
    if let Some(file_id) = &args.document_file_id {
        let url = host.files.resolve_url(file_id).await?;
        document_attributes["url"] = json!(url);
    }
    let document = client
        .create_supporting_document(&args.friendly_name, &args.document_type, &document_attributes)
        .await?;

    client.assign_item(&bundle.sid, &end_user).await?;
    client.assign_item(&bundle.sid, &document).await?;
    let submitted = client.submit_bundle(&bundle.sid).await?;

    let record = host
        .records
        .create(NewRecord {
            model: SUBMISSION_MODEL.to_string(),
            fields: json!({
                "bundle_sid": submitted.sid,
                "status": submitted.status,
                "status_callback_id": callback.id,
                "friendly_name": args.friendly_name
            }),
        })
        .await?;
    Ok(json!({
        "bundle_sid": submitted.sid,
        "status": submitted.status,
        "submission_record_id": record.id
    }))
}
