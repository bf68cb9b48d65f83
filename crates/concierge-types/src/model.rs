//! Shared data types exchanged between the host runtime and the
//! integration apps.
//!
//! Everything here is plain data: tool results, normalized inbound
//! messages, host record shapes, and the transport-agnostic webhook
//! envelope. See `docs/architecture.md` section 2.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ConciergeError;

// ============================================================================
// Tool results
// ============================================================================

/// Outcome of a single tool invocation, returned to the host runtime.
///
/// Vendor-side failures are reported *inside* the result (`success:
/// false`) so the conversational flow that triggered the tool can react;
/// only errors the caller or host must fix first are raised as
/// [`ConciergeError`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    /// Tool-specific payload. Empty object when the tool has nothing to
    /// report beyond success.
    #[serde(default)]
    pub data: Value,
    /// Human-readable failure description when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Value::Null,
            error: Some(message.into()),
        }
    }

    /// Applies the standard dispatch policy to a vendor operation
    /// outcome: auth and validation errors propagate so the host can
    /// interrupt the flow, everything else folds into a failed result.
    pub fn from_outcome(outcome: Result<Value, ConciergeError>) -> Result<Self, ConciergeError> {
        match outcome {
            Ok(data) => Ok(Self::ok(data)),
            Err(err) if err.interrupts_dispatch() => Err(err),
            Err(err) => Ok(Self::failed(err.to_string())),
        }
    }
}

/// Deserializes tool arguments into a typed args struct. Shape problems
/// at this boundary are caller mistakes, so they come back as
/// `Validation`.
pub fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, ConciergeError> {
    serde_json::from_value(args)
        .map_err(|e| ConciergeError::Validation(format!("invalid tool arguments: {e}")))
}

// ============================================================================
// Inbound messages
// ============================================================================

/// Channel a message arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    WhatsApp,
    Sms,
}

/// A vendor message normalized into the host's inbound shape.
///
/// Webhook handlers produce one of these per deliverable message and
/// hand it to the host's message sink together with the channel record
/// it was routed to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Vendor-assigned message id, kept for dedup and threading.
    pub external_id: String,
    /// Sender identifier in vendor terms (phone number, wa id).
    pub from: String,
    /// Receiver identifier the message was routed by.
    pub to: String,
    /// Plain-text body. Never empty; bodyless events are skipped before
    /// an `InboundMessage` is built.
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub channel: ChannelKind,
    /// Vendor extras that survive normalization (profile name, media
    /// hints). Empty object when there are none.
    #[serde(default)]
    pub metadata: Value,
}

// ============================================================================
// Host records
// ============================================================================

/// A row in the host platform's record store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    /// Model name the record belongs to ("channel", "compliance_submission").
    pub model: String,
    pub fields: Value,
}

impl Record {
    /// Convenience accessor for a string field, since almost every
    /// routing decision reads one.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

/// Payload for creating a record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRecord {
    pub model: String,
    pub fields: Value,
}

/// Partial update applied to an existing record. Only the listed fields
/// change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPatch {
    pub fields: Value,
}

/// Equality filter for record listing. Empty filter matches everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordFilter {
    pub eq: Vec<(String, Value)>,
}

impl RecordFilter {
    pub fn by(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            eq: vec![(field.into(), value.into())],
        }
    }

    pub fn and(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.eq.push((field.into(), value.into()));
        self
    }

    /// True when `fields` satisfies every equality clause.
    pub fn matches(&self, fields: &Value) -> bool {
        self.eq
            .iter()
            .all(|(name, want)| fields.get(name) == Some(want))
    }
}

/// A callback endpoint the host provisioned for an app's named webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredCallback {
    pub id: String,
    /// Public URL the vendor should be pointed at.
    pub url: String,
}

// ============================================================================
// Webhook envelope
// ============================================================================

/// HTTP method of an inbound webhook delivery. Vendors in scope only
/// ever use these two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WebhookMethod {
    Get,
    Post,
}

/// An inbound webhook delivery, already read off the wire by the host.
///
/// Apps never see the host's HTTP server types; they get the raw body
/// (signatures are computed over exact bytes), the full public URL the
/// vendor called, and the parsed query and headers.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub method: WebhookMethod,
    /// Full public callback URL as the vendor saw it, including query
    /// string. Telephony signatures are computed over this.
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl WebhookRequest {
    /// Case-insensitive header lookup, first match wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Parses the body as JSON.
    pub fn json_body(&self) -> Result<Value, ConciergeError> {
        serde_json::from_slice(&self.body).map_err(|e| {
            ConciergeError::Serialization(format!("webhook body is not valid JSON: {e}"))
        })
    }
}

/// Response an app hands back for a webhook delivery. The host writes
/// it out verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookResponse {
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

impl WebhookResponse {
    pub fn ok_json(body: Value) -> Self {
        Self {
            status: 200,
            content_type: "application/json".into(),
            body: body.to_string(),
        }
    }

    pub fn ok_text(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: "text/plain".into(),
            body: body.into(),
        }
    }

    pub fn ok_xml(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: "text/xml".into(),
            body: body.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: 401,
            content_type: "text/plain".into(),
            body: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self {
            status: 403,
            content_type: "text/plain".into(),
            body: message.into(),
        }
    }
}
