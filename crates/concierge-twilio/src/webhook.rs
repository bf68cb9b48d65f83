//! Inbound Twilio callbacks: SMS delivery, voice forwarding, and
//! regulatory bundle status changes.
//!
//! Every callback carries the vendor's URL signature, verified before
//! anything is read out of the form. SMS and status callbacks answer
//! with a plain acknowledgement; voice callbacks answer with TwiML
//! telling the vendor what to do with the live call.

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use concierge_types::{
    ChannelKind, ConciergeError, HostServices, InboundMessage, Record, RecordFilter, RecordPatch,
    WebhookRequest, WebhookResponse,
};
use concierge_webhooks::{form_value, parse_form_body, verify_url_params_hmac};

use crate::settings::TwilioSettings;

/// Host record model holding one connected messaging channel.
pub(crate) const CHANNEL_MODEL: &str = "channel";
const CHANNEL_PHONE_FIELD: &str = "phone_number";
/// Channel field naming where inbound calls should be dialed onward.
const FORWARD_FIELD: &str = "forward_to";

/// Host record model tracking one regulatory submission.
pub(crate) const SUBMISSION_MODEL: &str = "compliance_submission";
const SUBMISSION_BUNDLE_FIELD: &str = "bundle_sid";

const SIGNATURE_HEADER: &str = "X-Twilio-Signature";

/// Parses the form body and checks the URL signature over it. Nothing
/// else looks at the form until this has passed.
fn verified_params(
    settings: &TwilioSettings,
    request: &WebhookRequest,
) -> Result<Vec<(String, String)>, ConciergeError> {
    let params = parse_form_body(request)?;
    verify_url_params_hmac(
        &settings.auth_token,
        &request.url,
        &params,
        request.header(SIGNATURE_HEADER),
    )?;
    Ok(params)
}

/// Entry point for the `sms` webhook.
pub async fn handle_sms(
    settings: &TwilioSettings,
    host: &HostServices,
    request: WebhookRequest,
) -> Result<WebhookResponse, ConciergeError> {
    let params = verified_params(settings, &request)?;

    let Some(to) = form_value(&params, "To") else {
        warn!("sms callback without a To number, skipping");
        return Ok(empty_twiml());
    };
    let (Some(sid), Some(from)) = (
        form_value(&params, "MessageSid").or_else(|| form_value(&params, "SmsSid")),
        form_value(&params, "From"),
    ) else {
        warn!(to, "sms callback without message sid or sender, skipping");
        return Ok(empty_twiml());
    };
    let body = form_value(&params, "Body").unwrap_or_default();
    if body.trim().is_empty() {
        warn!(to, message_sid = sid, "sms has no text body, skipping");
        return Ok(empty_twiml());
    }
    let Some(channel) = channel_for(host, to).await? else {
        warn!(to, "no channel record for receiving number, skipping");
        return Ok(empty_twiml());
    };

    let inbound = InboundMessage {
        external_id: sid.to_string(),
        from: from.to_string(),
        to: to.to_string(),
        body: body.to_string(),
        timestamp: Utc::now(),
        channel: ChannelKind::Sms,
        metadata: json!({
            "from_city": form_value(&params, "FromCity"),
            "from_country": form_value(&params, "FromCountry")
        }),
    };
    host.messages.receive(&channel.id, inbound).await?;
    info!(to, message_sid = sid, "inbound sms delivered");
    Ok(empty_twiml())
}

/// Entry point for the `voice` webhook. Answers with TwiML: dial the
/// channel's forwarding target, or speak a rejection when none is
/// configured.
pub async fn handle_voice(
    settings: &TwilioSettings,
    host: &HostServices,
    request: WebhookRequest,
) -> Result<WebhookResponse, ConciergeError> {
    let params = verified_params(settings, &request)?;

    let to = form_value(&params, "To").unwrap_or_default();
    let forward = match channel_for(host, to).await? {
        Some(channel) => channel.str_field(FORWARD_FIELD).map(str::to_string),
        None => None,
    };

    match forward {
        Some(target) => {
            info!(to, target = %target, "forwarding inbound call");
            Ok(twiml(&format!("<Dial>{}</Dial>", xml_escape(&target))))
        }
        None => {
            warn!(to, "no forwarding target for inbound call");
            Ok(twiml(
                "<Say>This number cannot take calls right now. Goodbye.</Say><Hangup/>",
            ))
        }
    }
}

/// Entry point for the `bundle-status` webhook registered per
/// compliance submission.
pub async fn handle_bundle_status(
    settings: &TwilioSettings,
    host: &HostServices,
    request: WebhookRequest,
) -> Result<WebhookResponse, ConciergeError> {
    let params = verified_params(settings, &request)?;

    let (Some(bundle_sid), Some(status)) = (
        form_value(&params, "BundleSid"),
        form_value(&params, "Status"),
    ) else {
        warn!("bundle callback without BundleSid or Status, skipping");
        return Ok(WebhookResponse::ok_text("ok"));
    };

    let submissions = host
        .records
        .list(
            SUBMISSION_MODEL,
            &RecordFilter::by(SUBMISSION_BUNDLE_FIELD, bundle_sid),
        )
        .await?;
    let Some(submission) = submissions.into_iter().next() else {
        warn!(bundle_sid, "no submission record for bundle, skipping");
        return Ok(WebhookResponse::ok_text("ok"));
    };

    let mut fields = json!({"status": status});
    if let Some(reason) = form_value(&params, "FailureReason") {
        fields["failure_reason"] = json!(reason);
    }
    host.records
        .update(SUBMISSION_MODEL, &submission.id, RecordPatch { fields })
        .await?;
    info!(bundle_sid, status, "bundle status recorded");
    Ok(WebhookResponse::ok_text("ok"))
}

async fn channel_for(host: &HostServices, phone: &str) -> Result<Option<Record>, ConciergeError> {
    let records = host
        .records
        .list(CHANNEL_MODEL, &RecordFilter::by(CHANNEL_PHONE_FIELD, phone))
        .await?;
    Ok(records.into_iter().next())
}

fn empty_twiml() -> WebhookResponse {
    twiml("")
}

fn twiml(inner: &str) -> WebhookResponse {
    WebhookResponse::ok_xml(format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>{inner}</Response>"
    ))
}

fn xml_escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}
