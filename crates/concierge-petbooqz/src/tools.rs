//! Tool surface of the Petbooqz app: definitions and dispatch.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::{json, Value};

use concierge_client::OpaqueId;
use concierge_types::{parse_args, ConciergeError, ToolDefinition, ToolResult};

use crate::booking::{AppointmentReason, BookingCoordinator, ClientIdentity, PatientIdentity};

fn default_duration() -> u32 {
    30
}

#[derive(Deserialize)]
struct AvailabilityArgs {
    calendar_id: String,
    date: NaiveDate,
    #[serde(default = "default_duration")]
    duration_minutes: u32,
}

#[derive(Deserialize)]
struct ReserveArgs {
    calendar_id: String,
    datetime: Option<NaiveDateTime>,
    datetimes: Option<Vec<NaiveDateTime>>,
    #[serde(default = "default_duration")]
    duration_minutes: u32,
    note: Option<String>,
}

#[derive(Deserialize)]
struct ConfirmArgs {
    calendar_id: String,
    slot_id: String,
    client: ClientIdentity,
    patient: PatientIdentity,
    appointment_type: Option<String>,
    reason: Option<String>,
    note: Option<String>,
}

#[derive(Deserialize)]
struct BookArgs {
    calendar_id: String,
    datetime: Option<NaiveDateTime>,
    datetimes: Option<Vec<NaiveDateTime>>,
    #[serde(default = "default_duration")]
    duration_minutes: u32,
    client: ClientIdentity,
    patient: PatientIdentity,
    appointment_type: Option<String>,
    reason: Option<String>,
    note: Option<String>,
}

#[derive(Deserialize)]
struct SlotArgs {
    calendar_id: String,
    slot_id: String,
}

/// Collapses the `datetime` / `datetimes` argument pair into the
/// ordered candidate list the coordinator wants.
fn candidates(
    datetime: Option<NaiveDateTime>,
    datetimes: Option<Vec<NaiveDateTime>>,
) -> Result<Vec<NaiveDateTime>, ConciergeError> {
    match (datetime, datetimes) {
        (Some(single), None) => Ok(vec![single]),
        (None, Some(list)) if !list.is_empty() => Ok(list),
        (None, Some(_)) => Err(ConciergeError::Validation(
            "`datetimes` must not be empty".into(),
        )),
        (Some(_), Some(_)) => Err(ConciergeError::Validation(
            "provide either `datetime` or `datetimes`, not both".into(),
        )),
        (None, None) => Err(ConciergeError::Validation(
            "one of `datetime` or `datetimes` is required".into(),
        )),
    }
}

/// Collapses the `appointment_type` / `reason` argument pair into the
/// single labeling value the vendor accepts.
fn labeling(
    appointment_type: Option<String>,
    reason: Option<String>,
) -> Result<AppointmentReason, ConciergeError> {
    match (appointment_type, reason) {
        (Some(code), None) => Ok(AppointmentReason::Type(code)),
        (None, Some(text)) => Ok(AppointmentReason::Reason(text)),
        (Some(_), Some(_)) => Err(ConciergeError::Validation(
            "provide either `appointment_type` or `reason`, not both".into(),
        )),
        (None, None) => Err(ConciergeError::Validation(
            "one of `appointment_type` or `reason` is required".into(),
        )),
    }
}

fn client_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "first_name": {"type": "string"},
            "last_name": {"type": "string"},
            "email": {"type": "string"},
            "phone": {"type": "string"}
        },
        "required": ["first_name", "last_name"]
    })
}

fn patient_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "name": {"type": "string"},
            "species": {"type": "string"}
        },
        "required": ["name"]
    })
}

fn datetime_properties() -> Value {
    json!({
        "datetime": {"type": "string", "description": "Candidate time, vendor-local, e.g. 2025-12-02T17:00:00"},
        "datetimes": {"type": "array", "items": {"type": "string"},
                      "description": "Ordered fallback candidates; the first available one is taken"},
        "duration_minutes": {"type": "integer", "default": 30}
    })
}

pub fn definitions() -> Vec<ToolDefinition> {
    let mut reserve_properties = json!({"calendar_id": {"type": "string"}, "note": {"type": "string"}});
    if let (Value::Object(target), Value::Object(extra)) =
        (&mut reserve_properties, datetime_properties())
    {
        target.extend(extra);
    }

    let mut book_properties = reserve_properties.clone();
    if let Value::Object(target) = &mut book_properties {
        target.insert("client".into(), client_schema());
        target.insert("patient".into(), patient_schema());
        target.insert("appointment_type".into(), json!({"type": "string"}));
        target.insert("reason".into(), json!({"type": "string"}));
    }

    vec![
        ToolDefinition {
            name: "calendar.availability".into(),
            description: "List open appointment times for a calendar on a date.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "calendar_id": {"type": "string"},
                    "date": {"type": "string", "description": "YYYY-MM-DD"},
                    "duration_minutes": {"type": "integer", "default": 30}
                },
                "required": ["calendar_id", "date"]
            }),
        },
        ToolDefinition {
            name: "calendar.reserve".into(),
            description:
                "Hold a slot. Accepts one datetime or an ordered list of fallback candidates."
                    .into(),
            input_schema: json!({
                "type": "object",
                "properties": reserve_properties,
                "required": ["calendar_id"]
            }),
        },
        ToolDefinition {
            name: "calendar.confirm".into(),
            description:
                "Confirm a held slot into an appointment, with exactly one of appointment_type or reason."
                    .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "calendar_id": {"type": "string"},
                    "slot_id": {"type": "string"},
                    "client": client_schema(),
                    "patient": patient_schema(),
                    "appointment_type": {"type": "string"},
                    "reason": {"type": "string"},
                    "note": {"type": "string"}
                },
                "required": ["calendar_id", "slot_id", "client", "patient"]
            }),
        },
        ToolDefinition {
            name: "calendar.book".into(),
            description: "Reserve and confirm an appointment in one step.".into(),
            input_schema: json!({
                "type": "object",
                "properties": book_properties,
                "required": ["calendar_id", "client", "patient"]
            }),
        },
        ToolDefinition {
            name: "calendar.release".into(),
            description: "Release a held slot without booking it.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "calendar_id": {"type": "string"},
                    "slot_id": {"type": "string"}
                },
                "required": ["calendar_id", "slot_id"]
            }),
        },
        ToolDefinition {
            name: "calendar.cancel".into(),
            description: "Cancel a confirmed appointment.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "calendar_id": {"type": "string"},
                    "slot_id": {"type": "string"}
                },
                "required": ["calendar_id", "slot_id"]
            }),
        },
        ToolDefinition {
            name: "calendar.slot".into(),
            description: "Fetch the current status of a slot.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "calendar_id": {"type": "string"},
                    "slot_id": {"type": "string"}
                },
                "required": ["calendar_id", "slot_id"]
            }),
        },
    ]
}

pub async fn dispatch(
    coordinator: &BookingCoordinator,
    name: &str,
    args: Value,
) -> Result<ToolResult, ConciergeError> {
    match name {
        "calendar.availability" => {
            let args: AvailabilityArgs = parse_args(args)?;
            ToolResult::from_outcome(
                coordinator
                    .availability(&args.calendar_id, args.date, args.duration_minutes)
                    .await
                    .map(|times| json!({"calendar_id": args.calendar_id, "times": times})),
            )
        }
        "calendar.reserve" => {
            let args: ReserveArgs = parse_args(args)?;
            let candidates = candidates(args.datetime, args.datetimes)?;
            ToolResult::from_outcome(
                coordinator
                    .reserve(
                        &args.calendar_id,
                        &candidates,
                        args.duration_minutes,
                        args.note.as_deref(),
                    )
                    .await
                    .map(|slot| {
                        json!({
                            "slot_id": slot.slot_id,
                            "datetime": slot.datetime,
                            "calendar_id": slot.calendar_id
                        })
                    }),
            )
        }
        "calendar.confirm" => {
            let args: ConfirmArgs = parse_args(args)?;
            let reason = labeling(args.appointment_type, args.reason)?;
            let slot_id = OpaqueId::new(args.slot_id);
            ToolResult::from_outcome(
                coordinator
                    .confirm(
                        &args.calendar_id,
                        &slot_id,
                        &args.client,
                        &args.patient,
                        &reason,
                        args.note.as_deref(),
                    )
                    .await
                    .map(|confirmed| {
                        json!({
                            "slot_id": confirmed.slot_id,
                            "client_id": confirmed.client_id,
                            "patient_id": confirmed.patient_id
                        })
                    }),
            )
        }
        "calendar.book" => {
            let args: BookArgs = parse_args(args)?;
            let candidates = candidates(args.datetime, args.datetimes)?;
            let reason = labeling(args.appointment_type, args.reason)?;
            ToolResult::from_outcome(
                coordinator
                    .book(
                        &args.calendar_id,
                        &candidates,
                        args.duration_minutes,
                        &args.client,
                        &args.patient,
                        &reason,
                        args.note.as_deref(),
                    )
                    .await
                    .map(|confirmed| {
                        json!({
                            "slot_id": confirmed.slot_id,
                            "client_id": confirmed.client_id,
                            "patient_id": confirmed.patient_id
                        })
                    }),
            )
        }
        "calendar.release" => {
            let args: SlotArgs = parse_args(args)?;
            let slot_id = OpaqueId::new(args.slot_id);
            ToolResult::from_outcome(
                coordinator
                    .release(&args.calendar_id, &slot_id)
                    .await
                    .map(|()| json!({"released": true, "slot_id": slot_id})),
            )
        }
        "calendar.cancel" => {
            let args: SlotArgs = parse_args(args)?;
            let slot_id = OpaqueId::new(args.slot_id);
            ToolResult::from_outcome(
                coordinator
                    .cancel(&args.calendar_id, &slot_id)
                    .await
                    .map(|()| json!({"cancelled": true, "slot_id": slot_id})),
            )
        }
        "calendar.slot" => {
            let args: SlotArgs = parse_args(args)?;
            let slot_id = OpaqueId::new(args.slot_id);
            ToolResult::from_outcome(
                coordinator
                    .slot(&args.calendar_id, &slot_id)
                    .await
                    .map(|status| {
                        json!({
                            "slot_id": status.slot_id,
                            "status": status.status,
                            "datetime": status.datetime
                        })
                    }),
            )
        }
        other => Err(ConciergeError::Validation(format!(
            "petbooqz has no tool named `{other}`"
        ))),
    }
}
