//! Typed client for the Petbooqz HTTP API.
//!
//! Two endpoint families are in play: the current calendar API at the
//! server root (`/calendars/...`) and the legacy scheduler API behind a
//! version segment. The vendor's responses drift between shapes, so
//! decoding goes through the tolerant wrappers instead of fixed
//! structs: reserve answers with an object or a one-element array, and
//! ids flip between numbers and strings across practice servers.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use concierge_client::{ApiVersionSelector, ErrorProfile, OneOrMany, OpaqueId, VendorClient};
use concierge_types::ConciergeError;

use crate::booking::{AppointmentReason, ClientIdentity, PatientIdentity};
use crate::settings::PetbooqzSettings;

/// No published error-code contract; classification is status-only.
pub const PROFILE: ErrorProfile = ErrorProfile::generic("petbooqz");

/// The calendar family is the current surface and lives at the server
/// root. Everything else is legacy and carries the configured version
/// segment.
pub struct PetbooqzVersions {
    legacy: String,
}

impl ApiVersionSelector for PetbooqzVersions {
    fn version_for(&self, path: &str) -> Option<String> {
        if path.starts_with("/calendars") {
            None
        } else {
            Some(self.legacy.clone())
        }
    }
}

/// A slot held for a client but not yet confirmed. Holds expire on the
/// vendor side, so callers either confirm or release promptly.
#[derive(Debug, Clone, Serialize)]
pub struct ReservedSlot {
    pub slot_id: OpaqueId,
    pub datetime: NaiveDateTime,
    pub calendar_id: String,
}

/// A confirmed appointment. Client and patient ids are whatever the
/// vendor resolved or created during confirmation; older servers omit
/// them.
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmedAppointment {
    pub slot_id: OpaqueId,
    pub client_id: Option<OpaqueId>,
    pub patient_id: Option<OpaqueId>,
}

/// Current state of a slot as the vendor reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotStatus {
    pub slot_id: OpaqueId,
    pub status: String,
    #[serde(default)]
    pub datetime: Option<NaiveDateTime>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AvailabilityResponse {
    Wrapped { times: Vec<NaiveDateTime> },
    Bare(Vec<NaiveDateTime>),
}

impl AvailabilityResponse {
    fn into_times(self) -> Vec<NaiveDateTime> {
        match self {
            Self::Wrapped { times } => times,
            Self::Bare(times) => times,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReserveResponse {
    #[serde(default)]
    slot_id: Option<OpaqueId>,
    #[serde(default)]
    datetime: Option<NaiveDateTime>,
}

#[derive(Debug, Deserialize)]
struct ConfirmResponse {
    #[serde(default)]
    slot_id: Option<OpaqueId>,
    #[serde(default)]
    client_id: Option<OpaqueId>,
    #[serde(default)]
    patient_id: Option<OpaqueId>,
}

/// One practice's Petbooqz server.
pub struct PetbooqzClient {
    vendor: VendorClient,
}

impl PetbooqzClient {
    pub fn new(settings: &PetbooqzSettings) -> Result<Self, ConciergeError> {
        let versions = Arc::new(PetbooqzVersions {
            legacy: settings.legacy_api_version.clone(),
        });
        let vendor = VendorClient::new(settings.credential(), versions, PROFILE)?;
        Ok(Self { vendor })
    }

    /// Open times for a calendar on a date, via the legacy scheduler.
    pub async fn availability(
        &self,
        calendar_id: &str,
        date: NaiveDate,
        duration_minutes: u32,
    ) -> Result<Vec<NaiveDateTime>, ConciergeError> {
        let payload = self
            .vendor
            .get("/scheduler/availability")
            .query("calendar_id", calendar_id)
            .query("date", date.format("%Y-%m-%d").to_string())
            .query("duration", duration_minutes.to_string())
            .send()
            .await?;
        Ok(payload.decode::<AvailabilityResponse>()?.into_times())
    }

    /// Places a hold on one datetime.
    pub async fn reserve(
        &self,
        calendar_id: &str,
        datetime: NaiveDateTime,
        duration_minutes: u32,
        note: Option<&str>,
    ) -> Result<ReservedSlot, ConciergeError> {
        let mut body = json!({
            "datetime": datetime,
            "duration": duration_minutes,
        });
        if let Some(note) = note {
            body["note"] = json!(note);
        }
        let payload = self
            .vendor
            .post(&format!("/calendars/{calendar_id}/reserve"))
            .json(body)
            .send()
            .await?;

        let response = payload
            .decode::<OneOrMany<ReserveResponse>>()?
            .into_first()
            .ok_or_else(|| ConciergeError::RequestFailed {
                status: 200,
                message: "petbooqz: reserve returned an empty slot list".into(),
            })?;
        let slot_id = response.slot_id.ok_or_else(|| ConciergeError::RequestFailed {
            status: 200,
            message: "petbooqz: reserve response is missing slot_id".into(),
        })?;
        Ok(ReservedSlot {
            slot_id,
            datetime: response.datetime.unwrap_or(datetime),
            calendar_id: calendar_id.to_string(),
        })
    }

    /// Turns a hold into an appointment with client and patient details
    /// attached.
    pub async fn confirm(
        &self,
        calendar_id: &str,
        slot_id: &OpaqueId,
        client: &ClientIdentity,
        patient: &PatientIdentity,
        reason: &AppointmentReason,
        note: Option<&str>,
    ) -> Result<ConfirmedAppointment, ConciergeError> {
        let mut body = Map::new();
        body.insert("slot_id".into(), json!(slot_id));
        body.insert("client".into(), serde_json::to_value(client)?);
        body.insert("patient".into(), serde_json::to_value(patient)?);
        reason.apply(&mut body);
        if let Some(note) = note {
            body.insert("note".into(), json!(note));
        }

        let payload = self
            .vendor
            .post(&format!("/calendars/{calendar_id}/confirm"))
            .json(Value::Object(body))
            .send()
            .await?;
        let response: ConfirmResponse = payload.decode()?;
        Ok(ConfirmedAppointment {
            slot_id: response.slot_id.unwrap_or_else(|| slot_id.clone()),
            client_id: response.client_id,
            patient_id: response.patient_id,
        })
    }

    pub async fn slot(
        &self,
        calendar_id: &str,
        slot_id: &OpaqueId,
    ) -> Result<SlotStatus, ConciergeError> {
        self.vendor
            .get(&format!("/calendars/{calendar_id}/slots/{slot_id}"))
            .send()
            .await?
            .decode()
    }

    /// Drops a hold without creating an appointment.
    pub async fn release(
        &self,
        calendar_id: &str,
        slot_id: &OpaqueId,
    ) -> Result<(), ConciergeError> {
        self.vendor
            .delete(&format!("/calendars/{calendar_id}/release"))
            .query("slot_id", slot_id.as_str())
            .send()
            .await?;
        Ok(())
    }

    /// Cancels a confirmed appointment. Any 2xx means cancelled, no
    /// matter what the body says.
    pub async fn cancel(
        &self,
        calendar_id: &str,
        slot_id: &OpaqueId,
    ) -> Result<(), ConciergeError> {
        self.vendor
            .delete(&format!("/calendars/{calendar_id}/cancel"))
            .query("slot_id", slot_id.as_str())
            .send()
            .await?;
        Ok(())
    }
}
