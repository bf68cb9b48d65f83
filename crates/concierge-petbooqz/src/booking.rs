//! Booking coordination over the calendar API.
//!
//! The coordinator owns the multi-step flows: candidate fallback during
//! reservation, the reserve-then-confirm composite, and the safety
//! check in front of release. Single-call operations pass through with
//! logging. See `docs/architecture.md` section 6.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use concierge_client::OpaqueId;
use concierge_types::ConciergeError;

use crate::client::{ConfirmedAppointment, PetbooqzClient, ReservedSlot, SlotStatus};

/// The client (owner) an appointment is booked for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientIdentity {
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// The animal the appointment is for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientIdentity {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub species: Option<String>,
}

/// How the appointment is labeled in the practice calendar. The vendor
/// takes a coded appointment type or free-text reason, never both, so
/// the two are one value here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppointmentReason {
    /// Coded type from the practice's configured list ("CONSULTATION").
    Type(String),
    /// Free-text reason ("limping on the left hind leg").
    Reason(String),
}

impl AppointmentReason {
    pub(crate) fn apply(&self, body: &mut Map<String, Value>) {
        match self {
            Self::Type(code) => body.insert("appointment_type".into(), json!(code)),
            Self::Reason(text) => body.insert("reason".into(), json!(text)),
        };
    }
}

/// Behavior switches for the composite flows.
#[derive(Debug, Clone, Default)]
pub struct BookingOptions {
    /// After a failed confirm inside a book, also release the hold.
    /// Off by default: practices usually want the hold kept so staff
    /// can finish the booking by hand.
    pub release_on_confirm_failure: bool,
}

/// Drives the reservation lifecycle against one practice's calendar.
pub struct BookingCoordinator {
    client: PetbooqzClient,
    options: BookingOptions,
}

impl BookingCoordinator {
    pub fn new(client: PetbooqzClient, options: BookingOptions) -> Self {
        Self { client, options }
    }

    pub async fn availability(
        &self,
        calendar_id: &str,
        date: NaiveDate,
        duration_minutes: u32,
    ) -> Result<Vec<NaiveDateTime>, ConciergeError> {
        self.client
            .availability(calendar_id, date, duration_minutes)
            .await
    }

    /// Tries each candidate datetime in order and returns the first
    /// hold that sticks.
    ///
    /// Credential failures abort immediately; retrying the remaining
    /// candidates with dead credentials would only produce the same
    /// answer. Every other failure moves on to the next candidate, and
    /// exhaustion reports the last failure seen.
    pub async fn reserve(
        &self,
        calendar_id: &str,
        candidates: &[NaiveDateTime],
        duration_minutes: u32,
        note: Option<&str>,
    ) -> Result<ReservedSlot, ConciergeError> {
        if candidates.is_empty() {
            return Err(ConciergeError::Validation(
                "at least one candidate datetime is required".into(),
            ));
        }

        let mut last_error: Option<ConciergeError> = None;
        for (attempt, datetime) in candidates.iter().enumerate() {
            match self
                .client
                .reserve(calendar_id, *datetime, duration_minutes, note)
                .await
            {
                Ok(slot) => {
                    info!(
                        calendar_id,
                        slot_id = %slot.slot_id,
                        datetime = %slot.datetime,
                        attempt = attempt + 1,
                        "slot reserved"
                    );
                    return Ok(slot);
                }
                Err(err) if err.is_auth_invalid() => return Err(err),
                Err(err) => {
                    warn!(
                        calendar_id,
                        candidate = %datetime,
                        attempt = attempt + 1,
                        error = %err,
                        "candidate reservation failed, trying next"
                    );
                    last_error = Some(err);
                }
            }
        }
        Err(exhausted(candidates.len(), last_error))
    }

    pub async fn confirm(
        &self,
        calendar_id: &str,
        slot_id: &OpaqueId,
        client: &ClientIdentity,
        patient: &PatientIdentity,
        reason: &AppointmentReason,
        note: Option<&str>,
    ) -> Result<ConfirmedAppointment, ConciergeError> {
        let confirmed = self
            .client
            .confirm(calendar_id, slot_id, client, patient, reason, note)
            .await?;
        info!(
            calendar_id,
            slot_id = %confirmed.slot_id,
            "appointment confirmed"
        );
        Ok(confirmed)
    }

    /// Single-call booking: reserve the first workable candidate, then
    /// confirm it.
    ///
    /// When the confirm step fails the hold is left in place unless the
    /// install opted into releasing it; either way the confirm failure
    /// is what the caller gets back.
    pub async fn book(
        &self,
        calendar_id: &str,
        candidates: &[NaiveDateTime],
        duration_minutes: u32,
        client: &ClientIdentity,
        patient: &PatientIdentity,
        reason: &AppointmentReason,
        note: Option<&str>,
    ) -> Result<ConfirmedAppointment, ConciergeError> {
        let slot = self
            .reserve(calendar_id, candidates, duration_minutes, note)
            .await?;
        match self
            .confirm(calendar_id, &slot.slot_id, client, patient, reason, note)
            .await
        {
            Ok(confirmed) => Ok(confirmed),
            Err(err) => {
                warn!(
                    calendar_id,
                    slot_id = %slot.slot_id,
                    error = %err,
                    "confirm failed after reserve"
                );
                if self.options.release_on_confirm_failure && !err.is_auth_invalid() {
                    match self.client.release(calendar_id, &slot.slot_id).await {
                        Ok(()) => {
                            info!(slot_id = %slot.slot_id, "reservation released after failed confirm")
                        }
                        Err(release_err) => warn!(
                            slot_id = %slot.slot_id,
                            error = %release_err,
                            "could not release reservation after failed confirm"
                        ),
                    }
                }
                Err(err)
            }
        }
    }

    /// Releases a hold, after checking the slot still exists. Skipping
    /// the check would turn a stale slot id into a vendor-side 404 with
    /// a confusing message mid-release.
    pub async fn release(
        &self,
        calendar_id: &str,
        slot_id: &OpaqueId,
    ) -> Result<(), ConciergeError> {
        self.client
            .slot(calendar_id, slot_id)
            .await
            .map_err(|err| with_context("release precondition failed", err))?;
        self.client.release(calendar_id, slot_id).await?;
        info!(calendar_id, slot_id = %slot_id, "reservation released");
        Ok(())
    }

    pub async fn cancel(
        &self,
        calendar_id: &str,
        slot_id: &OpaqueId,
    ) -> Result<(), ConciergeError> {
        self.client.cancel(calendar_id, slot_id).await?;
        info!(calendar_id, slot_id = %slot_id, "appointment cancelled");
        Ok(())
    }

    pub async fn slot(
        &self,
        calendar_id: &str,
        slot_id: &OpaqueId,
    ) -> Result<SlotStatus, ConciergeError> {
        self.client.slot(calendar_id, slot_id).await
    }
}

/// Wraps the last candidate failure so the message reflects the whole
/// attempt, keeping the original variant and status.
fn exhausted(attempts: usize, last_error: Option<ConciergeError>) -> ConciergeError {
    match last_error {
        Some(ConciergeError::RequestFailed { status, message }) => ConciergeError::RequestFailed {
            status,
            message: format!("all {attempts} candidate times failed; last error: {message}"),
        },
        Some(other) => other,
        None => ConciergeError::Internal("candidate loop ran with no candidates".into()),
    }
}

fn with_context(context: &str, err: ConciergeError) -> ConciergeError {
    match err {
        ConciergeError::RequestFailed { status, message } => ConciergeError::RequestFailed {
            status,
            message: format!("{context}: {message}"),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::PetbooqzSettings;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn coordinator(server: &MockServer, options: BookingOptions) -> BookingCoordinator {
        let settings = PetbooqzSettings {
            base_url: server.uri(),
            username: "frontdesk".into(),
            password: "s3cret".into(),
            api_key: None,
            practice_id: None,
            legacy_api_version: "v1".into(),
            release_on_confirm_failure: options.release_on_confirm_failure,
        };
        BookingCoordinator::new(PetbooqzClient::new(&settings).unwrap(), options)
    }

    fn dt(s: &str) -> NaiveDateTime {
        s.parse().unwrap()
    }

    fn identity() -> ClientIdentity {
        ClientIdentity {
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            email: Some("jane@example.com".into()),
            phone: Some("+15550001111".into()),
        }
    }

    fn patient() -> PatientIdentity {
        PatientIdentity {
            name: "Fluffy".into(),
            species: None,
        }
    }

    #[tokio::test]
    async fn reserve_walks_candidates_in_order_until_one_sticks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/calendars/cal-1/reserve"))
            .and(body_string_contains("2025-12-02T17:00:00"))
            .respond_with(ResponseTemplate::new(409).set_body_json(
                json!({"error": {"message": "slot not available"}}),
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/calendars/cal-1/reserve"))
            .and(body_string_contains("2025-12-02T17:30:00"))
            .respond_with(ResponseTemplate::new(409).set_body_json(
                json!({"error": {"message": "slot not available"}}),
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/calendars/cal-1/reserve"))
            .and(body_string_contains("2025-12-02T18:00:00"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"slot_id": 123, "datetime": "2025-12-02T18:00:00"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let coordinator = coordinator(&server, BookingOptions::default());
        let candidates = [
            dt("2025-12-02T17:00:00"),
            dt("2025-12-02T17:30:00"),
            dt("2025-12-02T18:00:00"),
        ];
        let slot = coordinator
            .reserve("cal-1", &candidates, 30, None)
            .await
            .unwrap();
        assert_eq!(slot.slot_id.as_str(), "123");
        assert_eq!(slot.datetime, dt("2025-12-02T18:00:00"));

        // Attempts must have gone out in candidate order.
        let bodies: Vec<String> = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|r| String::from_utf8_lossy(&r.body).into_owned())
            .collect();
        assert_eq!(bodies.len(), 3);
        assert!(bodies[0].contains("17:00:00"));
        assert!(bodies[1].contains("17:30:00"));
        assert!(bodies[2].contains("18:00:00"));
    }

    #[tokio::test]
    async fn reserve_reports_the_last_candidate_failure_on_exhaustion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/calendars/cal-1/reserve"))
            .and(body_string_contains("17:00:00"))
            .respond_with(ResponseTemplate::new(409).set_body_json(
                json!({"error": {"message": "slot not available"}}),
            ))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/calendars/cal-1/reserve"))
            .and(body_string_contains("19:45:00"))
            .respond_with(ResponseTemplate::new(422).set_body_json(
                json!({"error": {"message": "outside opening hours"}}),
            ))
            .mount(&server)
            .await;

        let coordinator = coordinator(&server, BookingOptions::default());
        let err = coordinator
            .reserve(
                "cal-1",
                &[dt("2025-12-02T17:00:00"), dt("2025-12-02T19:45:00")],
                30,
                None,
            )
            .await
            .unwrap_err();
        match err {
            ConciergeError::RequestFailed { status, message } => {
                assert_eq!(status, 422);
                assert!(message.contains("all 2 candidate times failed"));
                assert!(message.contains("outside opening hours"));
            }
            other => panic!("expected RequestFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reserve_aborts_the_candidate_loop_on_credential_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/calendars/cal-1/reserve"))
            .respond_with(ResponseTemplate::new(401).set_body_json(
                json!({"error": {"message": "bad credentials"}}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let coordinator = coordinator(&server, BookingOptions::default());
        let err = coordinator
            .reserve(
                "cal-1",
                &[dt("2025-12-02T17:00:00"), dt("2025-12-02T17:30:00")],
                30,
                None,
            )
            .await
            .unwrap_err();
        assert!(err.is_auth_invalid());
        // Only the first candidate was ever attempted.
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reserve_rejects_an_empty_candidate_list_without_any_request() {
        let server = MockServer::start().await;
        let coordinator = coordinator(&server, BookingOptions::default());
        let err = coordinator.reserve("cal-1", &[], 30, None).await.unwrap_err();
        assert!(matches!(err, ConciergeError::Validation(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn book_reserves_then_confirms() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/calendars/cal-1/reserve"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"slot_id": "55"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/calendars/cal-1/confirm"))
            .and(body_string_contains("\"slot_id\":\"55\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "slot_id": "55", "client_id": "client-1", "patient_id": "patient-1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let coordinator = coordinator(&server, BookingOptions::default());
        let confirmed = coordinator
            .book(
                "cal-1",
                &[dt("2025-12-02T17:00:00")],
                30,
                &identity(),
                &patient(),
                &AppointmentReason::Reason("limping".into()),
                None,
            )
            .await
            .unwrap();
        assert_eq!(confirmed.slot_id.as_str(), "55");
        assert_eq!(confirmed.client_id.unwrap().as_str(), "client-1");
    }

    #[tokio::test]
    async fn book_keeps_the_hold_by_default_when_confirm_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/calendars/cal-1/reserve"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"slot_id": "55"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/calendars/cal-1/confirm"))
            .respond_with(ResponseTemplate::new(500).set_body_json(
                json!({"error": {"message": "internal error"}}),
            ))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/calendars/cal-1/release"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let coordinator = coordinator(&server, BookingOptions::default());
        let err = coordinator
            .book(
                "cal-1",
                &[dt("2025-12-02T17:00:00")],
                30,
                &identity(),
                &patient(),
                &AppointmentReason::Type("CONSULTATION".into()),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ConciergeError::RequestFailed { status: 500, .. }
        ));
    }

    #[tokio::test]
    async fn book_releases_the_hold_when_opted_in_and_still_reports_confirm_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/calendars/cal-1/reserve"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"slot_id": "55"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/calendars/cal-1/confirm"))
            .respond_with(ResponseTemplate::new(500).set_body_json(
                json!({"error": {"message": "internal error"}}),
            ))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/calendars/cal-1/release"))
            .and(query_param("slot_id", "55"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let coordinator = coordinator(
            &server,
            BookingOptions {
                release_on_confirm_failure: true,
            },
        );
        let err = coordinator
            .book(
                "cal-1",
                &[dt("2025-12-02T17:00:00")],
                30,
                &identity(),
                &patient(),
                &AppointmentReason::Type("CONSULTATION".into()),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ConciergeError::RequestFailed { status: 500, .. }
        ));
    }

    #[tokio::test]
    async fn release_checks_the_slot_first_and_stops_when_it_is_gone() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/calendars/cal-1/slots/55"))
            .respond_with(ResponseTemplate::new(404).set_body_json(
                json!({"error": {"message": "no such slot"}}),
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/calendars/cal-1/release"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let coordinator = coordinator(&server, BookingOptions::default());
        let err = coordinator
            .release("cal-1", &OpaqueId::new("55"))
            .await
            .unwrap_err();
        match err {
            ConciergeError::RequestFailed { status, message } => {
                assert_eq!(status, 404);
                assert!(message.contains("release precondition failed"));
            }
            other => panic!("expected RequestFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn release_goes_through_once_the_slot_checks_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/calendars/cal-1/slots/55"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"slot_id": 55, "status": "reserved"}),
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/calendars/cal-1/release"))
            .and(query_param("slot_id", "55"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let coordinator = coordinator(&server, BookingOptions::default());
        coordinator
            .release("cal-1", &OpaqueId::new("55"))
            .await
            .unwrap();
    }
}
