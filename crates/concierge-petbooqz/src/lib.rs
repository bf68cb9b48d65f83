//! Petbooqz integration app.
//!
//! Connects a veterinary practice's Petbooqz server to the host
//! platform: availability lookup, two-step and single-step appointment
//! booking, release, and cancellation, all through the calendar tool
//! surface. The vendor has no webhooks; everything is outbound.

pub mod app;
pub mod booking;
pub mod client;
pub mod settings;
pub mod tools;

pub use app::{PetbooqzApp, PetbooqzFactory, APP_NAME};
pub use booking::{
    AppointmentReason, BookingCoordinator, BookingOptions, ClientIdentity, PatientIdentity,
};
pub use client::{ConfirmedAppointment, PetbooqzClient, ReservedSlot, SlotStatus};
pub use settings::PetbooqzSettings;
