//! Twilio integration app.
//!
//! Connects an organization's Twilio account to the host platform:
//! outbound SMS, local number search and provisioning with callbacks
//! wired back to this app, the regulatory compliance bundle flow, and
//! the inbound SMS / voice / bundle-status webhooks.

pub mod app;
pub mod client;
pub mod settings;
pub mod tools;
pub mod webhook;

pub use app::{TwilioApp, TwilioFactory, APP_NAME};
pub use client::{
    AvailableNumber, ComplianceBundle, ProvisionedNumber, SentSms, TwilioClient,
};
pub use settings::TwilioSettings;
