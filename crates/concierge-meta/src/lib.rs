//! Meta integration app.
//!
//! Connects a business's Meta assets to the host platform: outbound
//! WhatsApp text messages, phone number listing, Instagram account
//! discovery through managed pages, and the signed inbound events
//! webhook that turns Graph message batches into host messages.

pub mod app;
pub mod client;
pub mod settings;
pub mod tools;
pub mod webhook;

pub use app::{MetaApp, MetaFactory, APP_NAME};
pub use client::{
    GraphClient, InstagramAccount, InstagramLookup, PageSummary, PhoneNumberSummary,
};
pub use settings::MetaSettings;
