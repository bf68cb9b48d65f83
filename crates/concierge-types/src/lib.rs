//! Shared types, traits, and errors for the Concierge integration apps.
//!
//! Every other crate in the workspace depends on this one and nothing
//! here depends back, so the contracts between the host runtime, the
//! vendor clients, and the individual apps live in a single place. See
//! `docs/architecture.md` section 2.

pub mod errors;
pub mod manifest;
pub mod memory;
pub mod model;
pub mod settings;
pub mod traits;

pub use errors::ConciergeError;
pub use manifest::{AppManifest, ToolDefinition, WebhookDefinition};
pub use model::{
    parse_args, ChannelKind, InboundMessage, NewRecord, Record, RecordFilter, RecordPatch,
    RegisteredCallback, ToolResult, WebhookMethod, WebhookRequest, WebhookResponse,
};
pub use traits::{
    AppFactory, FileResolver, HostServices, IntegrationApp, MessageSink, RecordStore,
    WebhookRegistrar,
};
