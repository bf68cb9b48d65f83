//! Core trait contracts between the host runtime and the integration
//! apps.
//!
//! The host implements the service traits ([`RecordStore`],
//! [`MessageSink`], [`FileResolver`], [`WebhookRegistrar`]) and hands
//! them to apps as a [`HostServices`] bundle. Apps implement
//! [`IntegrationApp`] and are constructed per invocation through an
//! [`AppFactory`]. See `docs/architecture.md` section 3.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::ConciergeError;
use crate::manifest::AppManifest;
use crate::model::{
    InboundMessage, NewRecord, Record, RecordFilter, RecordPatch, RegisteredCallback, ToolResult,
    WebhookRequest, WebhookResponse,
};

/// CRUD access to the host platform's record store, keyed by model
/// name. Apps use it for channel routing and vendor-state tracking.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn list(
        &self,
        model: &str,
        filter: &RecordFilter,
    ) -> Result<Vec<Record>, ConciergeError>;

    async fn get(&self, model: &str, id: &str) -> Result<Option<Record>, ConciergeError>;

    async fn create(&self, record: NewRecord) -> Result<Record, ConciergeError>;

    async fn update(
        &self,
        model: &str,
        id: &str,
        patch: RecordPatch,
    ) -> Result<Record, ConciergeError>;
}

/// Delivery point for normalized inbound messages. The host owns
/// threading and persistence; apps only normalize and route.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn receive(
        &self,
        channel_record_id: &str,
        message: InboundMessage,
    ) -> Result<(), ConciergeError>;
}

/// Resolves host file ids to fetchable URLs, used when a vendor needs
/// to be pointed at a document the workspace uploaded.
#[async_trait]
pub trait FileResolver: Send + Sync {
    async fn resolve_url(&self, file_id: &str) -> Result<String, ConciergeError>;
}

/// Provisions public callback endpoints for an app's named webhooks, so
/// vendors can be pointed at them during setup calls.
#[async_trait]
pub trait WebhookRegistrar: Send + Sync {
    async fn register(
        &self,
        app_name: &str,
        webhook_name: &str,
    ) -> Result<RegisteredCallback, ConciergeError>;

    async fn unregister(&self, callback_id: &str) -> Result<(), ConciergeError>;
}

/// The host services handed to every app instance, grouped so factory
/// signatures stay stable as services are added.
#[derive(Clone)]
pub struct HostServices {
    pub records: Arc<dyn RecordStore>,
    pub messages: Arc<dyn MessageSink>,
    pub files: Arc<dyn FileResolver>,
    pub webhooks: Arc<dyn WebhookRegistrar>,
}

/// A live app instance bound to one install's settings.
///
/// Instances are cheap and short-lived: the registry builds one per
/// tool call or webhook delivery and drops it afterwards, so apps never
/// cache cross-invocation state outside the host record store.
#[async_trait]
pub trait IntegrationApp: Send + Sync {
    /// Executes the named tool with already-parsed JSON arguments.
    async fn call_tool(&self, name: &str, args: Value) -> Result<ToolResult, ConciergeError>;

    /// Handles a delivery on the named webhook endpoint.
    async fn handle_webhook(
        &self,
        name: &str,
        request: WebhookRequest,
    ) -> Result<WebhookResponse, ConciergeError>;
}

/// Constructs app instances from per-install settings.
///
/// The manifest is static: it must not depend on settings, because the
/// host reads it before any install exists.
pub trait AppFactory: Send + Sync {
    fn manifest(&self) -> AppManifest;

    fn create(
        &self,
        settings: &Value,
        host: HostServices,
    ) -> Result<Box<dyn IntegrationApp>, ConciergeError>;
}
