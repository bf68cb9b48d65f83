//! In-memory implementations of the host service traits.
//!
//! App test suites and local harnesses need a host platform that is
//! cheap to stand up and easy to inspect afterwards. These doubles keep
//! everything behind `tokio` mutexes and record what the app did to
//! them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::errors::ConciergeError;
use crate::model::{
    InboundMessage, NewRecord, Record, RecordFilter, RecordPatch, RegisteredCallback,
};
use crate::traits::{
    FileResolver, HostServices, MessageSink, RecordStore, WebhookRegistrar,
};

/// Record store backed by a vector, with equality filtering and shallow
/// patch merges.
#[derive(Default)]
pub struct InMemoryRecordStore {
    records: Mutex<Vec<Record>>,
    next_id: AtomicU64,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record directly, bypassing the trait. Returns the
    /// assigned id.
    pub async fn insert(&self, model: &str, fields: Value) -> String {
        let id = self.assign_id(model);
        self.records.lock().await.push(Record {
            id: id.clone(),
            model: model.to_string(),
            fields,
        });
        id
    }

    pub async fn all(&self) -> Vec<Record> {
        self.records.lock().await.clone()
    }

    fn assign_id(&self, model: &str) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{model}-{n}")
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn list(
        &self,
        model: &str,
        filter: &RecordFilter,
    ) -> Result<Vec<Record>, ConciergeError> {
        let records = self.records.lock().await;
        Ok(records
            .iter()
            .filter(|r| r.model == model && filter.matches(&r.fields))
            .cloned()
            .collect())
    }

    async fn get(&self, model: &str, id: &str) -> Result<Option<Record>, ConciergeError> {
        let records = self.records.lock().await;
        Ok(records
            .iter()
            .find(|r| r.model == model && r.id == id)
            .cloned())
    }

    async fn create(&self, record: NewRecord) -> Result<Record, ConciergeError> {
        let id = self.assign_id(&record.model);
        let created = Record {
            id,
            model: record.model,
            fields: record.fields,
        };
        self.records.lock().await.push(created.clone());
        Ok(created)
    }

    async fn update(
        &self,
        model: &str,
        id: &str,
        patch: RecordPatch,
    ) -> Result<Record, ConciergeError> {
        let mut records = self.records.lock().await;
        let record = records
            .iter_mut()
            .find(|r| r.model == model && r.id == id)
            .ok_or_else(|| ConciergeError::Host(format!("no {model} record with id {id}")))?;
        merge_fields(&mut record.fields, patch.fields);
        Ok(record.clone())
    }
}

/// Shallow merge: object keys overwrite, anything else replaces
/// wholesale.
fn merge_fields(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(existing), Value::Object(changes)) => {
            for (key, value) in changes {
                existing.insert(key, value);
            }
        }
        (target, patch) => *target = patch,
    }
}

/// Message sink that remembers every delivery for later assertions.
#[derive(Default)]
pub struct RecordingMessageSink {
    received: Mutex<Vec<(String, InboundMessage)>>,
}

impl RecordingMessageSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn received(&self) -> Vec<(String, InboundMessage)> {
        self.received.lock().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.received.lock().await.len()
    }
}

#[async_trait]
impl MessageSink for RecordingMessageSink {
    async fn receive(
        &self,
        channel_record_id: &str,
        message: InboundMessage,
    ) -> Result<(), ConciergeError> {
        self.received
            .lock()
            .await
            .push((channel_record_id.to_string(), message));
        Ok(())
    }
}

/// File resolver over a fixed id-to-URL map. Unknown ids fail the way
/// the real host does.
#[derive(Default)]
pub struct StaticFileResolver {
    files: Mutex<HashMap<String, String>>,
}

impl StaticFileResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, file_id: &str, url: &str) {
        self.files
            .lock()
            .await
            .insert(file_id.to_string(), url.to_string());
    }
}

#[async_trait]
impl FileResolver for StaticFileResolver {
    async fn resolve_url(&self, file_id: &str) -> Result<String, ConciergeError> {
        self.files
            .lock()
            .await
            .get(file_id)
            .cloned()
            .ok_or_else(|| ConciergeError::Host(format!("unknown file id {file_id}")))
    }
}

/// Registrar that mints deterministic-looking callback URLs under a
/// fake public base.
pub struct RecordingWebhookRegistrar {
    base_url: String,
    registered: Mutex<Vec<RegisteredCallback>>,
}

impl RecordingWebhookRegistrar {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            registered: Mutex::new(Vec::new()),
        }
    }

    pub async fn registered(&self) -> Vec<RegisteredCallback> {
        self.registered.lock().await.clone()
    }
}

#[async_trait]
impl WebhookRegistrar for RecordingWebhookRegistrar {
    async fn register(
        &self,
        app_name: &str,
        webhook_name: &str,
    ) -> Result<RegisteredCallback, ConciergeError> {
        let id = Uuid::new_v4().to_string();
        let callback = RegisteredCallback {
            url: format!("{}/hooks/{app_name}/{webhook_name}/{id}", self.base_url),
            id,
        };
        self.registered.lock().await.push(callback.clone());
        Ok(callback)
    }

    async fn unregister(&self, callback_id: &str) -> Result<(), ConciergeError> {
        let mut registered = self.registered.lock().await;
        let before = registered.len();
        registered.retain(|c| c.id != callback_id);
        if registered.len() == before {
            return Err(ConciergeError::Host(format!(
                "no registered callback with id {callback_id}"
            )));
        }
        Ok(())
    }
}

/// The full set of doubles plus a [`HostServices`] view over them.
/// Tests keep the concrete handles for assertions and hand the services
/// bundle to the app under test.
pub struct InMemoryHost {
    pub records: Arc<InMemoryRecordStore>,
    pub messages: Arc<RecordingMessageSink>,
    pub files: Arc<StaticFileResolver>,
    pub webhooks: Arc<RecordingWebhookRegistrar>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self {
            records: Arc::new(InMemoryRecordStore::new()),
            messages: Arc::new(RecordingMessageSink::new()),
            files: Arc::new(StaticFileResolver::new()),
            webhooks: Arc::new(RecordingWebhookRegistrar::new("https://hooks.host.test")),
        }
    }

    pub fn services(&self) -> HostServices {
        HostServices {
            records: self.records.clone(),
            messages: self.messages.clone(),
            files: self.files.clone(),
            webhooks: self.webhooks.clone(),
        }
    }
}

impl Default for InMemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn record_store_filters_and_patches() {
        let store = InMemoryRecordStore::new();
        let id = store
            .insert("channel", json!({"phone_number": "+15550001111", "status": "active"}))
            .await;
        store
            .insert("channel", json!({"phone_number": "+15550002222", "status": "active"}))
            .await;

        let matched = store
            .list("channel", &RecordFilter::by("phone_number", "+15550001111"))
            .await
            .unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, id);

        let updated = store
            .update(
                "channel",
                &id,
                RecordPatch {
                    fields: json!({"status": "disabled"}),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.str_field("status"), Some("disabled"));
        assert_eq!(updated.str_field("phone_number"), Some("+15550001111"));
    }

    #[tokio::test]
    async fn registrar_mints_and_revokes_callbacks() {
        let registrar = RecordingWebhookRegistrar::new("https://hooks.host.test/");
        let callback = registrar.register("twilio", "bundle-status").await.unwrap();
        assert!(callback
            .url
            .starts_with("https://hooks.host.test/hooks/twilio/bundle-status/"));

        registrar.unregister(&callback.id).await.unwrap();
        assert!(registrar.registered().await.is_empty());
        assert!(registrar.unregister(&callback.id).await.is_err());
    }
}
