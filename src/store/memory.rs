//! In-memory fixture form store
//!
//! Used for local development, demos and tests. Records are keyed by
//! `(clientID, formType)`; every call is counted and failures can be injected
//! one call at a time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::FormStore;
use crate::completion::{is_filled, percentage};
use crate::error::{StoreError, StoreResult};
use crate::types::{
    timestamp, user_fields, ClientId, FetchedForm, FormData, FormStatus, FormSummary, FormType,
    LAST_AUTO_SAVED_KEY, SAVED_AT_KEY, STATUS_KEY, SUBMITTED_AT_KEY,
};

type RecordKey = (ClientId, FormType);

#[derive(Debug, Default)]
struct Injected {
    fetch: Option<String>,
    save: Option<String>,
    auto_save: Option<String>,
}

#[derive(Debug, Default, Clone, Copy)]
struct WriteCounts {
    saves: u64,
    auto_saves: u64,
}

/// Fixture store holding records in process memory
#[derive(Debug, Default)]
pub struct InMemoryFormStore {
    records: RwLock<HashMap<RecordKey, FormData>>,
    writes: RwLock<HashMap<RecordKey, WriteCounts>>,
    injected: RwLock<Injected>,
    last_saved: RwLock<Option<FormData>>,
    last_auto_saved: RwLock<Option<FormData>>,
    fetch_calls: AtomicU64,
    save_calls: AtomicU64,
    auto_save_calls: AtomicU64,
}

impl InMemoryFormStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle, convenient for injecting into sessions.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Seed a fixture record.
    pub fn with_record(
        mut self,
        client_id: impl Into<ClientId>,
        form_type: impl Into<FormType>,
        data: FormData,
    ) -> Self {
        self.records
            .get_mut()
            .insert((client_id.into(), form_type.into()), data);
        self
    }

    pub async fn insert(&self, client_id: &ClientId, form_type: &FormType, data: FormData) {
        self.records
            .write()
            .await
            .insert((client_id.clone(), form_type.clone()), data);
    }

    pub async fn get(&self, client_id: &ClientId, form_type: &FormType) -> Option<FormData> {
        self.records
            .read()
            .await
            .get(&(client_id.clone(), form_type.clone()))
            .cloned()
    }

    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }

    /// Make the next fetch fail with `message`.
    pub async fn fail_next_fetch(&self, message: impl Into<String>) {
        self.injected.write().await.fetch = Some(message.into());
    }

    /// Make the next save fail with `message`.
    pub async fn fail_next_save(&self, message: impl Into<String>) {
        self.injected.write().await.save = Some(message.into());
    }

    /// Make the next auto-save fail with `message`.
    pub async fn fail_next_auto_save(&self, message: impl Into<String>) {
        self.injected.write().await.auto_save = Some(message.into());
    }

    pub fn fetch_count(&self) -> u64 {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn save_count(&self) -> u64 {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub fn auto_save_count(&self) -> u64 {
        self.auto_save_calls.load(Ordering::SeqCst)
    }

    /// Payload received by the most recent successful save.
    pub async fn last_saved(&self) -> Option<FormData> {
        self.last_saved.read().await.clone()
    }

    /// Payload received by the most recent successful auto-save.
    pub async fn last_auto_saved(&self) -> Option<FormData> {
        self.last_auto_saved.read().await.clone()
    }

    async fn take_failure(
        &self,
        pick: impl FnOnce(&mut Injected) -> Option<String>,
    ) -> StoreResult<()> {
        match pick(&mut *self.injected.write().await) {
            Some(message) => {
                warn!("Fixture store injecting failure: {}", message);
                Err(StoreError::Rejected { message })
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl FormStore for InMemoryFormStore {
    async fn fetch(&self, client_id: &ClientId, form_type: &FormType) -> StoreResult<FetchedForm> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.take_failure(|i| i.fetch.take()).await?;

        debug!(client = %client_id, form = %form_type, "Fixture store fetch");
        Ok(match self.get(client_id, form_type).await {
            Some(record) => FetchedForm::Record(record),
            None => FetchedForm::Empty,
        })
    }

    async fn save(
        &self,
        client_id: &ClientId,
        form_type: &FormType,
        form_data: FormData,
    ) -> StoreResult<FormData> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        self.take_failure(|i| i.save.take()).await?;

        let mut record = form_data.clone();
        record.insert(SAVED_AT_KEY.to_string(), Value::String(timestamp(Utc::now())));

        let key = (client_id.clone(), form_type.clone());
        self.records.write().await.insert(key.clone(), record.clone());
        self.writes.write().await.entry(key).or_default().saves += 1;
        *self.last_saved.write().await = Some(form_data);

        debug!(client = %client_id, form = %form_type, "Fixture store save");
        Ok(record)
    }

    async fn auto_save(
        &self,
        client_id: &ClientId,
        form_type: &FormType,
        form_data: FormData,
    ) -> StoreResult<()> {
        self.auto_save_calls.fetch_add(1, Ordering::SeqCst);
        self.take_failure(|i| i.auto_save.take()).await?;

        let key = (client_id.clone(), form_type.clone());
        {
            let mut records = self.records.write().await;
            let record = records.entry(key.clone()).or_default();
            // Auto-save never changes a record's lifecycle status.
            let status = record.get(STATUS_KEY).cloned();
            record.extend(form_data.clone());
            match status {
                Some(status) => {
                    record.insert(STATUS_KEY.to_string(), status);
                }
                None => {
                    record.remove(STATUS_KEY);
                }
            }
        }
        self.writes.write().await.entry(key).or_default().auto_saves += 1;
        *self.last_auto_saved.write().await = Some(form_data);

        debug!(client = %client_id, form = %form_type, "Fixture store auto-save");
        Ok(())
    }

    async fn fetch_summary(
        &self,
        client_id: &ClientId,
        form_type: &FormType,
    ) -> StoreResult<FormSummary> {
        let key = (client_id.clone(), form_type.clone());
        let record = self.records.read().await.get(&key).cloned().unwrap_or_default();
        let counts = self.writes.read().await.get(&key).copied().unwrap_or_default();

        let fields = user_fields(&record);
        let filled_count = fields.values().filter(|v| is_filled(Some(*v))).count();
        let status = record
            .get(STATUS_KEY)
            .and_then(|v| serde_json::from_value::<FormStatus>(v.clone()).ok());
        let text = |key: &str| record.get(key).and_then(Value::as_str).map(str::to_string);

        Ok(FormSummary {
            client_id: client_id.clone(),
            form_type: form_type.clone(),
            status,
            field_count: fields.len(),
            filled_count,
            completion: percentage(filled_count, fields.len()),
            submitted_at: text(SUBMITTED_AT_KEY),
            last_auto_saved: text(LAST_AUTO_SAVED_KEY),
            save_count: counts.saves,
            auto_save_count: counts.auto_saves,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> FormData {
        match value {
            Value::Object(map) => map,
            _ => FormData::new(),
        }
    }

    fn key() -> (ClientId, FormType) {
        (ClientId::from("c-100"), FormType::from("consentPhoto"))
    }

    #[tokio::test]
    async fn test_fetch_missing_is_empty() {
        let store = InMemoryFormStore::new();
        let (client, form) = key();
        assert_eq!(store.fetch(&client, &form).await.unwrap(), FetchedForm::Empty);
        assert_eq!(store.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_save_replaces_record() {
        let store = InMemoryFormStore::new();
        let (client, form) = key();

        store
            .save(&client, &form, data(json!({"a": 1, "b": 2})))
            .await
            .unwrap();
        let saved = store
            .save(&client, &form, data(json!({"a": 3})))
            .await
            .unwrap();

        assert_eq!(saved.get("a"), Some(&json!(3)));
        assert!(saved.contains_key(SAVED_AT_KEY));
        let stored = store.get(&client, &form).await.unwrap();
        assert!(!stored.contains_key("b"));
        assert_eq!(store.save_count(), 2);
        assert_eq!(store.last_saved().await, Some(data(json!({"a": 3}))));
    }

    #[tokio::test]
    async fn test_auto_save_merges_and_keeps_status() {
        let (client, form) = key();
        let store = InMemoryFormStore::new().with_record(
            client.clone(),
            form.clone(),
            data(json!({"a": 1, "status": "completed"})),
        );

        store
            .auto_save(&client, &form, data(json!({"b": 2, "status": "draft"})))
            .await
            .unwrap();

        let stored = store.get(&client, &form).await.unwrap();
        assert_eq!(stored.get("a"), Some(&json!(1)));
        assert_eq!(stored.get("b"), Some(&json!(2)));
        assert_eq!(stored.get("status"), Some(&json!("completed")));
    }

    #[tokio::test]
    async fn test_injected_failures_are_one_shot() {
        let store = InMemoryFormStore::new();
        let (client, form) = key();

        store.fail_next_save("database offline").await;
        let err = store
            .save(&client, &form, FormData::new())
            .await
            .unwrap_err();
        assert_eq!(err.user_message().as_deref(), Some("database offline"));
        assert!(store.save(&client, &form, FormData::new()).await.is_ok());
        assert_eq!(store.save_count(), 2);

        store.fail_next_fetch("timeout").await;
        assert!(store.fetch(&client, &form).await.is_err());
        assert!(store.fetch(&client, &form).await.is_ok());
    }

    #[tokio::test]
    async fn test_summary_counts_user_fields() {
        let store = InMemoryFormStore::new();
        let (client, form) = key();

        store
            .save(
                &client,
                &form,
                data(json!({
                    "photoConsent": true,
                    "mediaOutlets": [],
                    "signature": "A. Lovelace",
                    "status": "completed",
                    "submittedAt": "2024-05-01T10:00:00.000Z"
                })),
            )
            .await
            .unwrap();
        store
            .auto_save(&client, &form, data(json!({"notes": ""})))
            .await
            .unwrap();

        let summary = store.fetch_summary(&client, &form).await.unwrap();
        assert_eq!(summary.field_count, 4);
        assert_eq!(summary.filled_count, 2);
        assert_eq!(summary.completion, 50);
        assert_eq!(summary.status, Some(FormStatus::Completed));
        assert_eq!(
            summary.submitted_at.as_deref(),
            Some("2024-05-01T10:00:00.000Z")
        );
        assert_eq!(summary.save_count, 1);
        assert_eq!(summary.auto_save_count, 1);
    }
}
