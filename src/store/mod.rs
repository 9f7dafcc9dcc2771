//! Remote Form Store abstraction
//!
//! Persistence addressed by `(clientID, formType)`. The session manager only
//! ever talks to a store through this trait; which implementation it gets is a
//! constructor-time decision made by [`build_store`].

pub mod http;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::{FormsConfig, StoreBackend};
use crate::error::{StoreError, StoreResult};
use crate::types::{ClientId, FetchedForm, FormData, FormSummary, FormType};

pub use http::HttpFormStore;
pub use memory::InMemoryFormStore;

/// Key-value persistence for form payloads
#[async_trait]
pub trait FormStore: Send + Sync {
    /// Fetch the stored payload. An absent record is `FetchedForm::Empty`.
    async fn fetch(&self, client_id: &ClientId, form_type: &FormType) -> StoreResult<FetchedForm>;

    /// Create or replace the record, returning what the store saved.
    async fn save(
        &self,
        client_id: &ClientId,
        form_type: &FormType,
        form_data: FormData,
    ) -> StoreResult<FormData>;

    /// Best-effort incremental persistence of an in-progress payload.
    async fn auto_save(
        &self,
        client_id: &ClientId,
        form_type: &FormType,
        form_data: FormData,
    ) -> StoreResult<()>;

    /// Derived statistics for the stored record (optional)
    async fn fetch_summary(
        &self,
        _client_id: &ClientId,
        form_type: &FormType,
    ) -> StoreResult<FormSummary> {
        Err(StoreError::Unavailable {
            message: format!("summary not supported for {}", form_type),
        })
    }
}

/// Build the store implementation selected by configuration.
pub fn build_store(config: &FormsConfig) -> StoreResult<Arc<dyn FormStore>> {
    match config.backend {
        StoreBackend::Mock => {
            info!("Using in-memory fixture form store");
            Ok(Arc::new(InMemoryFormStore::new()))
        }
        StoreBackend::Http => {
            info!("Using HTTP form store at {}", config.base_url);
            Ok(Arc::new(HttpFormStore::new(
                config.base_url.as_str(),
                config.request_timeout,
            )?))
        }
    }
}
