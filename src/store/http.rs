//! HTTP form store client
//!
//! Talks to the form REST routes:
//!
//! | operation | route |
//! |---|---|
//! | fetch | `GET /api/forms/{formType}/{clientID}` |
//! | save | `PUT /api/forms/{formType}/{clientID}` |
//! | auto-save | `POST /api/forms/{formType}/{clientID}/autosave` |
//! | summary | `GET /api/forms/{formType}/{clientID}/summary` |

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::FormStore;
use crate::error::{StoreError, StoreResult};
use crate::types::{ClientId, FetchedForm, FormData, FormSummary, FormType};

/// Remote Form Store reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpFormStore {
    http: Client,
    base_url: Url,
}

impl HttpFormStore {
    /// Create a client for the API rooted at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> StoreResult<Self> {
        let base_url = Url::parse(base_url)?;
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn form_url(
        &self,
        client_id: &ClientId,
        form_type: &FormType,
        suffix: &[&str],
    ) -> StoreResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| StoreError::Unavailable {
                message: format!("base URL {} cannot carry a path", self.base_url),
            })?;
            segments
                .pop_if_empty()
                .extend(["api", "forms", form_type.as_str(), client_id.as_str()])
                .extend(suffix);
        }
        Ok(url)
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> StoreResult<T> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(StoreError::Http {
                status: status.as_u16(),
                message: error_message(&body).unwrap_or_default(),
            });
        }

        let value: Value = if body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&body)?
        };
        if let Some(message) = embedded_error(&value) {
            return Err(StoreError::Rejected { message });
        }
        Ok(serde_json::from_value(value)?)
    }
}

#[async_trait]
impl FormStore for HttpFormStore {
    async fn fetch(&self, client_id: &ClientId, form_type: &FormType) -> StoreResult<FetchedForm> {
        let url = self.form_url(client_id, form_type, &[])?;
        debug!("GET {}", url);

        let response = self.http.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(FetchedForm::Empty);
        }
        let value: Value = Self::read_json(response).await?;
        Ok(FetchedForm::from_value(value))
    }

    async fn save(
        &self,
        client_id: &ClientId,
        form_type: &FormType,
        form_data: FormData,
    ) -> StoreResult<FormData> {
        let url = self.form_url(client_id, form_type, &[])?;
        debug!("PUT {}", url);

        let response = self.http.put(url).json(&form_data).send().await?;
        let value: Value = Self::read_json(response).await?;
        match value {
            Value::Object(saved) if !saved.is_empty() => Ok(saved),
            // Bare acknowledgements echo what was sent.
            _ => Ok(form_data),
        }
    }

    async fn auto_save(
        &self,
        client_id: &ClientId,
        form_type: &FormType,
        form_data: FormData,
    ) -> StoreResult<()> {
        let url = self.form_url(client_id, form_type, &["autosave"])?;
        debug!("POST {}", url);

        let response = self.http.post(url).json(&form_data).send().await?;
        let _ack: Value = Self::read_json(response).await.map_err(|e| {
            warn!("Auto-save for {} / {} failed: {}", form_type, client_id, e);
            e
        })?;
        Ok(())
    }

    async fn fetch_summary(
        &self,
        client_id: &ClientId,
        form_type: &FormType,
    ) -> StoreResult<FormSummary> {
        let url = self.form_url(client_id, form_type, &["summary"])?;
        debug!("GET {}", url);

        let response = self.http.get(url).send().await?;
        Self::read_json(response).await
    }
}

/// `error` or `message` string from an error body, or the raw text.
fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => ["error", "message"]
            .iter()
            .find_map(|key| value.get(key).and_then(Value::as_str))
            .map(str::to_string),
        Err(_) => Some(trimmed.chars().take(200).collect()),
    }
}

/// A 2xx failure envelope: `{"error": "..."}` on its own, or alongside
/// `"success": false`. Records that merely have an `error` field pass through.
fn embedded_error(value: &Value) -> Option<String> {
    let body = value.as_object()?;
    let message = body.get("error")?.as_str()?;
    let failed = body.get("success") == Some(&Value::Bool(false));
    let envelope_only = body
        .keys()
        .all(|key| matches!(key.as_str(), "error" | "message" | "success"));
    (failed || envelope_only).then(|| message.to_string())
}
