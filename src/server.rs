//! Mock REST form store server
//!
//! Serves the form store HTTP routes from an [`InMemoryFormStore`] so the
//! HTTP client and any front end can run without the real backend.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::MockServerConfig;
use crate::error::StoreError;
use crate::store::{FormStore, InMemoryFormStore};
use crate::types::{timestamp, ClientId, FetchedForm, FormData, FormSummary, FormType};

type ApiError = (StatusCode, Json<Value>);

#[derive(Clone)]
pub struct MockFormStoreState {
    pub store: Arc<InMemoryFormStore>,
}

pub struct MockFormStoreServer {
    config: MockServerConfig,
    state: MockFormStoreState,
}

impl MockFormStoreServer {
    pub fn new(config: MockServerConfig, store: Arc<InMemoryFormStore>) -> Self {
        Self {
            config,
            state: MockFormStoreState { store },
        }
    }

    /// Bind the configured address and serve until the process stops.
    pub async fn start(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = self.config.address();
        info!("Starting mock form store on {}", addr);
        info!(
            "Serving {} fixture records",
            self.state.store.record_count().await
        );

        let listener = TcpListener::bind(&addr).await?;
        self.serve(listener).await?;
        Ok(())
    }

    /// Serve on an already-bound listener (ephemeral ports in tests).
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        axum::serve(listener, self.router()).await
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route(
                "/api/forms/:form_type/:client_id",
                get(get_form).put(save_form),
            )
            .route("/api/forms/:form_type/:client_id/autosave", post(auto_save_form))
            .route("/api/forms/:form_type/:client_id/summary", get(get_summary))
            .route("/api/health", get(health_check))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)),
            )
            .with_state(self.state.clone())
    }
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "mock-form-store",
        "timestamp": Utc::now().to_rfc3339(),
        "mode": "mock"
    }))
}

fn key(form_type: String, client_id: String) -> (FormType, ClientId) {
    (FormType::from(form_type), ClientId::from(client_id))
}

fn api_error(error: StoreError) -> ApiError {
    let status = match &error {
        StoreError::Rejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        StoreError::Unavailable { .. } => StatusCode::NOT_IMPLEMENTED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let message = error.user_message().unwrap_or_else(|| error.to_string());
    (status, Json(json!({ "error": message })))
}

async fn get_form(
    State(state): State<MockFormStoreState>,
    Path((form_type, client_id)): Path<(String, String)>,
) -> Result<Json<FormData>, ApiError> {
    let (form_type, client_id) = key(form_type, client_id);
    info!("Mock API: fetch {} for client {}", form_type, client_id);

    match state.store.fetch(&client_id, &form_type).await.map_err(api_error)? {
        FetchedForm::Empty => {
            warn!("Mock API: no {} form for client {}", form_type, client_id);
            Err((
                StatusCode::NOT_FOUND,
                Json(json!({
                    "error": format!("No {} form for client {}", form_type, client_id)
                })),
            ))
        }
        fetched => Ok(Json(fetched.into_latest().unwrap_or_default())),
    }
}

async fn save_form(
    State(state): State<MockFormStoreState>,
    Path((form_type, client_id)): Path<(String, String)>,
    Json(form_data): Json<FormData>,
) -> Result<Json<FormData>, ApiError> {
    let (form_type, client_id) = key(form_type, client_id);
    info!("Mock API: save {} for client {}", form_type, client_id);

    let saved = state
        .store
        .save(&client_id, &form_type, form_data)
        .await
        .map_err(api_error)?;
    Ok(Json(saved))
}

async fn auto_save_form(
    State(state): State<MockFormStoreState>,
    Path((form_type, client_id)): Path<(String, String)>,
    Json(form_data): Json<FormData>,
) -> Result<Json<Value>, ApiError> {
    let (form_type, client_id) = key(form_type, client_id);
    info!("Mock API: auto-save {} for client {}", form_type, client_id);

    state
        .store
        .auto_save(&client_id, &form_type, form_data)
        .await
        .map_err(api_error)?;
    Ok(Json(json!({
        "success": true,
        "savedAt": timestamp(Utc::now())
    })))
}

async fn get_summary(
    State(state): State<MockFormStoreState>,
    Path((form_type, client_id)): Path<(String, String)>,
) -> Result<Json<FormSummary>, ApiError> {
    let (form_type, client_id) = key(form_type, client_id);
    let summary = state
        .store
        .fetch_summary(&client_id, &form_type)
        .await
        .map_err(api_error)?;
    Ok(Json(summary))
}
