//! Mock form store server
//!
//! Serves the form REST routes from in-process fixtures.
//!
//! ```bash
//! FORMS_MOCK_PORT=3001 cargo run --features server --bin form_store_mock
//! ```

use std::sync::Arc;

use anyhow::Context;
use intake_forms::{telemetry, InMemoryFormStore, MockFormStoreServer, MockServerConfig};
use serde_json::json;

/// Fixture records served on startup: (client, form, payload)
fn fixtures() -> Vec<(&'static str, &'static str, serde_json::Value)> {
    vec![
        (
            "1001",
            "intake",
            json!({
                "firstName": "Ada",
                "lastName": "Lovelace",
                "email": "ada@example.org",
                "status": "draft"
            }),
        ),
        (
            "1001",
            "consentPhoto",
            json!({
                "photoConsent": true,
                "signature": "A. Lovelace",
                "status": "completed",
                "submittedAt": "2024-05-01T10:00:00.000Z",
                "formVersion": "1.0"
            }),
        ),
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing("form_store_mock=info,intake_forms=info,tower_http=debug");

    let config = MockServerConfig::from_env().context("invalid mock server configuration")?;

    let mut store = InMemoryFormStore::new();
    for (client, form, payload) in fixtures() {
        if let serde_json::Value::Object(record) = payload {
            store = store.with_record(client, form, record);
        }
    }

    tracing::info!("Starting mock form store");
    MockFormStoreServer::new(config, Arc::new(store))
        .start()
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    Ok(())
}
