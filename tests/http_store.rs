//! HttpFormStore against the mock REST server on an ephemeral port

#![cfg(feature = "server")]

use std::sync::Arc;
use std::time::Duration;

use intake_forms::{
    ClientId, FetchedForm, FormData, FormSession, FormSessionOptions, FormStatus, FormStore,
    FormType, HttpFormStore, InMemoryFormStore, MockFormStoreServer, MockServerConfig, StoreError,
    ValidationRules,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

fn data(value: Value) -> FormData {
    match value {
        Value::Object(map) => map,
        _ => FormData::new(),
    }
}

async fn spawn_server(store: Arc<InMemoryFormStore>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = MockFormStoreServer::new(
        MockServerConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
        },
        store,
    );
    tokio::spawn(async move {
        let _ = server.serve(listener).await;
    });
    format!("http://{}", addr)
}

fn client(base: &str) -> HttpFormStore {
    HttpFormStore::new(base, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn fetch_missing_form_is_empty() {
    let base = spawn_server(InMemoryFormStore::shared()).await;
    let store = client(&base);

    let fetched = store
        .fetch(&ClientId::from("404"), &FormType::from("intake"))
        .await
        .unwrap();
    assert_eq!(fetched, FetchedForm::Empty);
}

#[tokio::test]
async fn save_fetch_and_summarise() {
    let backing = InMemoryFormStore::shared();
    let base = spawn_server(backing.clone()).await;
    let store = client(&base);
    let (client_id, form) = (ClientId::from(1001u64), FormType::from("consentPhoto"));

    let saved = store
        .save(
            &client_id,
            &form,
            data(json!({"photoConsent": true, "signature": "", "status": "completed"})),
        )
        .await
        .unwrap();
    assert!(saved.contains_key("savedAt"));

    let fetched = store.fetch(&client_id, &form).await.unwrap();
    let record = fetched.into_latest().unwrap();
    assert_eq!(record.get("photoConsent"), Some(&json!(true)));

    store
        .auto_save(&client_id, &form, data(json!({"notes": "call back"})))
        .await
        .unwrap();
    let stored = backing.get(&client_id, &form).await.unwrap();
    assert_eq!(stored.get("status"), Some(&json!("completed")));
    assert_eq!(stored.get("notes"), Some(&json!("call back")));

    let summary = store.fetch_summary(&client_id, &form).await.unwrap();
    assert_eq!(summary.status, Some(FormStatus::Completed));
    assert_eq!(summary.field_count, 3);
    assert_eq!(summary.filled_count, 2);
    assert_eq!(summary.save_count, 1);
    assert_eq!(summary.auto_save_count, 1);
}

#[tokio::test]
async fn server_error_message_reaches_session() {
    let backing = InMemoryFormStore::shared();
    let base = spawn_server(backing.clone()).await;
    let store: Arc<dyn FormStore> = Arc::new(client(&base));

    let session = FormSession::new(
        store.clone(),
        FormSessionOptions::new("intake")
            .client("c-1")
            .rules(ValidationRules::new().required(["firstName"]))
            .auto_save(false),
    );
    session.hydrate().await;
    session.update_field("firstName", json!("Ada"));

    backing.fail_next_save("Client file is archived").await;
    let outcome = session.submit_form(FormData::new()).await;
    assert!(!outcome.success);
    assert_eq!(outcome.errors, vec!["Client file is archived"]);
    assert!(session.is_dirty());

    let outcome = session.submit_form(FormData::new()).await;
    assert!(outcome.success);
    assert_eq!(
        backing
            .get(&ClientId::from("c-1"), &FormType::from("intake"))
            .await
            .unwrap()
            .get("status"),
        Some(&json!("completed"))
    );
}

#[tokio::test]
async fn unreachable_server_is_transport_error() {
    // Bind then drop to get a port nothing listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let store = client(&format!("http://{}", addr));
    let err = store
        .fetch(&ClientId::from("1"), &FormType::from("intake"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Transport { .. }));
    assert!(err.user_message().is_none());
}
