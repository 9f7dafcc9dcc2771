//! Form Session Manager
//!
//! Owns one form's lifecycle for a `(formType, clientID)` pair:
//!
//! - **hydrate**: one fetch per mount, guarded by an initialisation flag
//! - **edit buffer**: field updates merge into a local working copy and mark it dirty
//! - **auto-save**: debounced, best-effort background persistence of the buffer
//! - **submit / draft**: validated (submit) or unvalidated (draft) create-or-replace saves
//!
//! All remote failures are normalised into flat message lists; nothing here
//! returns an error to the view for a failed network call.
//!
//! Edits are published on a broadcast channel as they happen, so other
//! components watching the same form see them before any save completes.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{FormsConfig, DEFAULT_AUTO_SAVE_DELAY, DEFAULT_FORM_VERSION};
use crate::error::{FormResult, StoreError};
use crate::store::{build_store, FormStore};
use crate::timer::CancellableTimer;
use crate::types::{
    present_client, timestamp, ClientId, FormData, FormStatus, FormSummary, FormType,
    FORM_VERSION_KEY, LAST_AUTO_SAVED_KEY, STATUS_KEY, SUBMITTED_AT_KEY,
};
use crate::validation::{ValidationRules, Validator, NO_CLIENT_SELECTED};

const EVENT_CHANNEL_CAPACITY: usize = 64;

// =============================================================================
// OPTIONS
// =============================================================================

/// Construction parameters for a [`FormSession`]
#[derive(Debug, Clone)]
pub struct FormSessionOptions {
    pub form_type: FormType,
    pub client_id: Option<ClientId>,
    /// Stamped on submitted payloads as `formVersion`
    pub form_version: String,
    pub validation_rules: ValidationRules,
    pub auto_save_enabled: bool,
    pub auto_save_delay: Duration,
}

impl FormSessionOptions {
    pub fn new(form_type: impl Into<FormType>) -> Self {
        Self {
            form_type: form_type.into(),
            client_id: None,
            form_version: DEFAULT_FORM_VERSION.to_string(),
            validation_rules: ValidationRules::default(),
            auto_save_enabled: true,
            auto_save_delay: DEFAULT_AUTO_SAVE_DELAY,
        }
    }

    /// Options seeded from shared configuration.
    pub fn from_config(config: &FormsConfig, form_type: impl Into<FormType>) -> Self {
        Self {
            form_version: config.form_version.clone(),
            auto_save_enabled: config.auto_save_enabled,
            auto_save_delay: config.auto_save_delay,
            ..Self::new(form_type)
        }
    }

    pub fn client(mut self, client_id: impl Into<ClientId>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn rules(mut self, rules: ValidationRules) -> Self {
        self.validation_rules = rules;
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.form_version = version.into();
        self
    }

    pub fn auto_save(mut self, enabled: bool) -> Self {
        self.auto_save_enabled = enabled;
        self
    }

    pub fn auto_save_delay(mut self, delay: Duration) -> Self {
        self.auto_save_delay = delay;
        self
    }
}

// =============================================================================
// EVENTS & OUTCOMES
// =============================================================================

/// Notification published by a session
#[derive(Debug, Clone, PartialEq)]
pub struct FormEvent {
    pub session_id: Uuid,
    pub form_type: FormType,
    pub client_id: Option<ClientId>,
    pub kind: FormEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormEventKind {
    /// Local edit, published before any save. Carries only the changed keys.
    FieldsChanged(FormData),
    /// Buffer replaced by fetched data
    Hydrated(FormData),
    /// Completed submission acknowledged by the store
    Submitted(FormData),
    /// Draft acknowledged by the store
    DraftSaved(FormData),
    AutoSaved { at: String },
    AutoSaveFailed { message: String },
    Reset,
}

/// Discriminated result of a submit or draft save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub success: bool,
    pub errors: Vec<String>,
}

impl SubmitOutcome {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
        }
    }

    pub fn failed(errors: Vec<String>) -> Self {
        Self {
            success: false,
            errors,
        }
    }
}

/// What a fired auto-save did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoSaveOutcome {
    Saved,
    Failed(String),
    Disabled,
    NoClient,
    Clean,
    Unchanged,
}

// =============================================================================
// STATE
// =============================================================================

#[derive(Debug, Default)]
struct SessionState {
    client_id: Option<ClientId>,
    remote_data: FormData,
    local_buffer: FormData,
    is_dirty: bool,
    local_errors: Vec<String>,
    remote_error: Option<String>,
    save_success: bool,
    is_loading: bool,
    is_saving: bool,
    /// One-shot hydrate guard for the current mount
    initialized: bool,
    /// Bumped whenever the subject changes; stale responses are dropped.
    mount: u64,
    /// Bumped on every buffer mutation.
    revision: u64,
    last_auto_saved_serialization: Option<String>,
    last_auto_saved_at: Option<String>,
}

struct Shared {
    session_id: Uuid,
    form_type: FormType,
    form_version: String,
    validator: Validator,
    auto_save_enabled: bool,
    auto_save_delay: Duration,
    store: Arc<dyn FormStore>,
    events: broadcast::Sender<FormEvent>,
    state: Mutex<SessionState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, client_id: Option<ClientId>, kind: FormEventKind) {
        // No subscribers is fine.
        let _ = self.events.send(FormEvent {
            session_id: self.session_id,
            form_type: self.form_type.clone(),
            client_id,
            kind,
        });
    }

    async fn run_auto_save(&self) -> AutoSaveOutcome {
        let (client, payload, at, serialized, mount) = {
            let mut state = self.lock();
            if !self.auto_save_enabled {
                return AutoSaveOutcome::Disabled;
            }
            let Some(client) = present_client(state.client_id.as_ref()).cloned() else {
                return AutoSaveOutcome::NoClient;
            };
            if !state.is_dirty {
                return AutoSaveOutcome::Clean;
            }
            let serialized = match serde_json::to_string(&state.local_buffer) {
                Ok(serialized) => serialized,
                Err(e) => {
                    warn!(session = %self.session_id, "Auto-save serialization failed: {}", e);
                    return AutoSaveOutcome::Failed(e.to_string());
                }
            };
            if state.last_auto_saved_serialization.as_deref() == Some(serialized.as_str()) {
                debug!(session = %self.session_id, "Auto-save skipped; buffer unchanged");
                return AutoSaveOutcome::Unchanged;
            }
            state.last_auto_saved_serialization = Some(serialized.clone());

            let at = timestamp(Utc::now());
            let mut payload = state.local_buffer.clone();
            payload.insert(LAST_AUTO_SAVED_KEY.to_string(), Value::String(at.clone()));
            (client, payload, at, serialized, state.mount)
        };

        let result = self.store.auto_save(&client, &self.form_type, payload).await;

        let mut state = self.lock();
        match result {
            Ok(()) => {
                if state.mount == mount {
                    state.last_auto_saved_at = Some(at.clone());
                }
                drop(state);
                info!(session = %self.session_id, form = %self.form_type, client = %client, "Auto-saved form");
                self.publish(Some(client), FormEventKind::AutoSaved { at });
                AutoSaveOutcome::Saved
            }
            Err(e) => {
                // Forget the serialization so a later attempt can retry the same content.
                if state.last_auto_saved_serialization.as_deref() == Some(serialized.as_str()) {
                    state.last_auto_saved_serialization = None;
                }
                drop(state);
                let message = e.to_string();
                warn!(
                    session = %self.session_id,
                    form = %self.form_type,
                    client = %client,
                    "Auto-save failed: {}",
                    message
                );
                self.publish(
                    Some(client),
                    FormEventKind::AutoSaveFailed {
                        message: message.clone(),
                    },
                );
                AutoSaveOutcome::Failed(message)
            }
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// Form Session Manager for one `(formType, clientID)` pair
///
/// The session is the only writer of its buffer. Views read through the
/// accessors and dispatch through the update and save methods.
pub struct FormSession {
    shared: Arc<Shared>,
    timer: Mutex<CancellableTimer>,
}

impl std::fmt::Debug for FormSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormSession")
            .field("session_id", &self.shared.session_id)
            .field("form_type", &self.shared.form_type)
            .field("state", &*self.shared.lock())
            .finish()
    }
}

impl FormSession {
    /// Create a session over the given store.
    pub fn new(store: Arc<dyn FormStore>, options: FormSessionOptions) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let session_id = Uuid::new_v4();
        debug!(
            session = %session_id,
            form = %options.form_type,
            "Creating form session"
        );

        let state = SessionState {
            client_id: options.client_id,
            ..SessionState::default()
        };

        Self {
            shared: Arc::new(Shared {
                session_id,
                form_type: options.form_type,
                form_version: options.form_version,
                validator: Validator::new(options.validation_rules),
                auto_save_enabled: options.auto_save_enabled,
                auto_save_delay: options.auto_save_delay,
                store,
                events,
                state: Mutex::new(state),
            }),
            timer: Mutex::new(CancellableTimer::new()),
        }
    }

    /// Build the store selected by `config` and open a session over it.
    pub fn from_config(config: &FormsConfig, options: FormSessionOptions) -> FormResult<Self> {
        let store = build_store(config)?;
        Ok(Self::new(store, options))
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.shared.lock()
    }

    fn timer(&self) -> MutexGuard<'_, CancellableTimer> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Mount hook; safe to call on every render.
    ///
    /// Issues a single fetch per mount once a client is present. Returns true
    /// when this call performed the fetch.
    pub async fn hydrate(&self) -> bool {
        let (client, mount, revision) = {
            let mut state = self.lock();
            if state.initialized {
                return false;
            }
            let Some(client) = present_client(state.client_id.as_ref()).cloned() else {
                return false;
            };
            state.initialized = true;
            state.is_loading = true;
            (client, state.mount, state.revision)
        };

        debug!(session = %self.shared.session_id, client = %client, "Hydrating form");
        let result = self.shared.store.fetch(&client, &self.shared.form_type).await;

        let mut state = self.lock();
        if state.mount != mount {
            debug!(session = %self.shared.session_id, "Dropping fetch for a previous client");
            return true;
        }
        state.is_loading = false;

        match result {
            Ok(fetched) => {
                if let Some(record) = fetched.into_latest() {
                    state.remote_data = record.clone();
                    if state.revision == revision {
                        state.local_buffer = record.clone();
                        state.is_dirty = false;
                    } else {
                        // Edits made while loading win over the fetched values.
                        let edits = std::mem::replace(&mut state.local_buffer, record.clone());
                        state.local_buffer.extend(edits);
                    }
                    state.revision += 1;
                    drop(state);
                    info!(
                        session = %self.shared.session_id,
                        form = %self.shared.form_type,
                        client = %client,
                        "Hydrated form"
                    );
                    self.shared
                        .publish(Some(client), FormEventKind::Hydrated(record));
                }
            }
            Err(e) => {
                let message = describe_failure(&e, "load", &self.shared.form_type);
                warn!(
                    session = %self.shared.session_id,
                    form = %self.shared.form_type,
                    client = %client,
                    "Failed to load form: {}",
                    e
                );
                state.remote_error = Some(message);
            }
        }
        true
    }

    /// Switch to another subject without tearing the session down.
    ///
    /// Resets the form and re-arms the hydrate guard for the new client.
    pub fn switch_client(&self, client_id: Option<ClientId>) {
        self.reset_form();
        let mut state = self.lock();
        state.client_id = client_id;
        state.remote_data.clear();
        state.remote_error = None;
        state.is_loading = false;
        state.initialized = false;
        state.mount += 1;
    }

    /// Cancel any pending auto-save. Called when the owning view goes away.
    pub fn teardown(&self) {
        if self.timer().cancel_pending() {
            debug!(session = %self.shared.session_id, "Pending auto-save cancelled on teardown");
        }
    }

    // -------------------------------------------------------------------------
    // Edits
    // -------------------------------------------------------------------------

    /// Set one field in the buffer.
    pub fn update_field(&self, name: impl Into<String>, value: Value) {
        let mut changes = FormData::new();
        changes.insert(name.into(), value);
        self.apply_changes(changes);
    }

    /// Set several fields in a single state transition.
    pub fn update_fields(&self, changes: FormData) {
        if changes.is_empty() {
            return;
        }
        self.apply_changes(changes);
    }

    fn apply_changes(&self, changes: FormData) {
        let client = {
            let mut state = self.lock();
            state
                .local_buffer
                .extend(changes.iter().map(|(k, v)| (k.clone(), v.clone())));
            state.is_dirty = true;
            state.revision += 1;
            state.local_errors.clear();
            // A new edit supersedes the last save.
            state.save_success = false;
            state.client_id.clone()
        };
        self.shared
            .publish(client, FormEventKind::FieldsChanged(changes));
        self.schedule_auto_save();
    }

    fn schedule_auto_save(&self) {
        if !self.shared.auto_save_enabled {
            return;
        }
        let shared = Arc::clone(&self.shared);
        self.timer()
            .schedule(self.shared.auto_save_delay, async move {
                shared.run_auto_save().await;
            });
    }

    /// Run the auto-save check now instead of waiting for the timer.
    pub async fn flush_auto_save(&self) -> AutoSaveOutcome {
        self.timer().cancel_pending();
        self.shared.run_auto_save().await
    }

    // -------------------------------------------------------------------------
    // Saves
    // -------------------------------------------------------------------------

    /// Validate and save the buffer as a completed form.
    ///
    /// `additional_fields` are merged over the buffer before the completion
    /// metadata is stamped.
    pub async fn submit_form(&self, additional_fields: FormData) -> SubmitOutcome {
        let (client, payload, revision) = {
            let mut state = self.lock();
            let errors = self
                .shared
                .validator
                .validate_with_client(&state.local_buffer, state.client_id.as_ref());
            if !errors.is_empty() {
                debug!(
                    session = %self.shared.session_id,
                    count = errors.len(),
                    "Submit blocked by validation"
                );
                state.local_errors = errors.clone();
                return SubmitOutcome::failed(errors);
            }
            let Some(client) = present_client(state.client_id.as_ref()).cloned() else {
                let errors = vec![NO_CLIENT_SELECTED.to_string()];
                state.local_errors = errors.clone();
                return SubmitOutcome::failed(errors);
            };

            let mut payload = state.local_buffer.clone();
            payload.extend(additional_fields);
            payload.insert(
                STATUS_KEY.to_string(),
                Value::String(FormStatus::Completed.to_string()),
            );
            payload.insert(
                SUBMITTED_AT_KEY.to_string(),
                Value::String(timestamp(Utc::now())),
            );
            payload.insert(
                FORM_VERSION_KEY.to_string(),
                Value::String(self.shared.form_version.clone()),
            );

            state.local_errors.clear();
            state.save_success = false;
            state.is_saving = true;
            (client, payload, state.revision)
        };

        self.persist(client, payload, revision, FormStatus::Completed)
            .await
    }

    /// Save the buffer as a draft. Rule validation is skipped; a client is
    /// still required.
    pub async fn save_draft(&self) -> SubmitOutcome {
        let (client, payload, revision) = {
            let mut state = self.lock();
            let Some(client) = present_client(state.client_id.as_ref()).cloned() else {
                let errors = vec![NO_CLIENT_SELECTED.to_string()];
                state.local_errors = errors.clone();
                return SubmitOutcome::failed(errors);
            };

            let mut payload = state.local_buffer.clone();
            payload.insert(
                STATUS_KEY.to_string(),
                Value::String(FormStatus::Draft.to_string()),
            );

            state.local_errors.clear();
            state.save_success = false;
            state.is_saving = true;
            (client, payload, state.revision)
        };

        self.persist(client, payload, revision, FormStatus::Draft)
            .await
    }

    async fn persist(
        &self,
        client: ClientId,
        payload: FormData,
        revision: u64,
        status: FormStatus,
    ) -> SubmitOutcome {
        let form_type = &self.shared.form_type;
        let result = self.shared.store.save(&client, form_type, payload).await;

        let mut state = self.lock();
        state.is_saving = false;

        match result {
            Ok(record) => {
                state.local_errors.clear();
                state.remote_error = None;
                state.save_success = true;
                state.remote_data = record.clone();
                // Edits made while the save was in flight stay dirty.
                let untouched = state.revision == revision;
                if untouched {
                    state.local_buffer = record.clone();
                    state.is_dirty = false;
                }
                drop(state);
                if untouched {
                    self.timer().cancel_pending();
                }

                info!(
                    session = %self.shared.session_id,
                    form = %form_type,
                    client = %client,
                    status = %status,
                    "Form saved"
                );
                let kind = match status {
                    FormStatus::Completed => FormEventKind::Submitted(record),
                    FormStatus::Draft => FormEventKind::DraftSaved(record),
                };
                self.shared.publish(Some(client), kind);
                SubmitOutcome::succeeded()
            }
            Err(e) => {
                let operation = match status {
                    FormStatus::Completed => "submit",
                    FormStatus::Draft => "save draft of",
                };
                let message = describe_failure(&e, operation, form_type);
                warn!(
                    session = %self.shared.session_id,
                    form = %form_type,
                    client = %client,
                    "Save failed: {}",
                    e
                );
                state.local_errors = vec![message.clone()];
                SubmitOutcome::failed(vec![message])
            }
        }
    }

    /// Derived statistics from the store, or a display message on failure.
    pub async fn fetch_summary(&self) -> Result<FormSummary, String> {
        let client = present_client(self.lock().client_id.as_ref()).cloned();
        let Some(client) = client else {
            return Err(NO_CLIENT_SELECTED.to_string());
        };
        self.shared
            .store
            .fetch_summary(&client, &self.shared.form_type)
            .await
            .map_err(|e| describe_failure(&e, "load summary for", &self.shared.form_type))
    }

    // -------------------------------------------------------------------------
    // Signals
    // -------------------------------------------------------------------------

    /// Clear local and remote error messages.
    pub fn clear_form_errors(&self) {
        let mut state = self.lock();
        state.local_errors.clear();
        state.remote_error = None;
    }

    /// Dismiss the "save succeeded" signal.
    pub fn clear_success_state(&self) {
        self.lock().save_success = false;
    }

    /// Discard the buffer, errors, dirty flag and success signal.
    pub fn reset_form(&self) {
        self.timer().cancel_pending();
        let client = {
            let mut state = self.lock();
            state.local_buffer.clear();
            state.local_errors.clear();
            state.is_dirty = false;
            state.save_success = false;
            state.revision += 1;
            state.last_auto_saved_serialization = None;
            state.last_auto_saved_at = None;
            state.client_id.clone()
        };
        self.shared.publish(client, FormEventKind::Reset);
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    pub fn session_id(&self) -> Uuid {
        self.shared.session_id
    }

    pub fn form_type(&self) -> &FormType {
        &self.shared.form_type
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.lock().client_id.clone()
    }

    /// Snapshot of the working copy.
    pub fn form_data(&self) -> FormData {
        self.lock().local_buffer.clone()
    }

    pub fn field(&self, name: &str) -> Option<Value> {
        self.lock().local_buffer.get(name).cloned()
    }

    /// Last-known-good data from the store.
    pub fn remote_data(&self) -> FormData {
        self.lock().remote_data.clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.lock().is_dirty
    }

    pub fn is_loading(&self) -> bool {
        self.lock().is_loading
    }

    pub fn is_saving(&self) -> bool {
        self.lock().is_saving
    }

    pub fn save_success(&self) -> bool {
        self.lock().save_success
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    pub fn local_errors(&self) -> Vec<String> {
        self.lock().local_errors.clone()
    }

    /// Error from the last failed fetch, if any.
    pub fn remote_error(&self) -> Option<String> {
        self.lock().remote_error.clone()
    }

    /// Local errors followed by the remote error.
    pub fn errors(&self) -> Vec<String> {
        let state = self.lock();
        state
            .local_errors
            .iter()
            .cloned()
            .chain(state.remote_error.clone())
            .collect()
    }

    /// Recomputed from the buffer on every call.
    pub fn validation_errors(&self) -> Vec<String> {
        let state = self.lock();
        self.shared
            .validator
            .validate_with_client(&state.local_buffer, state.client_id.as_ref())
    }

    /// Flag for navigation guards: dirty and not just saved.
    pub fn has_unsaved_changes(&self) -> bool {
        let state = self.lock();
        state.is_dirty && !state.save_success
    }

    pub fn last_auto_saved_at(&self) -> Option<String> {
        self.lock().last_auto_saved_at.clone()
    }

    pub fn is_auto_save_pending(&self) -> bool {
        self.timer().is_pending()
    }

    // -------------------------------------------------------------------------
    // Subscriptions
    // -------------------------------------------------------------------------

    pub fn subscribe(&self) -> broadcast::Receiver<FormEvent> {
        self.shared.events.subscribe()
    }

    /// Event stream; lagging receivers see `Err` items rather than blocking.
    pub fn updates(&self) -> BroadcastStream<FormEvent> {
        BroadcastStream::new(self.subscribe())
    }
}

impl Drop for FormSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Store's own message when it has one, else a generic line naming the
/// operation and form.
fn describe_failure(error: &StoreError, operation: &str, form_type: &FormType) -> String {
    error
        .user_message()
        .unwrap_or_else(|| format!("Failed to {} {} form", operation, form_type))
}
