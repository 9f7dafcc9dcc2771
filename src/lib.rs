//! Intake Forms - form-state core for case-management intake
//!
//! Loads, buffers, validates, auto-saves and submits arbitrary form payloads
//! keyed by `(formType, clientID)`, plus progress helpers for wizard and
//! accordion style views.
//!
//! ## Call Chain
//! View edit -> FormSession buffer -> (debounced) auto-save -> FormStore
//! View submit -> Validator -> FormStore save -> SubmitOutcome
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use intake_forms::{FormSession, FormSessionOptions, InMemoryFormStore, ValidationRules};
//! use serde_json::json;
//!
//! # async fn demo() {
//! let store = InMemoryFormStore::shared();
//! let session = FormSession::new(
//!     store,
//!     FormSessionOptions::new("intake")
//!         .client("client-42")
//!         .rules(ValidationRules::new().required(["firstName"])),
//! );
//! session.hydrate().await;
//! session.update_field("firstName", json!("Ada"));
//! let outcome = session.submit_form(Default::default()).await;
//! assert!(outcome.success);
//! # }
//! ```

// Core error handling
pub mod error;

pub mod config;
pub mod telemetry;
pub mod types;

// Remote Form Store contract and adapters
pub mod store;

// Form state core
pub mod completion;
pub mod session;
pub mod timer;
pub mod validation;

// Progress helpers
pub mod accordion;
pub mod navigation;
pub mod stepper;

// Mock REST form store (when server is enabled)
#[cfg(feature = "server")]
pub mod server;

// Essential error types
pub use error::{ConfigError, FormError, FormResult, StoreError, StoreResult};

pub use config::{FormsConfig, MockServerConfig, StoreBackend};
pub use types::{ClientId, FetchedForm, FormData, FormStatus, FormSummary, FormType};

pub use store::{build_store, FormStore, HttpFormStore, InMemoryFormStore};

pub use completion::{calculate_form_completion, is_filled};
pub use session::{
    AutoSaveOutcome, FormEvent, FormEventKind, FormSession, FormSessionOptions, SubmitOutcome,
};
pub use timer::{CancellableTimer, TimerHandle};
pub use validation::{
    create_client_validator, create_validator, RuleVerdict, ValidationRules, Validator,
    NO_CLIENT_SELECTED,
};

pub use accordion::SectionRevealer;
pub use navigation::{HookId, NavigationGuard, UnloadHooks};
pub use stepper::{StepDescriptor, StepSequencer};

#[cfg(feature = "server")]
pub use server::MockFormStoreServer;
