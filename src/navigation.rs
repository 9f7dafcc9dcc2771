//! Unsaved-changes navigation guard
//!
//! Keeps exactly one host "leave page?" hook registered while a session has
//! unsaved changes, and none otherwise. The host side is abstracted behind
//! [`UnloadHooks`] so the guard works with any shell.

use std::sync::Arc;

use tracing::debug;

use crate::session::FormSession;

/// Default prompt shown by the host
pub const DEFAULT_UNSAVED_MESSAGE: &str =
    "You have unsaved changes. Are you sure you want to leave?";

/// Identifier returned by the host for a registered hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(pub u64);

/// Host adapter for before-unload style prompts
pub trait UnloadHooks: Send + Sync {
    fn attach(&self, message: &str) -> HookId;
    fn detach(&self, hook: HookId);
}

pub struct NavigationGuard {
    hooks: Arc<dyn UnloadHooks>,
    message: String,
    attached: Option<HookId>,
}

impl std::fmt::Debug for NavigationGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigationGuard")
            .field("message", &self.message)
            .field("attached", &self.attached)
            .finish()
    }
}

impl NavigationGuard {
    pub fn new(hooks: Arc<dyn UnloadHooks>, message: impl Into<String>) -> Self {
        Self {
            hooks,
            message: message.into(),
            attached: None,
        }
    }

    pub fn with_default_message(hooks: Arc<dyn UnloadHooks>) -> Self {
        Self::new(hooks, DEFAULT_UNSAVED_MESSAGE)
    }

    /// Attach or detach to match `has_unsaved_changes`. Idempotent.
    pub fn sync(&mut self, has_unsaved_changes: bool) {
        match (has_unsaved_changes, self.attached) {
            (true, None) => {
                let hook = self.hooks.attach(&self.message);
                debug!(hook = hook.0, "Unsaved-changes guard attached");
                self.attached = Some(hook);
            }
            (false, Some(hook)) => {
                self.hooks.detach(hook);
                debug!(hook = hook.0, "Unsaved-changes guard detached");
                self.attached = None;
            }
            _ => {}
        }
    }

    /// Shorthand for `sync(session.has_unsaved_changes())`.
    pub fn sync_with(&mut self, session: &FormSession) {
        self.sync(session.has_unsaved_changes());
    }

    pub fn is_armed(&self) -> bool {
        self.attached.is_some()
    }
}

impl Drop for NavigationGuard {
    fn drop(&mut self) {
        self.sync(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::FormSessionOptions;
    use crate::store::InMemoryFormStore;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingHooks {
        next: Mutex<u64>,
        active: Mutex<Vec<(HookId, String)>>,
    }

    impl RecordingHooks {
        fn active(&self) -> Vec<(HookId, String)> {
            self.active.lock().unwrap().clone()
        }
    }

    impl UnloadHooks for RecordingHooks {
        fn attach(&self, message: &str) -> HookId {
            let mut next = self.next.lock().unwrap();
            *next += 1;
            let hook = HookId(*next);
            self.active.lock().unwrap().push((hook, message.to_string()));
            hook
        }

        fn detach(&self, hook: HookId) {
            self.active.lock().unwrap().retain(|(id, _)| *id != hook);
        }
    }

    #[test]
    fn test_single_hook_while_dirty() {
        let hooks = Arc::new(RecordingHooks::default());
        let mut guard = NavigationGuard::with_default_message(hooks.clone());

        guard.sync(true);
        guard.sync(true);
        assert_eq!(hooks.active().len(), 1);
        assert_eq!(hooks.active()[0].1, DEFAULT_UNSAVED_MESSAGE);

        guard.sync(false);
        assert!(hooks.active().is_empty());
        assert!(!guard.is_armed());
    }

    #[test]
    fn test_drop_detaches() {
        let hooks = Arc::new(RecordingHooks::default());
        {
            let mut guard = NavigationGuard::new(hooks.clone(), "Leave the intake form?");
            guard.sync(true);
            assert_eq!(hooks.active().len(), 1);
        }
        assert!(hooks.active().is_empty());
    }

    #[tokio::test]
    async fn test_follows_session_state() {
        let hooks = Arc::new(RecordingHooks::default());
        let mut guard = NavigationGuard::with_default_message(hooks.clone());
        let session = FormSession::new(
            InMemoryFormStore::shared(),
            FormSessionOptions::new("intake").client("c-1").auto_save(false),
        );

        guard.sync_with(&session);
        assert!(!guard.is_armed());

        session.update_field("notes", json!("draft text"));
        guard.sync_with(&session);
        assert!(guard.is_armed());

        assert!(session.save_draft().await.success);
        guard.sync_with(&session);
        assert!(!guard.is_armed());
        assert!(hooks.active().is_empty());
    }
}
