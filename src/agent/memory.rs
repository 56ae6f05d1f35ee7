//! Per-session conversation memory.
//!
//! Keyed by an explicit session id threaded through every call — there is
//! no process-wide conversation state, and no fixed fallback id. Safe for
//! concurrent access from many in-flight requests; sessions never observe
//! each other's history.

use crate::llm::ChatMessage;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Concurrent map of session id to accumulated conversation context.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<HashMap<String, Vec<ChatMessage>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a session's context; empty for unknown sessions.
    pub fn load(&self, session_id: &str) -> Vec<ChatMessage> {
        let map = self.inner.lock().unwrap();
        map.get(session_id).cloned().unwrap_or_default()
    }

    /// Replace a session's context with the post-turn state.
    pub fn save(&self, session_id: &str, messages: Vec<ChatMessage>) {
        let mut map = self.inner.lock().unwrap();
        map.insert(session_id.to_string(), messages);
    }

    /// Drop a session's context entirely.
    #[allow(dead_code)] // Lifecycle hook for future thread deletion
    pub fn forget(&self, session_id: &str) {
        let mut map = self.inner.lock().unwrap();
        map.remove(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_session_is_empty() {
        let store = MemoryStore::new();
        assert!(store.load("nowhere").is_empty());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let store = MemoryStore::new();
        store.save("s1", vec![ChatMessage::user("hello")]);
        let loaded = store.load("s1");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].content, "hello");
    }

    #[test]
    fn test_sessions_are_isolated() {
        let store = MemoryStore::new();
        store.save("alpha", vec![ChatMessage::user("alpha secret")]);
        store.save("beta", vec![ChatMessage::user("beta secret")]);

        let alpha = store.load("alpha");
        assert_eq!(alpha.len(), 1);
        assert_eq!(alpha[0].content, "alpha secret");
        assert!(store.load("beta")[0].content.contains("beta"));
        assert!(store.load("gamma").is_empty());
    }

    #[test]
    fn test_save_replaces_previous_state() {
        let store = MemoryStore::new();
        store.save("s1", vec![ChatMessage::user("one")]);
        store.save(
            "s1",
            vec![ChatMessage::user("one"), ChatMessage::assistant("two")],
        );
        assert_eq!(store.load("s1").len(), 2);
    }

    #[test]
    fn test_forget() {
        let store = MemoryStore::new();
        store.save("s1", vec![ChatMessage::user("hello")]);
        store.forget("s1");
        assert!(store.load("s1").is_empty());
    }
}
