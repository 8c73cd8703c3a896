//! Persisted client state.
//!
//! Only two things survive a reload: the guest bookmark list (local storage)
//! and the last AI-recommendation query with its result (session storage).
//! Both are UI conveniences; unreadable data is treated as absent.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

pub const BOOKMARKS_KEY: &str = "bookmarks";
pub const AI_RECOMMENDATION_KEY: &str = "ai_recommendation_state";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("write failed for {key}: {reason}")]
    Write { key: String, reason: String },
    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// String key/value store (browser `localStorage`/`sessionStorage`, or memory).
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

/// Bookmarks kept for visitors who are not signed in.
#[derive(Clone)]
pub struct GuestBookmarks {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for GuestBookmarks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestBookmarks").finish_non_exhaustive()
    }
}

impl GuestBookmarks {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Vec<i64> {
        let Some(raw) = self.store.get(BOOKMARKS_KEY) else {
            return Vec::new();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            log::warn!("[storage] ignoring unreadable {BOOKMARKS_KEY}: {e}");
            Vec::new()
        })
    }

    pub fn contains(&self, qual_id: i64) -> bool {
        self.list().contains(&qual_id)
    }

    /// Adds or removes `qual_id`; returns whether it is bookmarked afterwards.
    pub fn toggle(&self, qual_id: i64) -> Result<bool, StorageError> {
        let mut ids = self.list();
        let now_bookmarked = match ids.iter().position(|id| *id == qual_id) {
            Some(pos) => {
                ids.remove(pos);
                false
            }
            None => {
                ids.push(qual_id);
                true
            }
        };
        self.store.set(BOOKMARKS_KEY, &serde_json::to_string(&ids)?)?;
        Ok(now_bookmarked)
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.store.remove(BOOKMARKS_KEY)
    }
}

/// Snapshot restored when returning to the AI recommendation page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AiRecommendationState {
    pub major: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interest: Option<String>,
    /// Raw response payload as received.
    pub result: serde_json::Value,
}

#[derive(Clone)]
pub struct AiRecommendationCache {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for AiRecommendationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiRecommendationCache").finish_non_exhaustive()
    }
}

impl AiRecommendationCache {
    /// `store` should be session-scoped.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn load(&self) -> Option<AiRecommendationState> {
        let raw = self.store.get(AI_RECOMMENDATION_KEY)?;
        serde_json::from_str(&raw).ok()
    }

    pub fn save(&self, state: &AiRecommendationState) -> Result<(), StorageError> {
        self.store
            .set(AI_RECOMMENDATION_KEY, &serde_json::to_string(state)?)
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.store.remove(AI_RECOMMENDATION_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn toggle_round_trips_through_json() {
        let store = Arc::new(MemoryStore::new());
        let marks = GuestBookmarks::new(store.clone());
        assert!(marks.toggle(12).unwrap());
        assert!(marks.toggle(40).unwrap());
        assert!(!marks.toggle(12).unwrap());
        assert_eq!(marks.list(), vec![40]);
        assert_eq!(store.get(BOOKMARKS_KEY).as_deref(), Some("[40]"));
    }

    #[test]
    fn corrupt_bookmarks_read_as_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set(BOOKMARKS_KEY, "{not json").unwrap();
        let marks = GuestBookmarks::new(store);
        assert!(marks.list().is_empty());
        assert!(marks.toggle(3).unwrap());
        assert_eq!(marks.list(), vec![3]);
    }

    #[test]
    fn ai_cache_restores_last_query() {
        let cache = AiRecommendationCache::new(Arc::new(MemoryStore::new()));
        assert!(cache.load().is_none());
        let state = AiRecommendationState {
            major: "Computer Science".into(),
            interest: Some("security".into()),
            result: json!({"mode": "hybrid", "results": []}),
        };
        cache.save(&state).unwrap();
        assert_eq!(cache.load(), Some(state));
        cache.clear().unwrap();
        assert!(cache.load().is_none());
    }
}
