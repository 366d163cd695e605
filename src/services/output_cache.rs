use axum::body::Bytes;
use axum::http::{HeaderValue, StatusCode};
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// A stored response body with the headers needed to replay it
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
    stored_at: Instant,
}

impl CachedResponse {
    pub fn new(status: StatusCode, content_type: Option<HeaderValue>, body: Bytes) -> Self {
        Self {
            status,
            content_type,
            body,
            stored_at: Instant::now(),
        }
    }
}

/// Whole-response cache for anonymous page views
pub struct OutputCache {
    entries: DashMap<String, CachedResponse>,
    duration: Duration,
    max_entries: usize,
}

impl OutputCache {
    pub fn new(duration: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            duration,
            max_entries,
        }
    }

    pub fn key(method: &str, path_and_query: &str, culture: &str) -> String {
        format!("{} {} {}", method, path_and_query, culture)
    }

    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        let entry = self.entries.get(key)?;
        if entry.stored_at.elapsed() <= self.duration {
            return Some(entry.value().clone());
        }
        drop(entry);
        self.entries.remove(key);
        None
    }

    /// Store `response` unless the cache is full of live entries
    pub fn insert(&self, key: String, response: CachedResponse) -> bool {
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(&key) {
            self.purge_expired();
            if self.entries.len() >= self.max_entries {
                tracing::debug!("Output cache full, not storing {}", key);
                return false;
            }
        }
        self.entries.insert(key, response);
        true
    }

    pub fn purge_expired(&self) {
        let duration = self.duration;
        self.entries
            .retain(|_, entry| entry.stored_at.elapsed() <= duration);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
