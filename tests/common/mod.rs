#![allow(dead_code)]

use async_trait::async_trait;
use catchup::TrackerError;
use catchup::clients::credentials::{CredentialStore, TokenSet};
use catchup::clients::mal::{MalClient, MalClientConfig};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory credential store that counts refreshes and records writes.
pub struct MemoryStore {
    initial: Option<TokenSet>,
    refreshed: Option<TokenSet>,
    refresh_calls: AtomicUsize,
    refresh_tokens_sent: Mutex<Vec<String>>,
    persisted: Mutex<Vec<TokenSet>>,
    fail_persist: bool,
}

impl MemoryStore {
    pub fn new(initial: Option<TokenSet>, refreshed: Option<TokenSet>) -> Self {
        Self {
            initial,
            refreshed,
            refresh_calls: AtomicUsize::new(0),
            refresh_tokens_sent: Mutex::new(Vec::new()),
            persisted: Mutex::new(Vec::new()),
            fail_persist: false,
        }
    }

    /// Refreshes like [`MemoryStore::refreshable`] but every write fails.
    pub fn unwritable() -> Self {
        Self {
            fail_persist: true,
            ..Self::refreshable()
        }
    }

    /// Holds "old" tokens and refreshes to "new" ones.
    pub fn refreshable() -> Self {
        Self::new(
            Some(TokenSet::new("old", "refresh-1")),
            Some(TokenSet::new("new", "refresh-2")),
        )
    }

    /// Holds "old" tokens; every refresh is rejected.
    pub fn expired() -> Self {
        Self::new(Some(TokenSet::new("old", "refresh-1")), None)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_tokens_sent(&self) -> Vec<String> {
        self.refresh_tokens_sent.lock().unwrap().clone()
    }

    pub fn persisted(&self) -> Vec<TokenSet> {
        self.persisted.lock().unwrap().clone()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn load(&self) -> Result<TokenSet, TrackerError> {
        self.initial
            .clone()
            .ok_or_else(|| TrackerError::CredentialsNotFound("memory".into()))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, TrackerError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refresh_tokens_sent
            .lock()
            .unwrap()
            .push(refresh_token.to_string());
        self.refreshed
            .clone()
            .ok_or_else(|| TrackerError::AuthExpired("invalid_grant".to_string()))
    }

    async fn persist(&self, tokens: &TokenSet) -> Result<(), TrackerError> {
        if self.fail_persist {
            return Err(TrackerError::CredentialWrite("disk full".to_string()));
        }
        self.persisted.lock().unwrap().push(tokens.clone());
        Ok(())
    }
}

pub fn mal_client(api_url: String, store: Arc<MemoryStore>) -> MalClient {
    MalClient::new(
        MalClientConfig {
            api_url,
            page_limit: 300,
            include_nsfw: true,
            timeout: Duration::from_secs(5),
        },
        store,
    )
    .expect("failed to build client")
}

pub fn catalog_node(id: i32, title: &str, day: Option<&str>, episodes: i32) -> Value {
    let mut node = json!({
        "id": id,
        "title": title,
        "main_picture": {"medium": format!("https://cdn.example/{id}m.jpg")},
        "num_episodes": episodes,
        "status": "currently_airing"
    });
    if let Some(day) = day {
        node["broadcast"] = json!({"day_of_the_week": day, "start_time": "23:00"});
    }
    json!({ "node": node })
}

pub fn watch_item(id: i32, watched: i32, score: i32) -> Value {
    json!({
        "node": {"id": id, "title": format!("Series {id}")},
        "list_status": {
            "status": "watching",
            "score": score,
            "num_episodes_watched": watched,
            "is_rewatching": false
        }
    })
}

pub fn page(items: Vec<Value>, next: Option<String>) -> Value {
    match next {
        Some(next) => json!({ "data": items, "paging": { "next": next } }),
        None => json!({ "data": items, "paging": {} }),
    }
}
