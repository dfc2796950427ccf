use std::collections::HashMap;
use std::sync::Arc;
use rusqlite::Connection;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::agent::resolver::ImageCache;
use crate::config::AiConfig;
use crate::storage::ImageStore;

pub struct AppState {
    /// SQLite database connection
    pub db: Arc<std::sync::Mutex<Connection>>,
    /// Shared HTTP client for the chat and image endpoints
    pub http: reqwest::Client,
    /// External endpoint configuration
    pub config: AiConfig,
    /// Filesystem-backed object store for design images
    pub store: ImageStore,
    /// Bounded blob cache for resolved reference images, keyed by URL
    pub image_cache: Arc<Mutex<ImageCache>>,
    /// In-flight design-chat turns keyed by chat ID, for cancellation and
    /// to keep a chat from running two turns at once
    pub active_turns: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl AppState {
    pub fn new(conn: Connection, config: AiConfig, store: ImageStore) -> Self {
        Self {
            db: Arc::new(std::sync::Mutex::new(conn)),
            http: reqwest::Client::new(),
            config,
            store,
            image_cache: Arc::new(Mutex::new(ImageCache::default())),
            active_turns: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        let conn = crate::db::migrations::init_memory_db().expect("in-memory schema");
        let dir = std::env::temp_dir().join(format!("gardenhub-test-{}", uuid::Uuid::new_v4()));
        Self::new(conn, AiConfig::default(), ImageStore::new(dir))
    }
}

// Implement Clone manually to allow state sharing in spawned tasks
impl Clone for AppState {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            http: self.http.clone(),
            config: self.config.clone(),
            store: self.store.clone(),
            image_cache: Arc::clone(&self.image_cache),
            active_turns: Arc::clone(&self.active_turns),
        }
    }
}
