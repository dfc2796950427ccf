use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use base64::Engine;
use tokio::sync::Mutex;

use crate::agent::pixels;
use crate::storage::{ImageStore, STORE_SCHEME};

/// Size of the placeholder drawn when a reference cannot be fetched.
const PLACEHOLDER_DIM: u32 = 512;

const CACHE_MAX_ENTRIES: usize = 64;
const CACHE_MAX_BYTES: usize = 64 * 1024 * 1024;

/// Bounded blob cache keyed by URL, oldest insertion evicted first.
#[derive(Default)]
pub struct ImageCache {
    entries: HashMap<String, Vec<u8>>,
    order: VecDeque<String>,
    total_bytes: usize,
}

impl ImageCache {
    pub fn get(&self, url: &str) -> Option<Vec<u8>> {
        self.entries.get(url).cloned()
    }

    pub fn insert(&mut self, url: &str, bytes: Vec<u8>) {
        if bytes.len() > CACHE_MAX_BYTES {
            return;
        }
        if let Some(old) = self.entries.remove(url) {
            self.total_bytes -= old.len();
            self.order.retain(|k| k != url);
        }
        self.total_bytes += bytes.len();
        self.entries.insert(url.to_string(), bytes);
        self.order.push_back(url.to_string());

        while self.entries.len() > CACHE_MAX_ENTRIES || self.total_bytes > CACHE_MAX_BYTES {
            let Some(oldest) = self.order.pop_front() else { break };
            if let Some(bytes) = self.entries.remove(&oldest) {
                self.total_bytes -= bytes.len();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolves a message's image URL to raw bytes. Three URL shapes are
/// supported: inline base64 data URLs, `store://` paths into the local object
/// store, and best-effort direct HTTP fetch for anything else. Failures never
/// propagate; the caller always receives a decodable placeholder instead.
#[derive(Clone)]
pub struct ImageResolver {
    store: ImageStore,
    http: reqwest::Client,
    cache: Arc<Mutex<ImageCache>>,
}

impl ImageResolver {
    pub fn new(store: ImageStore, http: reqwest::Client, cache: Arc<Mutex<ImageCache>>) -> Self {
        ImageResolver { store, http, cache }
    }

    pub async fn resolve(&self, url: &str) -> Vec<u8> {
        // Data URLs decode directly and are not cached; the URL itself is
        // the payload, so caching would double the bytes held.
        if let Some(rest) = url.strip_prefix("data:") {
            return match decode_data_url(rest) {
                Some(bytes) => bytes,
                None => {
                    log::warn!("Malformed data URL, substituting placeholder");
                    pixels::placeholder_png(PLACEHOLDER_DIM, PLACEHOLDER_DIM)
                }
            };
        }

        if let Some(bytes) = self.cache.lock().await.get(url) {
            return bytes;
        }

        let fetched = if url.starts_with(STORE_SCHEME) {
            self.store.get(url).map_err(|e| e.to_string())
        } else if url.starts_with("http://") || url.starts_with("https://") {
            self.fetch_http(url).await
        } else {
            Err(format!("Unfetchable URL shape: {url}"))
        };

        match fetched {
            Ok(bytes) if !bytes.is_empty() => {
                self.cache.lock().await.insert(url, bytes.clone());
                bytes
            }
            Ok(_) => {
                log::warn!("Empty image at {}, substituting placeholder", url);
                pixels::placeholder_png(PLACEHOLDER_DIM, PLACEHOLDER_DIM)
            }
            Err(e) => {
                log::warn!("Failed to resolve image {}: {}", url, e);
                pixels::placeholder_png(PLACEHOLDER_DIM, PLACEHOLDER_DIM)
            }
        }
    }

    async fn fetch_http(&self, url: &str) -> Result<Vec<u8>, String> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| format!("fetch failed: {e}"))?;
        if !response.status().is_success() {
            return Err(format!("fetch returned {}", response.status()));
        }
        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| format!("body read failed: {e}"))
    }
}

fn decode_data_url(rest: &str) -> Option<Vec<u8>> {
    let (_mime, payload) = rest.split_once(";base64,")?;
    base64::engine::general_purpose::STANDARD.decode(payload).ok()
}
