use crate::core::draft::DraftCollection;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory draft collection, lost when the process exits
pub struct MemoryCollection {
    inner: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for MemoryCollection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DraftCollection for MemoryCollection {
    async fn get(&self, key: &str) -> Option<String> {
        let drafts = self.inner.lock().await;
        let value = drafts.get(key).cloned();
        if value.is_some() {
            debug!("Draft HIT for key: {}", key);
        } else {
            debug!("Draft MISS for key: {}", key);
        }
        value
    }

    async fn put(&self, key: &str, value: String) -> Result<()> {
        let mut drafts = self.inner.lock().await;
        debug!("Draft PUT for key: {}", key);
        drafts.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) {
        let mut drafts = self.inner.lock().await;
        drafts.remove(key);
        debug!("Draft REMOVE for key: {}", key);
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let drafts = self.inner.lock().await;
        let mut keys: Vec<String> = drafts
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}
