use crate::core::draft::DraftCollection;
use anyhow::{Context, Result};
use async_trait::async_trait;
use fjall::PartitionHandle;
use tracing::debug;

/// Draft collection persisted in a fjall partition
pub struct DiskCollection {
    partition: PartitionHandle,
}

impl DiskCollection {
    pub fn new(partition: PartitionHandle) -> Self {
        Self { partition }
    }
}

#[async_trait]
impl DraftCollection for DiskCollection {
    async fn get(&self, key: &str) -> Option<String> {
        let res: Result<Option<String>> = (|| {
            if let Some(value) = self.partition.get(key.as_bytes())? {
                debug!("Draft HIT for key: {}", key);
                return Ok(Some(String::from_utf8(value.to_vec())?));
            }
            debug!("Draft MISS for key: {}", key);
            Ok(None)
        })();

        match res {
            Ok(val) => val,
            Err(e) => {
                debug!("DiskCollection get error: {}", e);
                None
            }
        }
    }

    async fn put(&self, key: &str, value: String) -> Result<()> {
        self.partition
            .insert(key.as_bytes(), value.as_bytes())
            .with_context(|| format!("Failed to store draft: {key}"))?;
        debug!("Draft PUT for key: {}", key);
        Ok(())
    }

    async fn remove(&self, key: &str) {
        if let Err(e) = self.partition.remove(key.as_bytes()) {
            debug!("DiskCollection remove error: {}", e);
        }
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut keys = Vec::new();
        for item in self.partition.prefix(prefix.as_bytes()) {
            match item {
                Ok((key, _)) => keys.push(String::from_utf8_lossy(&key).into_owned()),
                Err(e) => {
                    debug!("DiskCollection scan error: {}", e);
                    break;
                }
            }
        }
        keys
    }
}
