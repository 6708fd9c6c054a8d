pub mod disk;
pub mod memory;

use crate::core::draft::DraftCollection;
use anyhow::{Context, Result};
use disk::DiskCollection;
use fjall::{Keyspace, PartitionCreateOptions, PersistMode};
use memory::MemoryCollection;
use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, RwLock},
};
use tracing::debug;

/// Holds named draft collections, persisted in a fjall keyspace when one is
/// available and kept in memory otherwise.
pub struct KeyValueStore {
    collections: RwLock<HashMap<String, Arc<dyn DraftCollection>>>,
    keyspace: Option<Keyspace>,
}

impl KeyValueStore {
    pub fn open(data_path: &Path) -> Result<Self> {
        let path = data_path.join("drafts");
        let keyspace = fjall::Config::new(&path)
            .open()
            .with_context(|| format!("Failed to open draft store at {}", path.display()))?;
        debug!("Opened draft store at {}", path.display());

        Ok(Self {
            collections: RwLock::new(HashMap::new()),
            keyspace: Some(keyspace),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            keyspace: None,
        }
    }

    /// Returns the named collection, creating it on first use. Without a
    /// keyspace the collection lives in memory.
    pub fn get_collection(&self, name: &str) -> Result<Arc<dyn DraftCollection>> {
        {
            let collections = self.collections.read().unwrap_or_else(|e| e.into_inner());
            if let Some(collection) = collections.get(name) {
                return Ok(Arc::clone(collection));
            }
        }

        let collection: Arc<dyn DraftCollection> = match &self.keyspace {
            Some(keyspace) => {
                let partition = keyspace
                    .open_partition(name, PartitionCreateOptions::default())
                    .with_context(|| format!("Failed to open collection: {name}"))?;
                Arc::new(DiskCollection::new(partition))
            }
            None => Arc::new(MemoryCollection::new()),
        };

        let mut collections = self.collections.write().unwrap_or_else(|e| e.into_inner());
        Ok(Arc::clone(
            collections.entry(name.to_string()).or_insert(collection),
        ))
    }

    /// Flushes written drafts to disk. A no-op for in-memory stores.
    pub fn persist(&self) -> Result<()> {
        if let Some(keyspace) = &self.keyspace {
            keyspace
                .persist(PersistMode::SyncAll)
                .context("Failed to persist draft store")?;
        }
        Ok(())
    }
}
