//! In-process key-value store backed by DashMap. Used for development and
//! tests; contents do not survive a restart.

use dashmap::DashMap;
use storefront_core::error::StorefrontResult;
use storefront_core::storage::LedgerStore;

/// Lock-free local store for serialized ledger snapshots.
#[derive(Default)]
pub struct LocalStore {
    store: DashMap<String, String>,
}

impl LocalStore {
    pub fn new() -> Self {
        Self {
            store: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl LedgerStore for LocalStore {
    fn load(&self, key: &str) -> StorefrontResult<Option<String>> {
        metrics::counter!("storage.reads", "backend" => "local").increment(1);
        Ok(self.store.get(key).map(|entry| entry.value().clone()))
    }

    fn save(&self, key: &str, blob: &str) -> StorefrontResult<()> {
        metrics::counter!("storage.writes", "backend" => "local").increment(1);
        self.store.insert(key.to_string(), blob.to_string());
        Ok(())
    }
}
