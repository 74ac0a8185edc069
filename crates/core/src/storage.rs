//! Persistence seam for the loyalty ledger: a key-value store holding one
//! opaque serialized snapshot.

use crate::error::StorefrontResult;
use crate::loyalty::{LoyaltyTransaction, UserLoyalty};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current snapshot layout version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Key-value backend the ledger mirrors its state into.
pub trait LedgerStore: Send + Sync {
    /// Read the blob stored under `key`, if any.
    fn load(&self, key: &str) -> StorefrontResult<Option<String>>;

    /// Overwrite the blob stored under `key`.
    fn save(&self, key: &str, blob: &str) -> StorefrontResult<()>;

    /// Cheap reachability check used by the readiness endpoint.
    fn ping(&self) -> StorefrontResult<()> {
        Ok(())
    }
}

/// Everything the ledger persists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerSnapshot {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub users: BTreeMap<String, UserLoyalty>,
    /// Global log across all users, in insertion order.
    #[serde(default)]
    pub transactions: Vec<LoyaltyTransaction>,
}

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

impl Default for LedgerSnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            users: BTreeMap::new(),
            transactions: Vec::new(),
        }
    }
}

impl LedgerSnapshot {
    pub fn from_blob(blob: &str) -> StorefrontResult<Self> {
        Ok(serde_json::from_str(blob)?)
    }
}
