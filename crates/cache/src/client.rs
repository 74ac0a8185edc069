//! Redis-backed store: the ledger snapshot lives as a single string value.

use parking_lot::Mutex;
use redis::{Commands, RedisResult};
use std::time::Duration;
use storefront_core::config::StorageConfig;
use storefront_core::error::{StorefrontError, StorefrontResult};
use storefront_core::storage::LedgerStore;
use tracing::{debug, info, warn};

fn storage_err(err: redis::RedisError) -> StorefrontError {
    StorefrontError::Storage(err.to_string())
}

/// Redis key-value store for ledger snapshots. One connection is kept open
/// and reused; it is dropped on any command error and reopened on next use.
pub struct RedisStore {
    client: redis::Client,
    timeout: Duration,
    conn: Mutex<Option<redis::Connection>>,
}

impl RedisStore {
    /// Open a client and verify connectivity with PING.
    pub fn connect(config: &StorageConfig) -> StorefrontResult<Self> {
        info!(
            url = %config.redis_url,
            timeout_ms = config.connect_timeout_ms,
            "Connecting to Redis"
        );

        let client = redis::Client::open(config.redis_url.as_str()).map_err(storage_err)?;
        let store = Self {
            client,
            timeout: Duration::from_millis(config.connect_timeout_ms.max(1)),
            conn: Mutex::new(None),
        };

        let pong: String = store.with_connection(|conn| redis::cmd("PING").query(conn))?;
        info!(response = %pong, "Redis connection established");

        Ok(store)
    }

    fn open_connection(&self) -> RedisResult<redis::Connection> {
        let conn = self.client.get_connection_with_timeout(self.timeout)?;
        conn.set_read_timeout(Some(self.timeout))?;
        conn.set_write_timeout(Some(self.timeout))?;
        metrics::counter!("storage.connections", "backend" => "redis").increment(1);
        Ok(conn)
    }

    /// Run `f` on the shared connection, opening it first if needed.
    fn with_connection<T, F>(&self, f: F) -> StorefrontResult<T>
    where
        F: FnOnce(&mut redis::Connection) -> RedisResult<T>,
    {
        let mut slot = self.conn.lock();
        let mut conn = match slot.take() {
            Some(conn) => conn,
            None => self.open_connection().map_err(storage_err)?,
        };

        match f(&mut conn) {
            Ok(value) => {
                *slot = Some(conn);
                Ok(value)
            }
            Err(e) => {
                warn!(error = %e, "Redis command failed; dropping connection");
                Err(storage_err(e))
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.conn.lock().is_some()
    }
}

impl LedgerStore for RedisStore {
    fn load(&self, key: &str) -> StorefrontResult<Option<String>> {
        metrics::counter!("storage.reads", "backend" => "redis").increment(1);
        let blob: Option<String> = self.with_connection(|conn| conn.get(key))?;
        if blob.is_none() {
            debug!(key = key, "No stored snapshot");
        }
        Ok(blob)
    }

    fn save(&self, key: &str, blob: &str) -> StorefrontResult<()> {
        metrics::counter!("storage.writes", "backend" => "redis").increment(1);
        self.with_connection(|conn| conn.set::<_, _, ()>(key, blob))
    }

    fn ping(&self) -> StorefrontResult<()> {
        self.with_connection(|conn| redis::cmd("PING").query::<String>(conn))
            .map(|_| ())
    }
}
