//! # Store
//!
//! Redis in production, a JSON file in dev mode. Both sit behind [`Store`],
//! which the server builds once at startup and hands to every handler.
//!
//!
//!
//! ## Redis Layout
//!
//! - `snapbooth:votes` hash, item id → count. `HINCRBY` keeps increments atomic
//! - `snapbooth:spins` hash, `game:player` → spins used
//! - `snapbooth:entries` list of JSON entries, in upload order
//! - `snapbooth:media` set of media ids still present in storage
//! - `snapbooth:winner` JSON of the last recorded winner
//!
//! Every command touches a single key, nothing needs `MULTI`.
//!
//!
//!
//! ## Timeouts
//!
//! Each store call is bounded by `STORE_TIMEOUT_MS`. A timeout is reported as
//! [`StoreError::Timeout`], which callers must treat as "maybe not applied".
use std::{
    collections::{HashMap, HashSet},
    future::Future,
    path::PathBuf,
    time::Duration,
};

use chrono::{DateTime, Utc};
use prizes::Entry;
use redis::{
    AsyncCommands, Client, RedisError,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::timeout;
use tracing::info;

use crate::local::LocalStore;

const VOTES_KEY: &str = "snapbooth:votes";
const SPINS_KEY: &str = "snapbooth:spins";
const ENTRIES_KEY: &str = "snapbooth:entries";
const MEDIA_KEY: &str = "snapbooth:media";
const WINNER_KEY: &str = "snapbooth:winner";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    #[error("Local store error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Store timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerRecord {
    pub display_name: String,
    pub backing_media_id: String,
    pub picked_at: DateTime<Utc>,
}

impl From<&Entry> for WinnerRecord {
    fn from(entry: &Entry) -> Self {
        Self {
            display_name: entry.display_name.clone(),
            backing_media_id: entry.backing_media_id.clone(),
            picked_at: Utc::now(),
        }
    }
}

enum Backend {
    Redis(RedisStore),
    Local(LocalStore),
}

pub struct Store {
    backend: Backend,
    timeout: Duration,
}

macro_rules! dispatch {
    ($store:expr, $method:ident($($arg:expr),*)) => {
        $store
            .timed(async {
                match &$store.backend {
                    Backend::Redis(redis) => redis.$method($($arg),*).await,
                    Backend::Local(local) => local.$method($($arg),*).await,
                }
            })
            .await
    };
}

impl Store {
    pub async fn connect(
        redis_url: Option<&str>,
        data_path: PathBuf,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let backend = match redis_url {
            Some(url) => {
                info!("Connecting to Redis...");
                Backend::Redis(RedisStore::new(init_redis(url, timeout).await?))
            }
            None => {
                info!("REDIS_URL not set, using local store at {}", data_path.display());
                Backend::Local(LocalStore::open(data_path).await?)
            }
        };

        Ok(Self { backend, timeout })
    }

    /// Local store that never touches disk.
    pub fn memory(timeout: Duration) -> Self {
        Self {
            backend: Backend::Local(LocalStore::memory()),
            timeout,
        }
    }

    async fn timed<T>(
        &self,
        operation: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        timeout(self.timeout, operation)
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))?
    }

    pub async fn incr_votes(&self, item_id: &str) -> Result<u64, StoreError> {
        dispatch!(self, incr_votes(item_id))
    }

    pub async fn votes(&self, item_id: &str) -> Result<u64, StoreError> {
        dispatch!(self, votes(item_id))
    }

    pub async fn all_votes(&self) -> Result<HashMap<String, u64>, StoreError> {
        dispatch!(self, all_votes())
    }

    pub async fn reset_votes(&self) -> Result<(), StoreError> {
        dispatch!(self, reset_votes())
    }

    pub async fn incr_spins(&self, key: &str) -> Result<u32, StoreError> {
        dispatch!(self, incr_spins(key))
    }

    pub async fn reset_spins(&self) -> Result<(), StoreError> {
        dispatch!(self, reset_spins())
    }

    pub async fn push_entry(&self, entry: &Entry) -> Result<(), StoreError> {
        dispatch!(self, push_entry(entry))
    }

    pub async fn entries(&self) -> Result<Vec<Entry>, StoreError> {
        dispatch!(self, entries())
    }

    pub async fn clear_entries(&self) -> Result<(), StoreError> {
        dispatch!(self, clear_entries())
    }

    pub async fn add_media(&self, media_id: &str) -> Result<(), StoreError> {
        dispatch!(self, add_media(media_id))
    }

    pub async fn remove_media(&self, media_id: &str) -> Result<bool, StoreError> {
        dispatch!(self, remove_media(media_id))
    }

    pub async fn media_ids(&self) -> Result<HashSet<String>, StoreError> {
        dispatch!(self, media_ids())
    }

    pub async fn set_winner(&self, record: &WinnerRecord) -> Result<(), StoreError> {
        dispatch!(self, set_winner(record))
    }

    pub async fn winner(&self) -> Result<Option<WinnerRecord>, StoreError> {
        dispatch!(self, winner())
    }
}

#[cfg(test)]
impl Store {
    /// Holds the local backend's lock, every call waits until the guard drops.
    pub(crate) async fn stall(&self) -> tokio::sync::MutexGuard<'_, crate::local::Snapshot> {
        match &self.backend {
            Backend::Local(local) => local.lock().await,
            Backend::Redis(_) => panic!("only the local backend can be stalled"),
        }
    }
}

pub async fn init_redis(redis_url: &str, timeout: Duration) -> Result<ConnectionManager, StoreError> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(timeout)
        .set_response_timeout(timeout);

    let client = Client::open(redis_url)?;
    let connection_manager = client.get_connection_manager_with_config(config).await?;

    Ok(connection_manager)
}

pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }

    async fn incr_votes(&self, item_id: &str) -> Result<u64, StoreError> {
        let mut connection = self.connection.clone();
        let count: u64 = connection.hincr(VOTES_KEY, item_id, 1).await?;

        Ok(count)
    }

    async fn votes(&self, item_id: &str) -> Result<u64, StoreError> {
        let mut connection = self.connection.clone();
        let count: Option<u64> = connection.hget(VOTES_KEY, item_id).await?;

        Ok(count.unwrap_or(0))
    }

    async fn all_votes(&self) -> Result<HashMap<String, u64>, StoreError> {
        let mut connection = self.connection.clone();
        let counts: HashMap<String, u64> = connection.hgetall(VOTES_KEY).await?;

        Ok(counts)
    }

    async fn reset_votes(&self) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let _: () = connection.del(VOTES_KEY).await?;

        Ok(())
    }

    async fn incr_spins(&self, key: &str) -> Result<u32, StoreError> {
        let mut connection = self.connection.clone();
        let used: u32 = connection.hincr(SPINS_KEY, key, 1).await?;

        Ok(used)
    }

    async fn reset_spins(&self) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let _: () = connection.del(SPINS_KEY).await?;

        Ok(())
    }

    async fn push_entry(&self, entry: &Entry) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let _: () = connection
            .rpush(ENTRIES_KEY, serde_json::to_string(entry)?)
            .await?;

        Ok(())
    }

    async fn entries(&self) -> Result<Vec<Entry>, StoreError> {
        let mut connection = self.connection.clone();
        let raw: Vec<String> = connection.lrange(ENTRIES_KEY, 0, -1).await?;

        raw.iter()
            .map(|json| serde_json::from_str(json).map_err(StoreError::from))
            .collect()
    }

    async fn clear_entries(&self) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let _: () = connection.del(ENTRIES_KEY).await?;

        Ok(())
    }

    async fn add_media(&self, media_id: &str) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let _: () = connection.sadd(MEDIA_KEY, media_id).await?;

        Ok(())
    }

    async fn remove_media(&self, media_id: &str) -> Result<bool, StoreError> {
        let mut connection = self.connection.clone();
        let removed: u32 = connection.srem(MEDIA_KEY, media_id).await?;

        Ok(removed > 0)
    }

    async fn media_ids(&self) -> Result<HashSet<String>, StoreError> {
        let mut connection = self.connection.clone();
        let ids: HashSet<String> = connection.smembers(MEDIA_KEY).await?;

        Ok(ids)
    }

    async fn set_winner(&self, record: &WinnerRecord) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let _: () = connection
            .set(WINNER_KEY, serde_json::to_string(record)?)
            .await?;

        Ok(())
    }

    async fn winner(&self) -> Result<Option<WinnerRecord>, StoreError> {
        let mut connection = self.connection.clone();
        let raw: Option<String> = connection.get(WINNER_KEY).await?;

        Ok(raw.map(|json| serde_json::from_str(&json)).transpose()?)
    }
}
