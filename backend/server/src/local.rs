//! Dev mode store. One JSON document, rewritten after every change.
use std::{
    collections::{BTreeSet, HashMap, HashSet},
    io::ErrorKind,
    path::PathBuf,
};

use prizes::Entry;
use serde::{Deserialize, Serialize};
use tokio::{fs, sync::Mutex};
use tracing::{info, warn};

use crate::database::{StoreError, WinnerRecord};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub(crate) struct Snapshot {
    #[serde(default)]
    votes: HashMap<String, u64>,
    #[serde(default)]
    spins: HashMap<String, u32>,
    #[serde(default)]
    entries: Vec<Entry>,
    #[serde(default)]
    media: BTreeSet<String>,
    #[serde(default)]
    winner: Option<WinnerRecord>,
}

pub struct LocalStore {
    path: Option<PathBuf>,
    data: Mutex<Snapshot>,
}

impl LocalStore {
    pub async fn open(path: PathBuf) -> Result<Self, StoreError> {
        let snapshot = match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("{} not found, starting empty", path.display());
                Snapshot::default()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path: Some(path),
            data: Mutex::new(snapshot),
        })
    }

    pub fn memory() -> Self {
        Self {
            path: None,
            data: Mutex::new(Snapshot::default()),
        }
    }

    /// Writes beside the target and renames over it, so a crash mid-write
    /// leaves the previous file intact.
    async fn persist(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let temp = path.with_extension("tmp");
        fs::write(&temp, serde_json::to_vec_pretty(snapshot)?).await?;
        fs::rename(&temp, path).await.inspect_err(|e| {
            warn!("Failed to persist {}: {e}", path.display());
        })?;

        Ok(())
    }

    /// Applies `change` to a copy and keeps it only once it is on disk, so a
    /// failed write leaves memory matching the file.
    async fn update<T>(&self, change: impl FnOnce(&mut Snapshot) -> T) -> Result<T, StoreError> {
        let mut data = self.data.lock().await;

        let mut next = data.clone();
        let output = change(&mut next);

        self.persist(&next).await?;
        *data = next;

        Ok(output)
    }

    #[cfg(test)]
    pub(crate) async fn lock(&self) -> tokio::sync::MutexGuard<'_, Snapshot> {
        self.data.lock().await
    }

    pub(crate) async fn incr_votes(&self, item_id: &str) -> Result<u64, StoreError> {
        self.update(|data| {
            let count = data.votes.entry(item_id.to_string()).or_insert(0);
            *count += 1;
            *count
        })
        .await
    }

    pub(crate) async fn votes(&self, item_id: &str) -> Result<u64, StoreError> {
        Ok(self
            .data
            .lock()
            .await
            .votes
            .get(item_id)
            .copied()
            .unwrap_or(0))
    }

    pub(crate) async fn all_votes(&self) -> Result<HashMap<String, u64>, StoreError> {
        Ok(self.data.lock().await.votes.clone())
    }

    pub(crate) async fn reset_votes(&self) -> Result<(), StoreError> {
        self.update(|data| data.votes.clear()).await
    }

    pub(crate) async fn incr_spins(&self, key: &str) -> Result<u32, StoreError> {
        self.update(|data| {
            let used = data.spins.entry(key.to_string()).or_insert(0);
            *used += 1;
            *used
        })
        .await
    }

    pub(crate) async fn reset_spins(&self) -> Result<(), StoreError> {
        self.update(|data| data.spins.clear()).await
    }

    pub(crate) async fn push_entry(&self, entry: &Entry) -> Result<(), StoreError> {
        self.update(|data| data.entries.push(entry.clone())).await
    }

    pub(crate) async fn entries(&self) -> Result<Vec<Entry>, StoreError> {
        Ok(self.data.lock().await.entries.clone())
    }

    pub(crate) async fn clear_entries(&self) -> Result<(), StoreError> {
        self.update(|data| data.entries.clear()).await
    }

    pub(crate) async fn add_media(&self, media_id: &str) -> Result<(), StoreError> {
        self.update(|data| {
            data.media.insert(media_id.to_string());
        })
        .await
    }

    pub(crate) async fn remove_media(&self, media_id: &str) -> Result<bool, StoreError> {
        self.update(|data| data.media.remove(media_id)).await
    }

    pub(crate) async fn media_ids(&self) -> Result<HashSet<String>, StoreError> {
        Ok(self.data.lock().await.media.iter().cloned().collect())
    }

    pub(crate) async fn set_winner(&self, record: &WinnerRecord) -> Result<(), StoreError> {
        self.update(|data| data.winner = Some(record.clone())).await
    }

    pub(crate) async fn winner(&self) -> Result<Option<WinnerRecord>, StoreError> {
        Ok(self.data.lock().await.winner.clone())
    }
}
