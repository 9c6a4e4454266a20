//! Versioned model snapshots
//!
//! Layout inside the key-value store, for prefix `model`:
//!
//! ```text
//! model_1717200000000   -> ModelSnapshot JSON
//! model_1717200060000   -> ModelSnapshot JSON
//! latest_model_key      -> "model_1717200060000"
//! ```
//!
//! Other entities use the prefix `model_<entity>`. Keys of another entity
//! never parse under this prefix because the suffix must be all digits.

use std::sync::Arc;

use cashcast_core::{GLOBAL_ENTITY, ModelSnapshot, ModelState, Timestamp};
use cashcast_ports::{Clock, KeyValueStore};
use chrono::DateTime;
use parking_lot::Mutex;

use crate::error::{PersistenceError, Result};

/// Snapshots kept by default after each save
pub const DEFAULT_MAX_SNAPSHOTS: usize = 5;

const BASE_PREFIX: &str = "model";

/// Snapshot key prefix for an entity
pub fn snapshot_prefix(entity: &str) -> String {
    if entity == GLOBAL_ENTITY {
        BASE_PREFIX.to_string()
    } else {
        format!("{BASE_PREFIX}_{entity}")
    }
}

/// Listing entry for a stored snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotInfo {
    pub key: String,
    pub created_at: Timestamp,
    pub size_bytes: usize,
}

pub struct ModelPersistenceStore {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    prefix: String,
    pointer_key: String,
    max_snapshots: usize,
    /// Millis of the newest key handed out; `None` until first save
    last_millis: Mutex<Option<i64>>,
}

impl ModelPersistenceStore {
    /// Snapshot store for the global model
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_prefix(store, clock, BASE_PREFIX)
    }

    /// Snapshot store for one entity's namespace
    pub fn for_entity(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, entity: &str) -> Self {
        Self::with_prefix(store, clock, &snapshot_prefix(entity))
    }

    fn with_prefix(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, prefix: &str) -> Self {
        Self {
            store,
            clock,
            prefix: prefix.to_string(),
            pointer_key: format!("latest_{prefix}_key"),
            max_snapshots: DEFAULT_MAX_SNAPSHOTS,
            last_millis: Mutex::new(None),
        }
    }

    /// Number of snapshots retained after each save (at least one)
    pub fn with_max_snapshots(mut self, max_snapshots: usize) -> Self {
        self.max_snapshots = max_snapshots.max(1);
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn pointer_key(&self) -> &str {
        &self.pointer_key
    }

    pub fn max_snapshots(&self) -> usize {
        self.max_snapshots
    }

    fn key_for(&self, millis: i64) -> String {
        format!("{}_{millis}", self.prefix)
    }

    fn parse_key(&self, key: &str) -> Option<i64> {
        let suffix = key.strip_prefix(&self.prefix)?.strip_prefix('_')?;
        if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        suffix.parse().ok()
    }

    /// Snapshot keys with their millis, newest first
    async fn snapshot_keys(&self) -> Result<Vec<(i64, String)>> {
        let mut keys: Vec<(i64, String)> = self
            .store
            .list(&format!("{}_", self.prefix))
            .await?
            .into_iter()
            .filter_map(|key| self.parse_key(&key).map(|millis| (millis, key)))
            .collect();
        keys.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(keys)
    }

    /// Next key, strictly newer than every key handed out or already stored
    async fn next_key(&self) -> Result<(String, Timestamp)> {
        let first_save = self.last_millis.lock().is_none();
        let stored_newest = if first_save {
            self.snapshot_keys().await?.first().map(|(millis, _)| *millis)
        } else {
            None
        };

        let now = self.clock.now();
        let mut last = self.last_millis.lock();
        let floor = (*last).max(stored_newest).map_or(i64::MIN, |m| m + 1);
        let millis = now.timestamp_millis().max(floor);
        *last = Some(millis);
        Ok((self.key_for(millis), now))
    }

    /// Persist a snapshot of `state`, point the latest pointer at it and
    /// enforce the retention cap. Returns the new key.
    pub async fn save(&self, state: &ModelState) -> Result<String> {
        let (snapshot_key, created_at) = self.next_key().await?;
        let snapshot = ModelSnapshot {
            model_state: state.clone(),
            created_at,
            snapshot_key: snapshot_key.clone(),
        };
        let json = serde_json::to_string(&snapshot)
            .map_err(|e| PersistenceError::Serialize(e.to_string()))?;

        self.store.put(&snapshot_key, json).await?;
        self.store
            .put(&self.pointer_key, snapshot_key.clone())
            .await?;
        log::debug!(
            "Saved snapshot {} ({} observations)",
            snapshot_key,
            state.observation_count()
        );

        self.prune(self.max_snapshots).await?;
        Ok(snapshot_key)
    }

    /// Stored snapshots, newest first
    pub async fn list(&self) -> Result<Vec<SnapshotInfo>> {
        let mut infos = Vec::new();
        for (millis, key) in self.snapshot_keys().await? {
            let Some(value) = self.store.get(&key).await? else {
                continue;
            };
            let Some(created_at) = DateTime::from_timestamp_millis(millis) else {
                continue;
            };
            infos.push(SnapshotInfo {
                key,
                created_at,
                size_bytes: value.len(),
            });
        }
        Ok(infos)
    }

    /// Delete all but the newest `keep` snapshots; returns how many were deleted
    pub async fn prune(&self, keep: usize) -> Result<usize> {
        let mut deleted = 0;
        for (_, key) in self.snapshot_keys().await?.into_iter().skip(keep) {
            if self.store.delete(&key).await? {
                deleted += 1;
            }
        }
        if keep == 0 {
            self.store.delete(&self.pointer_key).await?;
        }
        if deleted > 0 {
            log::info!("Pruned {} snapshots under '{}'", deleted, self.prefix);
        }
        Ok(deleted)
    }

    /// Load and verify one snapshot
    pub async fn load(&self, key: &str) -> Result<ModelSnapshot> {
        let not_found = || PersistenceError::NotFound(key.to_string());

        let json = self.store.get(key).await?.ok_or_else(not_found)?;
        let snapshot: ModelSnapshot = serde_json::from_str(&json).map_err(|e| {
            log::warn!("Snapshot {} is unreadable: {}", key, e);
            not_found()
        })?;
        snapshot.model_state.check_invariants().map_err(|e| {
            log::warn!("Snapshot {} violates model invariants: {}", key, e);
            not_found()
        })?;
        Ok(snapshot)
    }

    /// Load the snapshot named by the latest pointer, else the newest stored one
    pub async fn load_latest(&self) -> Result<ModelSnapshot> {
        if let Some(key) = self.store.get(&self.pointer_key).await? {
            match self.load(&key).await {
                Ok(snapshot) => return Ok(snapshot),
                Err(PersistenceError::NotFound(_)) => {
                    log::warn!("Latest pointer names missing snapshot {}", key);
                }
                Err(e) => return Err(e),
            }
        }

        for (_, key) in self.snapshot_keys().await? {
            match self.load(&key).await {
                Ok(snapshot) => return Ok(snapshot),
                Err(PersistenceError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(PersistenceError::NotFound(self.pointer_key.clone()))
    }

    pub async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.store.delete(key).await?)
    }
}
