use async_trait::async_trait;

use crate::error::StoreResult;

/// Port for string key-value persistence
///
/// Snapshots are stored as JSON strings under their key. Implementations must
/// be safe to share between tasks.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Insert or overwrite a value
    async fn put(&self, key: &str, value: String) -> StoreResult<()>;

    /// Get a value, `None` if the key is absent
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// All keys starting with `prefix`, in no particular order
    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Remove a key; returns whether it existed
    async fn delete(&self, key: &str) -> StoreResult<bool>;
}
