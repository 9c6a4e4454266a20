use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use cashcast_ports::{KeyValueStore, StoreError, StoreResult};
use tokio::fs;

const EXTENSION: &str = "json";

/// Key-value store keeping one file per key in a directory
///
/// Writes go to a temporary file first and are renamed into place, so a
/// reader never sees a half-written value.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    root: PathBuf,
}

fn io_error(err: std::io::Error) -> StoreError {
    StoreError::Io(err.to_string())
}

fn validate_key(key: &str) -> StoreResult<()> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

impl FileKeyValueStore {
    /// Open (creating if needed) a store rooted at `root`
    pub async fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await.map_err(io_error)?;
        log::debug!("File store opened at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(format!("{key}.{EXTENSION}")))
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn put(&self, key: &str, value: String) -> StoreResult<()> {
        let path = self.path_for(key)?;
        let tmp = self.root.join(format!(".{key}.tmp"));
        fs::write(&tmp, value).await.map_err(io_error)?;
        fs::rename(&tmp, &path).await.map_err(io_error)
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error(err)),
        }
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut entries = fs::read_dir(&self.root).await.map_err(io_error)?;
        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(key) = name.strip_suffix(".json")
                && !key.starts_with('.')
                && key.starts_with(prefix)
            {
                keys.push(key.to_string());
            }
        }
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(io_error(err)),
        }
    }
}
