//! Cashcast Store
//!
//! Two [`KeyValueStore`](cashcast_ports::KeyValueStore) backends and the
//! snapshot store built on top of them:
//!
//! - [`InMemoryKeyValueStore`]: DashMap-backed, for tests and ephemeral runs
//! - [`FileKeyValueStore`]: one JSON file per key under a directory
//! - [`ModelPersistenceStore`]: versioned model snapshots with a bounded history

mod error;
mod file;
mod memory;
mod persistence;

pub use error::{PersistenceError, Result};
pub use file::FileKeyValueStore;
pub use memory::InMemoryKeyValueStore;
pub use persistence::{
    DEFAULT_MAX_SNAPSHOTS, ModelPersistenceStore, SnapshotInfo, snapshot_prefix,
};
