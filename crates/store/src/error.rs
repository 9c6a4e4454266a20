use cashcast_ports::StoreError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PersistenceError {
    /// Absent, unparseable, or failing the model invariants
    #[error("Snapshot not found: {0}")]
    NotFound(String),

    #[error("Failed to serialize snapshot: {0}")]
    Serialize(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, PersistenceError>;
