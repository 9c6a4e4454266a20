use cashcast_core::CoreError;
use cashcast_ports::FetchError;
use cashcast_store::PersistenceError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrchestratorError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Persistence failed: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Model error: {0}")]
    Core(#[from] CoreError),

    #[error("Update worker has stopped")]
    Stopped,
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
