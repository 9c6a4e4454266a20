//! Cashcast Orchestrator
//!
//! Owns every mutation of the live models:
//!
//! ```text
//!  check_for_new_data ─┐
//!  stream bridge ──────┼─► enqueue ─► [ FIFO queue ] ─► worker ─► BayesianUpdateEngine
//!  force_resync ───────┘                                  │
//!                                                         ├─► ModelPersistenceStore (snapshot)
//!                                                         ├─► AnomalyDetector
//!                                                         └─► ModelSyncSink (optional)
//!
//!  every step ─► EventBus ─► Subscription / Listener
//! ```

pub mod anomaly;
pub mod bus;
pub mod error;
pub mod events;
pub mod model;
pub mod orchestrator;
pub mod registry;
pub mod validation;

// Re-export commonly used types
pub use anomaly::{Anomaly, AnomalyDetector, DEFAULT_MIN_UPSIZE_PCT, DEFAULT_SIGMA_THRESHOLD};
pub use bus::{EventBus, Listener, Subscription};
pub use error::{OrchestratorError, Result};
pub use events::OrchestratorEvent;
pub use model::SharedModel;
pub use orchestrator::{
    AutoUpdateHandle, MIN_UPDATE_INTERVAL, OrchestratorBuilder, OrchestratorSettings,
    UpdateOrchestrator, WorkBatch,
};
pub use registry::ModelRegistry;
pub use validation::{ValidationIssue, ValidationReport, validate};
