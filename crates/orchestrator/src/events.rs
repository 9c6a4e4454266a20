use std::time::Duration;

use cashcast_core::EntityId;

use crate::anomaly::Anomaly;

/// Lifecycle events published on the [`crate::EventBus`]
#[derive(Debug, Clone, PartialEq)]
pub enum OrchestratorEvent {
    NewDataDetected {
        count: usize,
    },
    UpdateStarted {
        entity: EntityId,
        batch_size: usize,
    },
    UpdateCompleted {
        entity: EntityId,
        observations_applied: usize,
        total_observations: u64,
        snapshot_key: Option<String>,
    },
    AnomaliesDetected {
        entity: EntityId,
        anomalies: Vec<Anomaly>,
    },
    SyncCompleted {
        entity: EntityId,
    },
    SyncFailed {
        entity: EntityId,
        error: String,
    },
    ForceResyncStarted {
        entity: EntityId,
    },
    ForceResyncCompleted {
        entity: EntityId,
        observation_count: u64,
        snapshot_key: String,
    },
    ForceResyncFailed {
        entity: EntityId,
        error: String,
    },
    ModelRestored {
        entity: EntityId,
        /// `None` when no usable snapshot existed and a fresh model was built
        snapshot_key: Option<String>,
    },
    CleanupCompleted {
        entity: EntityId,
        deleted: usize,
        kept: usize,
    },
    AutoUpdatePaused,
    AutoUpdateResumed,
    UpdateIntervalChanged {
        interval: Duration,
    },
    Error {
        message: String,
    },
}

impl OrchestratorEvent {
    /// Short name, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            OrchestratorEvent::NewDataDetected { .. } => "new_data_detected",
            OrchestratorEvent::UpdateStarted { .. } => "update_started",
            OrchestratorEvent::UpdateCompleted { .. } => "update_completed",
            OrchestratorEvent::AnomaliesDetected { .. } => "anomalies_detected",
            OrchestratorEvent::SyncCompleted { .. } => "sync_completed",
            OrchestratorEvent::SyncFailed { .. } => "sync_failed",
            OrchestratorEvent::ForceResyncStarted { .. } => "force_resync_started",
            OrchestratorEvent::ForceResyncCompleted { .. } => "force_resync_completed",
            OrchestratorEvent::ForceResyncFailed { .. } => "force_resync_failed",
            OrchestratorEvent::ModelRestored { .. } => "model_restored",
            OrchestratorEvent::CleanupCompleted { .. } => "cleanup_completed",
            OrchestratorEvent::AutoUpdatePaused => "auto_update_paused",
            OrchestratorEvent::AutoUpdateResumed => "auto_update_resumed",
            OrchestratorEvent::UpdateIntervalChanged { .. } => "update_interval_changed",
            OrchestratorEvent::Error { .. } => "error",
        }
    }
}
