//! Log lines for orchestrator lifecycle events

use cashcast_orchestrator::OrchestratorEvent;
use log::Level;

/// Level and message used when logging `event`
pub fn describe(event: &OrchestratorEvent) -> (Level, String) {
    match event {
        OrchestratorEvent::NewDataDetected { count } => {
            (Level::Info, format!("{count} new records detected"))
        }
        OrchestratorEvent::UpdateStarted { entity, batch_size } => (
            Level::Debug,
            format!("Updating '{entity}' with a batch of {batch_size}"),
        ),
        OrchestratorEvent::UpdateCompleted {
            entity,
            observations_applied,
            total_observations,
            snapshot_key,
        } => (
            Level::Info,
            format!(
                "'{entity}' updated: +{observations_applied} observations ({total_observations} total), snapshot {}",
                snapshot_key.as_deref().unwrap_or("not saved")
            ),
        ),
        OrchestratorEvent::AnomaliesDetected { entity, anomalies } => {
            let detail = serde_json::to_string(anomalies)
                .unwrap_or_else(|e| format!("<unserializable: {e}>"));
            (
                Level::Warn,
                format!("{} anomalies for '{entity}': {detail}", anomalies.len()),
            )
        }
        OrchestratorEvent::SyncCompleted { entity } => {
            (Level::Info, format!("'{entity}' synced to backend"))
        }
        OrchestratorEvent::SyncFailed { entity, error } => {
            (Level::Warn, format!("Sync of '{entity}' failed: {error}"))
        }
        OrchestratorEvent::ForceResyncStarted { entity } => {
            (Level::Info, format!("Force resync of '{entity}' started"))
        }
        OrchestratorEvent::ForceResyncCompleted {
            entity,
            observation_count,
            snapshot_key,
        } => (
            Level::Info,
            format!("'{entity}' resynced with {observation_count} observations ({snapshot_key})"),
        ),
        OrchestratorEvent::ForceResyncFailed { entity, error } => {
            (Level::Error, format!("Force resync of '{entity}' failed: {error}"))
        }
        OrchestratorEvent::ModelRestored {
            entity,
            snapshot_key: Some(key),
        } => (Level::Info, format!("'{entity}' restored from {key}")),
        OrchestratorEvent::ModelRestored {
            entity,
            snapshot_key: None,
        } => (Level::Info, format!("'{entity}' starting from priors")),
        OrchestratorEvent::CleanupCompleted {
            entity,
            deleted,
            kept,
        } => (
            Level::Info,
            format!("Removed {deleted} old snapshots of '{entity}', kept {kept}"),
        ),
        OrchestratorEvent::AutoUpdatePaused => (Level::Info, "Auto-update paused".to_string()),
        OrchestratorEvent::AutoUpdateResumed => (Level::Info, "Auto-update resumed".to_string()),
        OrchestratorEvent::UpdateIntervalChanged { interval } => {
            (Level::Info, format!("Update interval set to {interval:?}"))
        }
        OrchestratorEvent::Error { message } => (Level::Error, message.clone()),
    }
}

/// Event listener callback that writes every event to the log
pub fn log_event(event: OrchestratorEvent) {
    let (level, message) = describe(&event);
    log::log!(level, "[{}] {}", event.kind(), message);
}
