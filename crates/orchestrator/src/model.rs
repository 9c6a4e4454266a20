use std::sync::Arc;

use cashcast_core::{EntityId, ModelState};
use cashcast_store::ModelPersistenceStore;
use parking_lot::Mutex;

/// One live model plus the snapshot namespace it is persisted to
///
/// Clones share the same state. Readers take copies with [`SharedModel::state`];
/// writes go through the orchestrator worker.
#[derive(Clone)]
pub struct SharedModel {
    entity: EntityId,
    state: Arc<Mutex<ModelState>>,
    persistence: Arc<ModelPersistenceStore>,
}

impl SharedModel {
    pub fn new(
        entity: impl Into<EntityId>,
        state: ModelState,
        persistence: Arc<ModelPersistenceStore>,
    ) -> Self {
        Self {
            entity: entity.into(),
            state: Arc::new(Mutex::new(state)),
            persistence,
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Copy of the current state
    pub fn state(&self) -> ModelState {
        self.state.lock().clone()
    }

    pub fn persistence(&self) -> &ModelPersistenceStore {
        &self.persistence
    }

    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut ModelState) -> R) -> R {
        f(&mut self.state.lock())
    }

    pub(crate) fn replace(&self, state: ModelState) {
        *self.state.lock() = state;
    }
}

impl std::fmt::Debug for SharedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedModel")
            .field("entity", &self.entity)
            .field("prefix", &self.persistence.prefix())
            .finish()
    }
}
