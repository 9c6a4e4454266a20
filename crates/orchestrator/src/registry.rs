use std::sync::Arc;

use cashcast_core::{EntityId, GLOBAL_ENTITY, ModelPriors, ModelState};
use cashcast_ports::{Clock, KeyValueStore};
use cashcast_store::{DEFAULT_MAX_SNAPSHOTS, ModelPersistenceStore};
use dashmap::DashMap;

use crate::model::SharedModel;

/// Hands out one live model per entity id
///
/// Every model gets its own snapshot namespace in the shared key-value store.
pub struct ModelRegistry {
    models: DashMap<EntityId, SharedModel>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    priors: ModelPriors,
    max_snapshots: usize,
}

impl ModelRegistry {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            models: DashMap::new(),
            store,
            clock,
            priors: ModelPriors::default(),
            max_snapshots: DEFAULT_MAX_SNAPSHOTS,
        }
    }

    pub fn with_priors(mut self, priors: ModelPriors) -> Self {
        self.priors = priors;
        self
    }

    pub fn with_max_snapshots(mut self, max_snapshots: usize) -> Self {
        self.max_snapshots = max_snapshots;
        self
    }

    /// Model for `entity`, created from the priors on first use
    pub fn get_or_create(&self, entity: &str) -> SharedModel {
        self.models
            .entry(entity.to_string())
            .or_insert_with(|| {
                log::debug!("Creating model for '{}'", entity);
                let persistence = ModelPersistenceStore::for_entity(
                    Arc::clone(&self.store),
                    Arc::clone(&self.clock),
                    entity,
                )
                .with_max_snapshots(self.max_snapshots);
                SharedModel::new(
                    entity,
                    ModelState::new(self.priors, self.clock.now()),
                    Arc::new(persistence),
                )
            })
            .value()
            .clone()
    }

    /// The model trained across every store
    pub fn global(&self) -> SharedModel {
        self.get_or_create(GLOBAL_ENTITY)
    }

    pub fn get(&self, entity: &str) -> Option<SharedModel> {
        self.models.get(entity).map(|m| m.value().clone())
    }

    pub fn entities(&self) -> Vec<EntityId> {
        let mut entities: Vec<EntityId> = self.models.iter().map(|m| m.key().clone()).collect();
        entities.sort();
        entities
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
