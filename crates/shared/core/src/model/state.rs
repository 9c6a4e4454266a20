use serde::{Deserialize, Serialize};

use super::beliefs::{BetaBelief, GammaBelief, NormalInverseGammaBelief};
use crate::error::Result;
use crate::values::Timestamp;

/// The three posteriors of the model, as pushed to the sync endpoint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Posteriors {
    pub time_to_change: GammaBelief,
    pub magnitude_change: NormalInverseGammaBelief,
    pub upsize_probability: BetaBelief,
}

/// Priors a model starts from
pub type ModelPriors = Posteriors;

impl Default for Posteriors {
    fn default() -> Self {
        Self {
            time_to_change: GammaBelief::DEFAULT_PRIOR,
            magnitude_change: NormalInverseGammaBelief::DEFAULT_PRIOR,
            upsize_probability: BetaBelief::DEFAULT_PRIOR,
        }
    }
}

impl Posteriors {
    /// Verify every belief parameter is positive and finite
    pub fn check(&self) -> Result<()> {
        self.time_to_change.check()?;
        self.magnitude_change.check()?;
        self.upsize_probability.check()
    }
}

/// Live belief state for one tracked entity
///
/// Mutated only by [`crate::BayesianUpdateEngine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    priors: ModelPriors,
    posteriors: Posteriors,
    observation_count: u64,
    last_update: Timestamp,
}

impl ModelState {
    /// Create a model whose posteriors start at the given priors
    pub fn new(priors: ModelPriors, now: Timestamp) -> Self {
        Self {
            priors,
            posteriors: priors,
            observation_count: 0,
            last_update: now,
        }
    }

    /// Create a model from the default priors
    pub fn with_default_priors(now: Timestamp) -> Self {
        Self::new(ModelPriors::default(), now)
    }

    /// Fresh model built from this model's priors
    pub fn fresh(&self, now: Timestamp) -> Self {
        Self::new(self.priors, now)
    }

    pub fn priors(&self) -> &ModelPriors {
        &self.priors
    }

    pub fn posteriors(&self) -> &Posteriors {
        &self.posteriors
    }

    pub fn time(&self) -> &GammaBelief {
        &self.posteriors.time_to_change
    }

    pub fn magnitude(&self) -> &NormalInverseGammaBelief {
        &self.posteriors.magnitude_change
    }

    pub fn upsize(&self) -> &BetaBelief {
        &self.posteriors.upsize_probability
    }

    pub fn observation_count(&self) -> u64 {
        self.observation_count
    }

    pub fn last_update(&self) -> Timestamp {
        self.last_update
    }

    /// Verify every belief parameter is positive and finite
    ///
    /// States built through this crate always pass; deserialized states may not.
    pub fn check_invariants(&self) -> Result<()> {
        self.priors.check()?;
        self.posteriors.check()
    }

    pub(crate) fn posteriors_mut(&mut self) -> &mut Posteriors {
        &mut self.posteriors
    }

    pub(crate) fn record_observation(&mut self, now: Timestamp) {
        self.observation_count += 1;
        self.last_update = now;
    }
}

/// Point-in-time copy of a model, as written to the persistence store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub model_state: ModelState,
    pub created_at: Timestamp,
    pub snapshot_key: String,
}
