//! Closed-form conjugate updates

use crate::model::ModelState;
use crate::observation::Observation;
use crate::values::Timestamp;

/// Applies observations to a [`ModelState`]
///
/// Each field of an observation drives one sub-model. A missing or unusable
/// field skips that sub-model only; the observation is still counted.
#[derive(Debug, Default, Clone, Copy)]
pub struct BayesianUpdateEngine;

impl BayesianUpdateEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn apply(&self, state: &mut ModelState, observation: &Observation, now: Timestamp) {
        let posteriors = state.posteriors_mut();

        if let Some(days) = observation.time_since_last_change_days
            && days.is_finite()
            && days > 0.0
        {
            posteriors.time_to_change.observe_interval(days);
        }

        if let Some(change) = observation.magnitude_of_change
            && change.is_finite()
        {
            posteriors.magnitude_change.observe(change);
        }

        if let Some(upsized) = observation.was_upsized {
            posteriors.upsize_probability.observe(upsized);
        }

        state.record_observation(now);
    }

    /// Apply a batch in order; returns how many observations were applied
    pub fn apply_batch(
        &self,
        state: &mut ModelState,
        observations: &[Observation],
        now: Timestamp,
    ) -> usize {
        for observation in observations {
            self.apply(state, observation, now);
        }
        observations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_full_observation_updates_all_submodels() {
        let engine = BayesianUpdateEngine::new();
        let mut state = ModelState::with_default_priors(now());
        let obs = Observation::empty("s1", now())
            .with_interval(5.0)
            .with_magnitude(2.0)
            .with_upsized(true);

        engine.apply(&mut state, &obs, now());

        assert_eq!(state.time().alpha(), 3.0);
        assert!((state.time().beta() - 5.1).abs() < 1e-12);
        assert_eq!(state.magnitude().kappa(), 2.0);
        assert_eq!(state.magnitude().mu(), 1.0);
        assert_eq!(state.upsize().alpha(), 2.0);
        assert_eq!(state.observation_count(), 1);
    }

    #[test]
    fn test_missing_fields_skip_only_their_submodel() {
        let engine = BayesianUpdateEngine::new();
        let mut state = ModelState::with_default_priors(now());
        let before = *state.posteriors();

        let obs = Observation::empty("s1", now()).with_magnitude(1.5);
        engine.apply(&mut state, &obs, now());

        assert_eq!(state.time(), &before.time_to_change);
        assert_eq!(state.upsize(), &before.upsize_probability);
        assert_ne!(state.magnitude(), &before.magnitude_change);
        assert_eq!(state.observation_count(), 1);
    }

    #[test]
    fn test_invalid_values_are_ignored() {
        let engine = BayesianUpdateEngine::new();
        let mut state = ModelState::with_default_priors(now());
        let before = *state.posteriors();

        let batch = [
            Observation::empty("s1", now()).with_interval(0.0),
            Observation::empty("s1", now()).with_interval(-3.0),
            Observation::empty("s1", now()).with_interval(f64::NAN),
            Observation::empty("s1", now()).with_magnitude(f64::INFINITY),
        ];
        assert_eq!(engine.apply_batch(&mut state, &batch, now()), 4);

        assert_eq!(state.posteriors(), &before);
        assert_eq!(state.observation_count(), 4);
        assert!(state.check_invariants().is_ok());
    }

    #[test]
    fn test_updates_are_order_independent() {
        let engine = BayesianUpdateEngine::new();
        let mut rng = StdRng::seed_from_u64(7);

        for len in [1usize, 5, 20, 50] {
            let batch: Vec<Observation> = (0..len)
                .map(|_| {
                    Observation::empty("s1", now())
                        .with_interval(rng.gen_range(0.1..30.0))
                        .with_magnitude(rng.gen_range(-5.0..5.0))
                        .with_upsized(rng.gen_bool(0.4))
                })
                .collect();
            let mut shuffled = batch.clone();
            shuffled.shuffle(&mut rng);

            let mut a = ModelState::with_default_priors(now());
            let mut b = ModelState::with_default_priors(now());
            engine.apply_batch(&mut a, &batch, now());
            engine.apply_batch(&mut b, &shuffled, now());

            let (ma, mb) = (a.magnitude(), b.magnitude());
            assert!((ma.mu() - mb.mu()).abs() < 1e-9);
            assert!((ma.kappa() - mb.kappa()).abs() < 1e-9);
            assert!((ma.alpha() - mb.alpha()).abs() < 1e-9);
            assert!((ma.beta() - mb.beta()).abs() / ma.beta() < 1e-9);
            assert!((a.time().beta() - b.time().beta()).abs() < 1e-9);
            assert_eq!(a.upsize(), b.upsize());
        }
    }
}
