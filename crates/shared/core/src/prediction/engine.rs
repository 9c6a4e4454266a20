use chrono::Duration;

use super::confidence::model_confidence;
use super::types::{
    Interval, MagnitudePrediction, ModelSummary, NextChangePrediction, PredictionConfig,
    QuantileForecast, UpsizePrediction, WindowProbability,
};
use crate::error::{CoreError, Result};
use crate::math::{bisect_quantile, gamma_cdf};
use crate::model::ModelState;
use crate::values::{MILLIS_PER_DAY, Timestamp};

const Z_95: f64 = 1.96;

/// Read-only queries over a model state
#[derive(Debug, Clone, Default)]
pub struct PredictionEngine {
    config: PredictionConfig,
}

impl PredictionEngine {
    pub fn new(config: PredictionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PredictionConfig {
        &self.config
    }

    /// When the next change is expected, with quantiles and window probabilities
    pub fn predict_next_change(
        &self,
        state: &ModelState,
        now: Timestamp,
    ) -> Result<NextChangePrediction> {
        let time = state.time();
        let (alpha, beta) = (time.alpha(), time.beta());
        let method = self.config.cdf_method;
        let cdf = |x: f64| gamma_cdf(x, alpha, beta, method);

        let expected_rate = time.expected_rate();
        let expected_days = 1.0 / expected_rate;
        let variance = time.rate_variance();

        let quantiles = self
            .config
            .quantile_levels
            .iter()
            .map(|&level| {
                bisect_quantile(
                    level,
                    self.config.quantile_upper_days,
                    self.config.quantile_tolerance_days,
                    cdf,
                )
                .map(|days| QuantileForecast { level, days })
            })
            .collect::<Result<Vec<_>>>()?;

        let probabilities = self
            .config
            .horizons_days
            .iter()
            .map(|&within_days| WindowProbability {
                within_days,
                probability: cdf(f64::from(within_days)),
            })
            .collect();

        let offset = Duration::milliseconds((expected_days * MILLIS_PER_DAY).round() as i64);
        let predicted_date = now.checked_add_signed(offset).unwrap_or(now);

        Ok(NextChangePrediction {
            expected_rate,
            expected_days,
            variance,
            std_dev: variance.sqrt(),
            quantiles,
            probabilities,
            predicted_date,
        })
    }

    /// Predictive mean and 95% interval of the next change magnitude
    ///
    /// Fails with [`CoreError::UndefinedVariance`] while `alpha <= 1`.
    pub fn predict_magnitude(&self, state: &ModelState) -> Result<MagnitudePrediction> {
        let belief = state.magnitude();
        if belief.alpha() <= 1.0 {
            return Err(CoreError::UndefinedVariance {
                alpha: belief.alpha(),
            });
        }

        let variance = belief.beta() / (belief.alpha() - 1.0) * (1.0 + 1.0 / belief.kappa());
        let std_dev = variance.sqrt();
        Ok(MagnitudePrediction {
            expected_change: belief.mu(),
            variance,
            std_dev,
            ci95: Interval::centered(belief.mu(), Z_95 * std_dev),
        })
    }

    pub fn predict_upsize_probability(&self, state: &ModelState) -> UpsizePrediction {
        let belief = state.upsize();
        UpsizePrediction {
            probability_pct: belief.mean() * 100.0,
            confidence_pct: ((1.0 - belief.variance().sqrt()) * 100.0).clamp(0.0, 100.0),
        }
    }

    pub fn summarize(&self, state: &ModelState, now: Timestamp) -> Result<ModelSummary> {
        Ok(ModelSummary {
            observation_count: state.observation_count(),
            last_update: state.last_update(),
            next_change: self.predict_next_change(state, now)?,
            magnitude: self.predict_magnitude(state).ok(),
            upsize: self.predict_upsize_probability(state),
            posteriors: *state.posteriors(),
            model_confidence: model_confidence(state.observation_count()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::BayesianUpdateEngine;
    use crate::math::GammaCdfMethod;
    use crate::model::{ModelPriors, NormalInverseGammaBelief};
    use crate::observation::Observation;
    use crate::prediction::{ActualOutcome, PredictionAccuracy};
    use chrono::{TimeZone, Utc};

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn trained_state() -> ModelState {
        let mut state = ModelState::with_default_priors(now());
        let obs = Observation::empty("s1", now())
            .with_interval(5.0)
            .with_magnitude(2.0)
            .with_upsized(true);
        BayesianUpdateEngine::new().apply(&mut state, &obs, now());
        state
    }

    #[test]
    fn test_next_change_after_one_interval() {
        let engine = PredictionEngine::default();
        let prediction = engine.predict_next_change(&trained_state(), now()).unwrap();

        assert!((prediction.expected_days - 1.7).abs() < 1e-9);
        assert!((prediction.variance - 3.0 / (5.1 * 5.1)).abs() < 1e-12);
        let offset = prediction.predicted_date - now() - Duration::milliseconds(146_880_000);
        assert!(offset.num_milliseconds().abs() <= 1);

        let q50 = prediction.quantile(0.5).unwrap();
        let q75 = prediction.quantile(0.75).unwrap();
        let q95 = prediction.quantile(0.95).unwrap();
        assert!(q50 < q75 && q75 < q95);

        let p7 = prediction.probability_within(7).unwrap();
        let p30 = prediction.probability_within(30).unwrap();
        assert!(p7 <= p30 && p30 <= 1.0);
    }

    #[test]
    fn test_quantiles_consistent_with_cdf() {
        let engine = PredictionEngine::default();
        let state = trained_state();
        let prediction = engine.predict_next_change(&state, now()).unwrap();

        for q in &prediction.quantiles {
            let back = gamma_cdf(
                q.days,
                state.time().alpha(),
                state.time().beta(),
                GammaCdfMethod::Exact,
            );
            assert!((back - q.level).abs() <= 0.01);
        }
    }

    #[test]
    fn test_magnitude_prediction() {
        let engine = PredictionEngine::default();
        let magnitude = engine.predict_magnitude(&trained_state()).unwrap();

        // NIG{mu 1, kappa 2, alpha 3.5, beta 2}: 2 / 2.5 * 1.5 = 1.2
        assert_eq!(magnitude.expected_change, 1.0);
        assert!((magnitude.variance - 1.2).abs() < 1e-12);
        assert!(magnitude.ci95.contains(1.0));
        assert!((magnitude.ci95.upper - (1.0 + 1.96 * 1.2_f64.sqrt())).abs() < 1e-12);
    }

    #[test]
    fn test_magnitude_undefined_variance() {
        let priors = ModelPriors {
            magnitude_change: NormalInverseGammaBelief::new(0.0, 1.0, 0.5, 1.0).unwrap(),
            ..ModelPriors::default()
        };
        let state = ModelState::new(priors, now());

        assert_eq!(
            PredictionEngine::default().predict_magnitude(&state),
            Err(CoreError::UndefinedVariance { alpha: 0.5 })
        );
    }

    #[test]
    fn test_upsize_probability() {
        let upsize = PredictionEngine::default().predict_upsize_probability(&trained_state());

        assert!((upsize.probability_pct - 66.666_666).abs() < 1e-3);
        assert!((0.0..=100.0).contains(&upsize.confidence_pct));
    }

    #[test]
    fn test_summary_and_accuracy() {
        let engine = PredictionEngine::default();
        let summary = engine.summarize(&trained_state(), now()).unwrap();

        assert_eq!(summary.observation_count, 1);
        assert!((summary.model_confidence - 3.0).abs() < 1e-9);
        assert!(summary.magnitude.is_some());

        let accuracy = PredictionAccuracy::score(
            &summary,
            &ActualOutcome {
                days_until_change: 2.0,
                magnitude_change: 1.0,
            },
        );
        assert!((accuracy.time_accuracy - 85.0).abs() < 1e-9);
        assert_eq!(accuracy.magnitude_accuracy, 100.0);
        assert!((accuracy.overall_accuracy - 92.5).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = PredictionConfig {
            quantile_levels: vec![0.5, 1.2],
            ..PredictionConfig::default()
        };
        assert!(PredictionEngine::new(config).is_err());
    }
}
