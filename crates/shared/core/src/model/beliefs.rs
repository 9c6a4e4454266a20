//! Conjugate belief families
//!
//! Each belief is a posterior in a conjugate family, so a single observation
//! updates it in closed form:
//!
//! | Belief | Likelihood | Update |
//! |---|---|---|
//! | `GammaBelief` | Exponential waiting time | `α += 1`, `β += t` |
//! | `NormalInverseGammaBelief` | Normal, unknown mean/variance | see [`NormalInverseGammaBelief::observe`] |
//! | `BetaBelief` | Bernoulli | `α += 1` on success, else `β += 1` |
//!
//! Parameters are only ever increased by non-negative amounts, so a belief
//! built through [`GammaBelief::new`] (etc.) stays strictly positive.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ensure_positive};

/// Gamma posterior over the rate of the change process
///
/// `alpha` counts pseudo-observations, `beta` accumulates pseudo-time (days).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GammaBelief {
    alpha: f64,
    beta: f64,
}

impl GammaBelief {
    /// Weak prior: two pseudo-changes over a tenth of a day
    pub const DEFAULT_PRIOR: GammaBelief = GammaBelief {
        alpha: 2.0,
        beta: 0.1,
    };

    pub fn new(alpha: f64, beta: f64) -> Result<Self> {
        Ok(Self {
            alpha: ensure_positive("gamma.alpha", alpha)?,
            beta: ensure_positive("gamma.beta", beta)?,
        })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Posterior mean of the change rate (changes per day)
    pub fn expected_rate(&self) -> f64 {
        self.alpha / self.beta
    }

    /// Posterior variance of the change rate
    pub fn rate_variance(&self) -> f64 {
        self.alpha / (self.beta * self.beta)
    }

    pub(crate) fn observe_interval(&mut self, days: f64) {
        self.alpha += 1.0;
        self.beta += days;
    }

    pub(crate) fn check(&self) -> Result<()> {
        Self::new(self.alpha, self.beta).map(|_| ())
    }
}

/// Normal-Inverse-Gamma posterior over (mean, variance) of the change magnitude
///
/// σ² ~ IG(α, β), μ | σ² ~ N(mu, σ²/κ)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalInverseGammaBelief {
    mu: f64,
    kappa: f64,
    alpha: f64,
    beta: f64,
}

impl NormalInverseGammaBelief {
    /// Centered at zero change; alpha > 1 so the predictive variance exists
    pub const DEFAULT_PRIOR: NormalInverseGammaBelief = NormalInverseGammaBelief {
        mu: 0.0,
        kappa: 1.0,
        alpha: 3.0,
        beta: 1.0,
    };

    pub fn new(mu: f64, kappa: f64, alpha: f64, beta: f64) -> Result<Self> {
        if !mu.is_finite() {
            return Err(crate::CoreError::InvalidParameter {
                name: "nig.mu",
                value: mu,
            });
        }
        Ok(Self {
            mu,
            kappa: ensure_positive("nig.kappa", kappa)?,
            alpha: ensure_positive("nig.alpha", alpha)?,
            beta: ensure_positive("nig.beta", beta)?,
        })
    }

    pub fn mu(&self) -> f64 {
        self.mu
    }

    pub fn kappa(&self) -> f64 {
        self.kappa
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Single-observation NIG update with new value `x`:
    ///
    /// ```text
    /// κ' = κ + 1
    /// μ' = (κμ + x) / κ'
    /// α' = α + 1/2
    /// β' = β + κ(x - μ)² / (2κ')
    /// ```
    pub(crate) fn observe(&mut self, x: f64) {
        let kappa1 = self.kappa + 1.0;
        let deviation = x - self.mu;
        self.beta += 0.5 * self.kappa * deviation * deviation / kappa1;
        self.mu = (self.kappa * self.mu + x) / kappa1;
        self.alpha += 0.5;
        self.kappa = kappa1;
    }

    pub(crate) fn check(&self) -> Result<()> {
        Self::new(self.mu, self.kappa, self.alpha, self.beta).map(|_| ())
    }
}

/// Beta posterior over the probability that a change is an upsize
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BetaBelief {
    alpha: f64,
    beta: f64,
}

impl BetaBelief {
    /// Uniform prior
    pub const DEFAULT_PRIOR: BetaBelief = BetaBelief {
        alpha: 1.0,
        beta: 1.0,
    };

    pub fn new(alpha: f64, beta: f64) -> Result<Self> {
        Ok(Self {
            alpha: ensure_positive("beta.alpha", alpha)?,
            beta: ensure_positive("beta.beta", beta)?,
        })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Posterior mean: alpha / (alpha + beta)
    pub fn mean(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }

    /// Posterior variance: alpha*beta / ((alpha+beta)^2 * (alpha+beta+1))
    pub fn variance(&self) -> f64 {
        let ab = self.alpha + self.beta;
        (self.alpha * self.beta) / (ab * ab * (ab + 1.0))
    }

    pub(crate) fn observe(&mut self, upsized: bool) {
        if upsized {
            self.alpha += 1.0;
        } else {
            self.beta += 1.0;
        }
    }

    pub(crate) fn check(&self) -> Result<()> {
        Self::new(self.alpha, self.beta).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_gamma_interval_update() {
        let mut belief = GammaBelief::new(2.0, 0.1).unwrap();
        belief.observe_interval(5.0);

        assert_eq!(belief.alpha(), 3.0);
        assert!((belief.beta() - 5.1).abs() < EPS);
        assert!((1.0 / belief.expected_rate() - 1.7).abs() < EPS);
    }

    #[test]
    fn test_nig_update() {
        let mut belief = NormalInverseGammaBelief::new(0.0, 1.0, 3.0, 1.0).unwrap();
        belief.observe(2.0);

        assert_eq!(belief.kappa(), 2.0);
        assert!((belief.mu() - 1.0).abs() < EPS);
        assert_eq!(belief.alpha(), 3.5);
        assert!((belief.beta() - 2.0).abs() < EPS);
    }

    #[test]
    fn test_beta_update() {
        let mut belief = BetaBelief::new(1.0, 1.0).unwrap();
        belief.observe(true);
        assert_eq!((belief.alpha(), belief.beta()), (2.0, 1.0));
        assert!((belief.mean() - 2.0 / 3.0).abs() < EPS);

        belief.observe(false);
        assert_eq!((belief.alpha(), belief.beta()), (2.0, 2.0));
    }

    #[test]
    fn test_rejects_non_positive_parameters() {
        assert!(GammaBelief::new(0.0, 1.0).is_err());
        assert!(GammaBelief::new(1.0, -1.0).is_err());
        assert!(NormalInverseGammaBelief::new(0.0, 0.0, 3.0, 1.0).is_err());
        assert!(NormalInverseGammaBelief::new(f64::NAN, 1.0, 3.0, 1.0).is_err());
        assert!(BetaBelief::new(1.0, f64::INFINITY).is_err());
    }
}
