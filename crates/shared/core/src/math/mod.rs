//! Numerical routines for the Gamma distribution

mod gamma;

pub use gamma::{
    DEFAULT_QUANTILE_TOLERANCE, DEFAULT_QUANTILE_UPPER, GammaCdfMethod, bisect_quantile,
    gamma_cdf, gamma_quantile, ln_gamma, regularized_lower_gamma,
};
