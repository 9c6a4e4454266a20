mod beliefs;
mod state;

pub use beliefs::{BetaBelief, GammaBelief, NormalInverseGammaBelief};
pub use state::{ModelPriors, ModelSnapshot, ModelState, Posteriors};
