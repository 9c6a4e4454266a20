mod update;

pub use update::BayesianUpdateEngine;
