//! Wire message types

mod feed;
mod rest;

pub use feed::{Candle, FeedMessage, HorizonPrediction, NextCandlePrediction, Predictions};
pub use rest::{CandlesResponse, CurrentPriceResponse};
