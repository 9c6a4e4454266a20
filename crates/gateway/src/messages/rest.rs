use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::feed::Candle;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentPriceResponse {
    pub current_price: f64,
    #[serde(default)]
    pub model_state: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandlesResponse {
    pub candles: Vec<Candle>,
}
