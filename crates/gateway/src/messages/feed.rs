use std::collections::BTreeMap;

use cashcast_core::Timestamp;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One OHLCV candle; `timestamp` is epoch seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

impl Candle {
    pub fn time(&self) -> Option<Timestamp> {
        DateTime::from_timestamp(self.timestamp, 0)
    }
}

/// Next-candle forecast with its 68% band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NextCandlePrediction {
    pub y_hat: f64,
    pub pi68: (f64, f64),
}

/// Forecast at a fixed horizon, with 68% and 95% bands
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HorizonPrediction {
    pub y_hat: f64,
    pub pi68: (f64, f64),
    #[serde(default)]
    pub pi95: Option<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Predictions {
    #[serde(default)]
    pub next_candle: Option<NextCandlePrediction>,
    /// Keyed by horizon label, e.g. `"15m"`
    #[serde(default)]
    pub horizons: BTreeMap<String, HorizonPrediction>,
}

/// Messages on the live feed, dispatched on `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeedMessage {
    Ping {
        #[serde(default)]
        timestamp: Option<i64>,
    },
    Pong {
        timestamp: i64,
    },
    Initial {
        current_price: f64,
        #[serde(default)]
        model_state: Option<Value>,
    },
    Update {
        #[serde(default)]
        candle: Option<Candle>,
        #[serde(default)]
        predictions: Option<Predictions>,
        #[serde(default)]
        model_state: Option<Value>,
    },
    #[serde(other)]
    Unknown,
}
