use std::collections::VecDeque;

use serde_json::Value;

use crate::messages::{Candle, Predictions};

/// Latest data received from the feed
#[derive(Debug, Clone, Default)]
pub struct FeedView {
    pub current_price: Option<f64>,
    pub candles: VecDeque<Candle>,
    pub predictions: Option<Predictions>,
    pub model_state: Option<Value>,
}

impl FeedView {
    /// Append a candle, dropping the oldest beyond `window`
    pub fn push_candle(&mut self, candle: Candle, window: usize) {
        self.current_price = Some(candle.close);
        self.candles.push_back(candle);
        while self.candles.len() > window {
            self.candles.pop_front();
        }
    }
}
