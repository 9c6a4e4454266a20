use std::time::Duration;

use async_trait::async_trait;
use cashcast_core::RateRecord;
use cashcast_ports::{
    FetchResult, HistoryOrder, HistorySource, ModelSyncPayload, ModelSyncSink,
};
use reqwest::Client;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use url::Url;

use crate::error::RestError;
use crate::messages::{Candle, CandlesResponse, CurrentPriceResponse, Predictions};

/// REST client for the rate backend
///
/// Feed endpoints live under `{base}/{feed}/`, the history and model sync
/// endpoints directly under `{base}/`.
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    base_url: Url,
    feed: String,
}

impl RestClient {
    pub fn new(base_url: &str, feed: &str, timeout: Duration) -> Result<Self, RestError> {
        // Url::join replaces the last segment unless the base ends with '/'
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }

        Ok(RestClient {
            client: Client::builder().timeout(timeout).build()?,
            base_url: Url::parse(&base)?,
            feed: feed.trim_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn feed_path(&self, path: &str) -> String {
        format!("{}/{}", self.feed, path)
    }

    /// Latest price and the server-side model state
    pub async fn current_price(&self) -> Result<CurrentPriceResponse, RestError> {
        self.get(&self.feed_path("current-price")).await
    }

    /// Most recent candles, oldest first
    pub async fn candles(&self, limit: usize) -> Result<Vec<Candle>, RestError> {
        let path = format!("{}?limit={}", self.feed_path("candles-3m"), limit);
        let resp: CandlesResponse = self.get(&path).await?;
        Ok(resp.candles)
    }

    pub async fn predictions(&self) -> Result<Predictions, RestError> {
        self.get(&self.feed_path("predictions")).await
    }

    /// Change the server model's half-life, then refetch predictions
    pub async fn set_half_life(&self, half_life_candles: u32) -> Result<Predictions, RestError> {
        let path = format!(
            "{}?half_life_candles={}",
            self.feed_path("model/half-life"),
            half_life_candles
        );
        let ack: Value = self.post(&path, &Value::Null).await?;
        log::info!("Half-life set to {} candles: {}", half_life_candles, ack);

        self.predictions().await
    }

    pub async fn model_metrics(&self) -> Result<Value, RestError> {
        self.get(&self.feed_path("model/metrics")).await
    }

    /// Raw rate records
    pub async fn history(
        &self,
        limit: usize,
        order: HistoryOrder,
    ) -> Result<Vec<RateRecord>, RestError> {
        let path = format!("history?limit={}&order={}", limit, order.as_str());
        self.get(&path).await
    }

    pub async fn model_sync(&self, payload: &ModelSyncPayload) -> Result<(), RestError> {
        let url = self.base_url.join("model-sync")?;
        let resp = self.client.post(url).json(payload).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RestError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, RestError> {
        let url = self.base_url.join(path)?;
        log::debug!("GET {}", url);
        let resp = self.client.get(url).send().await?;

        self.handle_response(resp).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, RestError> {
        let url = self.base_url.join(path)?;
        log::debug!("POST {}", url);
        let resp = self.client.post(url).json(body).send().await?;

        self.handle_response(resp).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, RestError> {
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(RestError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| RestError::Parse(e.to_string()))
    }
}

#[async_trait]
impl HistorySource for RestClient {
    async fn fetch_history(
        &self,
        limit: usize,
        order: HistoryOrder,
    ) -> FetchResult<Vec<RateRecord>> {
        Ok(self.history(limit, order).await?)
    }
}

#[async_trait]
impl ModelSyncSink for RestClient {
    async fn push_model(&self, payload: &ModelSyncPayload) -> FetchResult<()> {
        Ok(self.model_sync(payload).await?)
    }
}
