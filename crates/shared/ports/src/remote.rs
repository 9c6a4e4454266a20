use async_trait::async_trait;
use cashcast_core::{Posteriors, RateRecord, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::FetchResult;

/// Sort order of the history endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryOrder {
    Asc,
    #[default]
    Desc,
}

impl HistoryOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryOrder::Asc => "asc",
            HistoryOrder::Desc => "desc",
        }
    }
}

/// Port for the raw rate history
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn fetch_history(&self, limit: usize, order: HistoryOrder)
    -> FetchResult<Vec<RateRecord>>;
}

/// Body of the model sync request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSyncPayload {
    pub posteriors: Posteriors,
    pub observation_count: u64,
    pub last_update: Timestamp,
}

/// Port for pushing the current posteriors to a backend
#[async_trait]
pub trait ModelSyncSink: Send + Sync {
    async fn push_model(&self, payload: &ModelSyncPayload) -> FetchResult<()>;
}
