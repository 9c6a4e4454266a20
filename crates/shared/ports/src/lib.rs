//! Cashcast Ports
//!
//! Port definitions (traits) for cashcast. These are the boundaries between
//! the Bayesian model and the outside world: time, key-value persistence,
//! the rate history endpoint and the model sync endpoint.

mod clock;
mod error;
mod remote;
mod store;

pub use clock::Clock;
pub use error::{FetchError, FetchResult, StoreError, StoreResult};
pub use remote::{HistoryOrder, HistorySource, ModelSyncPayload, ModelSyncSink};
pub use store::KeyValueStore;
