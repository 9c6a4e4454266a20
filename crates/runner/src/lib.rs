//! Cashcast Runner
//!
//! Host-side wiring for the `cashcast` binary:
//!
//! - **Config**: JSON configuration with embedded defaults
//! - **Bridge**: live feed candles → observations → orchestrator queue
//! - **Reporting**: lifecycle events → log lines
//!
//! ## Architecture
//!
//! ```text
//!   RestClient ──► UpdateOrchestrator ◄── FeedBridge ◄── StreamingClient
//!   (history,            │  ▲                                (WsConnector)
//!    model sync)         │  └── auto-update timer
//!                        ▼
//!                 ModelPersistenceStore ─► memory / file key-value store
//!                        │
//!                        └── EventBus ─► reporting::log_event
//! ```

pub mod bridge;
pub mod config;
pub mod reporting;

pub use bridge::FeedBridge;
pub use config::{CashcastConfig, ConfigError, load_config, load_config_from_str, load_default_config};
