use std::sync::Arc;

use cashcast_clock::SystemClock;
use cashcast_gateway::{RestClient, StreamingClient, WsConnector};
use cashcast_orchestrator::{ModelRegistry, UpdateOrchestrator};
use cashcast_ports::{Clock, HistorySource, KeyValueStore};
use cashcast_runner::config::StorageBackend;
use cashcast_runner::{CashcastConfig, FeedBridge, load_config, load_default_config, reporting};
use cashcast_store::{FileKeyValueStore, InMemoryKeyValueStore};

fn print_help() {
    eprintln!(
        r#"cashcast - Bayesian forecasts of cashback rate changes

USAGE:
    cashcast [OPTIONS]

OPTIONS:
    --config <PATH>     Load configuration from JSON file
    --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG            Log level filter (overrides logging.level)
"#
    );
}

fn parse_args() -> Option<Option<String>> {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return None;
            }
            "--config" | "-c" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
                config_path = Some(args[i].clone());
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }
    Some(config_path)
}

async fn open_store(config: &CashcastConfig) -> anyhow::Result<Arc<dyn KeyValueStore>> {
    Ok(match config.storage.backend {
        StorageBackend::Memory => Arc::new(InMemoryKeyValueStore::new()),
        StorageBackend::File => Arc::new(FileKeyValueStore::open(&config.storage.directory).await?),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Some(config_path) = parse_args() else {
        return Ok(());
    };
    let config = match &config_path {
        Some(path) => load_config(path)?,
        None => load_default_config()?,
    };
    config.validate()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.logging.level))
        .init();
    match &config_path {
        Some(path) => log::info!("Loaded configuration from {}", path),
        None => log::info!("Using embedded default configuration"),
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let store = open_store(&config).await?;
    let rest = Arc::new(RestClient::new(
        &config.api.base_url,
        &config.api.feed,
        config.api.timeout(),
    )?);
    log::info!("REST backend: {}", rest.base_url());

    let registry = ModelRegistry::new(store, Arc::clone(&clock))
        .with_priors(config.model.priors)
        .with_max_snapshots(config.storage.max_snapshots);

    let mut builder = UpdateOrchestrator::builder(
        Arc::clone(&rest) as Arc<dyn HistorySource>,
        Arc::clone(&clock),
    )
    .settings(config.orchestrator.settings())
    .extractor(config.model.extractor())
    .anomaly_thresholds(
        config.model.anomaly_sigma_threshold,
        config.model.anomaly_min_upsize_pct,
    );
    if config.orchestrator.sync_enabled {
        builder = builder.sync_sink(rest.clone());
    }
    let orchestrator = builder.spawn();
    let _event_log = orchestrator.events().listen(reporting::log_event);

    let global = registry.global();
    if let Err(e) = orchestrator.restore_latest(&global).await {
        log::warn!("Continuing without restored state for '{}': {}", global.entity(), e);
    }
    let report = orchestrator.validate(&global);
    if !report.valid {
        for issue in &report.errors {
            log::warn!("Model '{}': {}", global.entity(), issue);
        }
    }
    match orchestrator.summarize(&global) {
        Ok(summary) => log::info!(
            "Next change expected in {:.1} days ({} observations, confidence {:.0}%)",
            summary.next_change.expected_days,
            summary.observation_count,
            summary.model_confidence
        ),
        Err(e) => log::warn!("No forecast yet: {}", e),
    }

    let auto_update = config
        .orchestrator
        .auto_update
        .then(|| orchestrator.start_auto_update(global.clone()));

    let stream = if config.stream.enabled {
        let feed_model = registry.get_or_create(&config.api.feed);
        if let Err(e) = orchestrator.restore_latest(&feed_model).await {
            log::warn!("Continuing without restored state for '{}': {}", feed_model.entity(), e);
        }

        let connector = Arc::new(WsConnector::new(config.stream.url.clone()));
        let (handle, events) = StreamingClient::spawn(connector, config.stream.settings());
        let bridge = FeedBridge::new(orchestrator.clone(), feed_model, Arc::clone(&clock))
            .with_thresholds(config.model.dead_band, config.model.min_interval_days);
        log::info!("Streaming from {}", config.stream.url);
        Some((handle, bridge.spawn(events)))
    } else {
        None
    };

    tokio::signal::ctrl_c().await?;
    log::info!("Shutting down");

    drop(auto_update);
    if let Some((handle, bridge)) = stream {
        handle.disconnect().await;
        match bridge.await {
            Ok(count) => log::info!("Feed bridge enqueued {} observations", count),
            Err(e) => log::warn!("Feed bridge ended abnormally: {}", e),
        }
    }
    orchestrator.shutdown().await;
    log::info!("Tracked models: {:?}", registry.entities());
    Ok(())
}
