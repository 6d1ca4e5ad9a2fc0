//! sentineld - nursery risk-fusion daemon
//!
//! This daemon:
//! 1. Loads configuration (file + SENTINEL_* env + flags)
//! 2. Opens the notification store
//! 3. Starts the alert dispatcher and the TCP subscriber server
//! 4. Starts one detection worker per configured source
//! 5. On Ctrl-C stops every worker, then drains and closes alert fan-out

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;

use nursery_sentinel::config::SentinelConfig;
use nursery_sentinel::detect::{StubBackend, StubPoseBackend};
use nursery_sentinel::transport::{AlertServer, AlertServerConfig};
use nursery_sentinel::worker::UrlWorkerFactory;
use nursery_sentinel::{
    AlertBroadcaster, AlertDispatcher, DetectorSet, NotificationStore, SqliteNotificationStore,
    WorkerRegistry,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Nursery risk-fusion detection daemon")]
struct Args {
    /// Config file (JSON, or TOML when it ends in .toml).
    #[arg(long, env = "SENTINEL_CONFIG")]
    config: Option<PathBuf>,

    /// Source to monitor as id=url. Repeatable; replaces configured sources.
    #[arg(long = "source", value_name = "ID=URL")]
    sources: Vec<String>,

    /// Override the notification database path.
    #[arg(long)]
    db_path: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Some(path) = &args.config {
        std::env::set_var("SENTINEL_CONFIG", path);
    }
    let mut cfg = SentinelConfig::load()?;
    cfg.override_sources(&args.sources)?;
    cfg.override_db_path(args.db_path)?;

    let store: Arc<dyn NotificationStore> = Arc::new(SqliteNotificationStore::open(&cfg.db_path)?);
    log::info!("sentineld writing notifications to {}", cfg.db_path);

    let broadcaster = Arc::new(AlertBroadcaster::new());
    let (dispatcher, alerts) = AlertDispatcher::spawn(broadcaster.clone(), cfg.queue_capacity)?;
    let server = AlertServer::new(
        AlertServerConfig {
            addr: cfg.alert_addr.clone(),
            ..AlertServerConfig::default()
        },
        broadcaster,
    )
    .spawn()?;

    // Only scripted demo backends ship with the daemon.
    let factory = UrlWorkerFactory::new(cfg.source_urls(), cfg.frame_interval, |_| {
        Ok(DetectorSet::new(
            StubBackend::demo_objects(30, 10),
            StubBackend::demo_faces(),
            StubPoseBackend::upright(),
        ))
    });
    let registry = WorkerRegistry::new(Arc::new(factory), store, alerts, cfg.worker_settings());

    let mut started = 0usize;
    for source in &cfg.sources {
        match registry.start(&source.id) {
            Ok(()) => {
                started += 1;
                log::info!("monitoring {} ({})", source.id, source.url);
            }
            Err(err) => log::error!("could not start {}: {}", source.id, err),
        }
    }
    if started == 0 {
        registry.stop_all();
        drop(registry);
        server.stop()?;
        dispatcher.join()?;
        return Err(anyhow!("no source could be started"));
    }

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    log::info!(
        "sentineld running: {} source(s), alerts on {}",
        started,
        server.addr
    );
    let _ = rx.recv();
    log::info!("shutdown signal received, stopping workers...");

    registry.stop_all();
    drop(registry);
    server.stop()?;
    let dispatched = dispatcher.join()?;
    log::info!("sentineld stopped ({} alert(s) dispatched)", dispatched);
    Ok(())
}
