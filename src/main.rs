use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use home_net_events::analysis::pipeline::{Pipeline, SharedPipeline};
use home_net_events::api::{routes, SharedCaptureManager};
use home_net_events::capture::manager::CaptureManager;
use home_net_events::models::config::{AppConfig, Config};
use home_net_events::notify::http::HttpNotifier;
use home_net_events::notify::{LogNotifier, NotificationSink};
use home_net_events::utils::clock::now_timestamp;
use home_net_events::utils::logging;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Tracks device presence and traffic statistics on the local network")]
struct Args {
    /// Configuration file
    #[clap(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Network interface to capture from
    #[clap(short, long)]
    interface: Option<String>,

    /// Replay a pcap file instead of capturing live
    #[clap(short, long)]
    read: Option<PathBuf>,

    /// Port for the dashboard, overrides the config file
    #[clap(short, long)]
    port: Option<u16>,

    /// Enable promiscuous mode
    #[clap(short = 'P', long)]
    promiscuous: bool,

    /// BPF filter expression
    #[clap(long)]
    filter: Option<String>,

    /// Bytes to strip in front of every captured frame, overrides the config file
    #[clap(long)]
    prefix_len: Option<usize>,

    /// Name unknown devices by their MAC address
    #[clap(long)]
    pass_through: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[clap(long, default_value = "info")]
    log_level: String,
}

#[actix_web::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_logger(logging::get_log_level(&args.log_level));

    info!("Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    info!(
        "Loaded {} devices, tracking {:?}",
        config.devices.len(),
        config.tracking_devices()
    );

    let notifier: Arc<dyn NotificationSink> = if config.notify.enabled {
        Arc::new(HttpNotifier::start(&config.notify)?)
    } else {
        info!("Notifications disabled, events are only logged");
        Arc::new(LogNotifier)
    };

    let pipeline = Pipeline::from_config(&config, args.pass_through, Some(notifier), now_timestamp())
        .into_shared();

    let app_config = AppConfig {
        interface: args.interface,
        read_file: args.read,
        promiscuous: args.promiscuous,
        filter: args.filter,
        prefix_len: args.prefix_len.unwrap_or(config.capture.prefix_len),
    };

    let mut manager = CaptureManager::new(app_config, pipeline.clone());
    manager.start_capture()?;
    let manager: SharedCaptureManager = Arc::new(RwLock::new(manager));

    if config.web.enabled {
        let port = args.port.unwrap_or(config.web.port);
        info!("Starting dashboard on {}:{}", config.web.bind, port);

        let pipeline_state = web::Data::new(pipeline.clone());
        let manager_state = web::Data::new(manager.clone());
        HttpServer::new(move || {
            App::new()
                .app_data(pipeline_state.clone())
                .app_data(manager_state.clone())
                .configure(routes::configure)
        })
        .bind((config.web.bind.as_str(), port))?
        .run()
        .await?;
    } else {
        wait_for_shutdown(&manager).await?;
    }

    if let Err(e) = manager.write().await.stop_capture() {
        warn!("{}", e);
    }
    log_summary(&pipeline);
    Ok(())
}

/// Wait for Ctrl-C, or for the capture to end on its own (pcap replay)
async fn wait_for_shutdown(manager: &SharedCaptureManager) -> Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut poll = tokio::time::interval(Duration::from_millis(500));

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result?;
                info!("Interrupted, shutting down");
                return Ok(());
            }
            _ = poll.tick() => {
                if !manager.read().await.get_status() {
                    info!("Capture finished");
                    return Ok(());
                }
            }
        }
    }
}

fn log_summary(pipeline: &SharedPipeline) {
    let pipeline = pipeline.lock();
    let stats = pipeline.stats();
    info!(
        "Processed {} frames in {} flows: {:?}",
        stats.packets_count(),
        stats.flows_len(),
        stats.packet_types()
    );
}
