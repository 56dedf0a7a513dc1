mod bluetooth;
mod config;
mod emitter;
mod gateway;
mod models;
mod transport;
mod utils;
mod window;

use log::{error, info, warn};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

use bluetooth::scan_for_beacons;
use config::GatewayConfig;
use gateway::GatewayContext;
use models::Observation;
use transport::{link_is_up, HttpTransport};
use utils::{format_datetime, MonotonicClock};

const OBSERVATION_QUEUE_DEPTH: usize = 256;

async fn main_loop(config: GatewayConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting BLE RSSI gateway '{}'", config.gateway_id);

    let transport = HttpTransport::new(config.server_url.clone(), config.http_timeout)?;
    info!("Reporting to {}", transport.endpoint());

    let clock = MonotonicClock::start();
    let mut gateway = GatewayContext::from_config(&config);

    let (tx, mut rx) = mpsc::channel::<Observation>(OBSERVATION_QUEUE_DEPTH);
    let mut scanner = tokio::spawn(scan_for_beacons(config.beacons.clone(), clock, tx));

    let mut ticker = interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            result = &mut scanner => {
                return match result {
                    Ok(Ok(())) => Err("Scanner stopped".into()),
                    Ok(Err(e)) => Err(format!("Scanner failed: {}", e).into()),
                    Err(e) => Err(format!("Scanner task panicked: {}", e).into()),
                };
            }
        }

        // Absorb everything the scanner delivered since the last tick
        while let Ok(observation) = rx.try_recv() {
            gateway.absorb(&observation);
        }

        let now = clock.now_ms();
        if let Some(reports) = gateway.tick(now, link_is_up) {
            info!(
                "Sweep at {} ({} ms): {} report(s) from {} beacon(s)",
                format_datetime(&OffsetDateTime::now_utc()),
                now,
                reports.len(),
                gateway.registry().len()
            );
            if reports.is_empty() && gateway.registry().is_empty() {
                warn!("No beacon seen yet");
            }
            transport.deliver(&reports).await;
            gateway.finish_sweep();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_millis()
        .init();

    // Load configuration
    let config = match GatewayConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        let _ = tx.send(());
    });

    // Run main loop or wait for shutdown signal
    tokio::select! {
        result = main_loop(config) => {
            match result {
                Ok(_) => info!("Gateway stopped"),
                Err(e) => {
                    error!("Fatal error: {}", e);
                    return Err(e);
                }
            }
        }
        _ = &mut rx => {
            info!("Gateway terminated by user. Exiting gracefully.");
        }
    }

    Ok(())
}
