// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

mod conductor;
mod config;
mod device_handle;
mod device_task;
mod events;
mod listener;

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

use tsr_app::{init_logging, ConfigFile};
use tsr_core::{Clock, DynResult, SystemClock};
use tsr_device::{register_builtin_devices_on, DeviceSpec, RegistrationContext};
use tsr_protocol::{NoAuthValidator, SimpleTokenValidator, TokenValidator};

use conductor::Conductor;
use config::ServerConfig;
use device_handle::{DeviceHandle, DeviceRequest};
use device_task::{device_report, run_device_task, DeviceTaskConfig};

const PKG_DESCRIPTION: &str = concat!(env!("CARGO_PKG_NAME"), " - timeline state resolver daemon");
const DEVICE_TASK_CHANNEL_BUFFER: usize = 32;
const SHUTDOWN_GRACE: Duration = Duration::from_millis(400);

#[derive(Debug, Parser)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = PKG_DESCRIPTION,
)]
struct Cli {
    /// Path to configuration file
    #[arg(long = "config", short = 'C', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print example configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,
    /// IP address for the JSON TCP listener
    #[arg(short = 'l', long = "listen")]
    listen: Option<IpAddr>,
    /// Port for the JSON TCP listener
    #[arg(short = 'p', long = "port")]
    port: Option<u16>,
}

fn build_validator(cfg: &ServerConfig) -> Arc<dyn TokenValidator> {
    let auth = &cfg.listen.auth;
    if auth.tokens.is_empty() && auth.read_tokens.is_empty() {
        Arc::new(NoAuthValidator)
    } else {
        Arc::new(SimpleTokenValidator::new(
            auth.tokens.iter().cloned(),
            auth.read_tokens.iter().cloned(),
        ))
    }
}

#[tokio::main]
async fn main() -> DynResult<()> {
    let mut registry = RegistrationContext::new();
    register_builtin_devices_on(&mut registry);

    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", ServerConfig::example_toml());
        return Ok(());
    }

    let (mut cfg, config_path) = if let Some(ref path) = cli.config {
        let cfg = ServerConfig::load_from_file(path)?;
        (cfg, Some(path.clone()))
    } else {
        ServerConfig::load_from_default_paths()?
    };
    if let Some(listen) = cli.listen {
        cfg.listen.listen = listen;
    }
    if let Some(port) = cli.port {
        cfg.listen.port = port;
    }

    init_logging(cfg.general.log_level.as_deref());

    if let Some(ref path) = config_path {
        info!("Loaded configuration from {}", path.display());
    }
    info!("Registered device types: {}", registry.registered_devices().join(", "));

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let tick = Duration::from_millis(cfg.engine.tick_ms);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut task_handles: Vec<JoinHandle<()>> = Vec::new();
    let mut device_handles: Vec<DeviceHandle> = Vec::new();

    for device_cfg in cfg.enabled_devices() {
        let spec = DeviceSpec {
            device_id: device_cfg.id.clone(),
            access: device_cfg.access.clone(),
            clock: Arc::clone(&clock),
            core: cfg.engine.core_options(),
            options: device_cfg.options_json()?,
        };
        let device = registry
            .build_device(&device_cfg.device_type, spec)
            .map_err(|e| format!("Device {}: {}", device_cfg.id, e))?;
        info!(
            "Starting device {} ({}, access: {:?})",
            device_cfg.id, device_cfg.device_type, device_cfg.access
        );

        let (tx, rx) = mpsc::channel::<DeviceRequest>(DEVICE_TASK_CHANNEL_BUFFER);
        let (report_tx, report_rx) = watch::channel(device_report(device.as_ref(), false, None));
        let task_config = DeviceTaskConfig {
            device,
            mappings: cfg.mappings.clone(),
            tick,
        };
        task_handles.push(tokio::spawn(run_device_task(
            task_config,
            rx,
            report_tx,
            shutdown_rx.clone(),
        )));
        device_handles.push(DeviceHandle {
            device_id: device_cfg.id.clone(),
            tx,
            report_rx,
        });
    }

    if device_handles.is_empty() {
        info!("No devices configured");
    }
    let conductor = Arc::new(Conductor::new(device_handles));

    if cfg.listen.enabled {
        let addr = SocketAddr::from((cfg.listen.listen, cfg.listen.port));
        let validator = build_validator(&cfg);
        let conductor = Arc::clone(&conductor);
        let listener_shutdown_rx = shutdown_rx.clone();
        task_handles.push(tokio::spawn(async move {
            if let Err(e) =
                listener::run_listener(addr, conductor, validator, listener_shutdown_rx).await
            {
                error!("Listener error: {:?}", e);
            }
        }));
    }

    signal::ctrl_c().await?;
    info!("Ctrl+C received, shutting down");
    let _ = shutdown_tx.send(true);
    drop(conductor);
    tokio::time::sleep(SHUTDOWN_GRACE).await;

    for handle in &task_handles {
        if !handle.is_finished() {
            handle.abort();
        }
    }
    for handle in task_handles {
        let _ = handle.await;
    }
    Ok(())
}
