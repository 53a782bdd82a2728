// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Task owning one device.
//!
//! The device is only ever touched from here: requests, the drain tick and
//! the monitor tick are serialised by one `select!` loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use tsr_core::{Device, DeviceResult, Mappings};
use tsr_protocol::{ClientCommand, DeviceReport};

use crate::device_handle::DeviceRequest;
use crate::events::LoggingListener;

pub struct DeviceTaskConfig {
    pub device: Box<dyn Device>,
    pub mappings: Mappings,
    /// Drain interval for due commands.
    pub tick: Duration,
}

/// Snapshot of `device` as reported to clients.
pub fn device_report(device: &dyn Device, with_queue: bool, error: Option<String>) -> DeviceReport {
    DeviceReport {
        device_id: device.device_id().to_string(),
        device_type: device.device_type(),
        device_name: device.device_name(),
        connected: device.connected(),
        status: device.status(),
        queue: with_queue.then(|| device.queue()),
        error,
    }
}

/// Run `cmd` against `device`. Returns whether the queue belongs in the
/// answer.
pub async fn apply_command(device: &mut dyn Device, cmd: ClientCommand) -> DeviceResult<bool> {
    match cmd {
        ClientCommand::HandleState { state } => device.handle_state(&state),
        ClientCommand::PrepareForHandleState { time } => device.prepare_for_handle_state(time),
        ClientCommand::ClearFuture { time } => device.clear_future(time),
        ClientCommand::SetMappings { mappings } => device.set_mappings(mappings),
        ClientCommand::MakeReady { ok_to_destroy } => device.make_ready(ok_to_destroy).await?,
        ClientCommand::StandDown { ok_to_destroy } => device.stand_down(ok_to_destroy).await?,
        ClientCommand::SetExpectedPlayoutItems { items } => {
            device.handle_expected_playout_items(items).await?
        }
        ClientCommand::GetQueue => return Ok(true),
        ClientCommand::GetStatus | ClientCommand::GetDevices => {}
    }
    Ok(false)
}

async fn next_monitor(monitor: &mut Option<Interval>) {
    match monitor {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn wait_for_shutdown(mut shutdown_rx: watch::Receiver<bool>) {
    if *shutdown_rx.borrow() {
        return;
    }
    while shutdown_rx.changed().await.is_ok() {
        if *shutdown_rx.borrow() {
            break;
        }
    }
}

pub async fn run_device_task(
    config: DeviceTaskConfig,
    mut rx: mpsc::Receiver<DeviceRequest>,
    report_tx: watch::Sender<DeviceReport>,
    shutdown_rx: watch::Receiver<bool>,
) {
    let DeviceTaskConfig {
        mut device,
        mappings,
        tick,
    } = config;
    let device_id = device.device_id().to_string();

    device.events().register(Arc::new(LoggingListener));
    device.set_mappings(mappings);

    info!("[{}] initializing {}", device_id, device.device_name());
    let init_error = match device.init().await {
        Ok(()) => None,
        Err(e) => {
            error!("[{}] init failed: {}", device_id, e);
            Some(e.to_string())
        }
    };
    let _ = report_tx.send(device_report(device.as_ref(), false, init_error));

    let mut drain = time::interval(tick);
    drain.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut monitor = device.monitor_interval().map(|period| {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    let shutdown = wait_for_shutdown(shutdown_rx);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = drain.tick() => {
                if let Err(e) = device.execute_due().await {
                    warn!("[{}] executing due commands failed: {}", device_id, e);
                }
            }
            _ = next_monitor(&mut monitor) => {
                if let Err(e) = device.monitor().await {
                    warn!("[{}] monitor failed: {}", device_id, e);
                }
                let _ = report_tx.send(device_report(device.as_ref(), false, None));
            }
            maybe_req = rx.recv() => {
                let Some(req) = maybe_req else {
                    debug!("[{}] request channel closed", device_id);
                    break;
                };
                let report = match apply_command(device.as_mut(), req.cmd).await {
                    Ok(with_queue) => device_report(device.as_ref(), with_queue, None),
                    Err(e) => {
                        warn!("[{}] command failed: {}", device_id, e);
                        device_report(device.as_ref(), false, Some(e.to_string()))
                    }
                };
                let _ = report_tx.send(DeviceReport { queue: None, ..report.clone() });
                let _ = req.respond_to.send(report);
            }
            _ = &mut shutdown => {
                break;
            }
        }
    }

    info!("[{}] terminating", device_id);
    if let Err(e) = device.terminate().await {
        warn!("[{}] terminate failed: {}", device_id, e);
    }
}
