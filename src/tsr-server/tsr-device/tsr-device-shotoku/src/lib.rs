// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Camera robotics driver. Shots are framed binary commands over a
//! reconnecting TCP connection; sequences fire their shots at offsets from
//! the command time.

pub mod command;
pub mod state;
pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use tsr_core::device::connection::{TcpConnection, TcpConnectionOptions};
use tsr_core::types::shotoku::ShotokuSequenceShot;
use tsr_core::{
    Clock, CoreOptions, Device, DeviceCommand, DeviceCore, DeviceError, DeviceEventEmitter,
    DeviceFuture, DeviceResult, DeviceStatus, DeviceType, Mappings, QueuedCommand, ResolvedState,
    StatusCode, Timestamp,
};

use crate::command::{diff_states, encode_shot, ShotokuAction, ShotokuCommand};
use crate::state::{convert_state, ShotokuState};
use crate::transport::ShotokuTransport;

pub use crate::transport::SimulatedTransport;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ShotokuOptions {
    pub host: String,
    pub port: u16,
    pub connect_timeout_ms: u64,
    pub reconnect_delay_ms: u64,
    pub monitor_interval_ms: u64,
}

impl Default for ShotokuOptions {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 0,
            connect_timeout_ms: 3_000,
            reconnect_delay_ms: 5_000,
            monitor_interval_ms: 1_000,
        }
    }
}

impl ShotokuOptions {
    pub fn validate(&self) -> DeviceResult<()> {
        if self.host.trim().is_empty() {
            return Err(DeviceError::config("Shotoku bad option: host"));
        }
        if self.port == 0 {
            return Err(DeviceError::config("Shotoku bad option: port"));
        }
        Ok(())
    }

    /// Start a reconnecting connection to the controller. Needs a running
    /// tokio runtime.
    pub fn connect(&self) -> DeviceResult<TcpConnection> {
        self.validate()?;
        let mut options = TcpConnectionOptions::new(self.host.clone(), self.port);
        options.connect_timeout = Duration::from_millis(self.connect_timeout_ms);
        options.reconnect_delay = Duration::from_millis(self.reconnect_delay_ms);
        Ok(TcpConnection::spawn(options))
    }
}

/// A sequence shot waiting for its offset to elapse.
struct PendingShot {
    fire_at: Timestamp,
    task: JoinHandle<()>,
}

pub struct ShotokuDevice {
    core: DeviceCore<ShotokuState, ShotokuCommand>,
    transport: Arc<dyn ShotokuTransport>,
    options: ShotokuOptions,
    pending: Vec<PendingShot>,
    connected: bool,
}

impl ShotokuDevice {
    pub fn new(
        device_id: impl Into<String>,
        transport: Arc<dyn ShotokuTransport>,
        clock: Arc<dyn Clock>,
        core_options: CoreOptions,
        options: ShotokuOptions,
    ) -> Self {
        Self {
            core: DeviceCore::new(device_id, clock, core_options),
            transport,
            options,
            pending: Vec::new(),
            connected: false,
        }
    }

    pub fn current_state(&self) -> Option<&ShotokuState> {
        self.core.current_state().map(|entry| &entry.state)
    }

    /// Sequence shots not fired yet.
    pub fn pending_shots(&self) -> usize {
        self.pending.iter().filter(|p| !p.task.is_finished()).count()
    }

    fn set_connected(&mut self, connected: bool) {
        if self.connected != connected {
            self.connected = connected;
            self.core.events().notify_connection_changed(&self.status());
        }
    }

    async fn execute(&mut self, command: &ShotokuCommand) -> DeviceResult<()> {
        match &command.action {
            ShotokuAction::Shot(shot) => self.transport.send(encode_shot(shot).to_vec()).await,
            ShotokuAction::Sequence { shots, .. } => {
                self.start_sequence(command.time, shots);
                Ok(())
            }
        }
    }

    fn start_sequence(&mut self, start: Timestamp, shots: &[ShotokuSequenceShot]) {
        self.pending.retain(|p| !p.task.is_finished());
        let now = self.core.now();
        for shot in shots {
            let fire_at = start + shot.offset;
            let delay = Duration::from_millis(u64::try_from(fire_at - now).unwrap_or(0));
            let frame = encode_shot(&shot.shot).to_vec();
            let transport = self.transport.clone();
            let events = self.core.events().clone();
            let task = tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if let Err(err) = transport.send(frame).await {
                    warn!("Sequence shot failed: {}", err);
                    events.notify_warning(&format!("Command from sequence failed: {}", err));
                }
            });
            self.pending.push(PendingShot { fire_at, task });
        }
    }

    /// Abort sequence shots due strictly after `time`, like the command queue.
    fn abort_pending_after(&mut self, time: Timestamp) {
        self.pending.retain(|p| {
            if p.fire_at > time {
                p.task.abort();
                false
            } else {
                !p.task.is_finished()
            }
        });
    }
}

impl Device for ShotokuDevice {
    fn device_id(&self) -> &str {
        self.core.device_id()
    }

    fn device_type(&self) -> DeviceType {
        DeviceType::Shotoku
    }

    fn device_name(&self) -> String {
        format!("Shotoku {}:{}", self.options.host, self.options.port)
    }

    fn events(&self) -> &Arc<DeviceEventEmitter> {
        self.core.events()
    }

    fn init(&mut self) -> DeviceFuture<'_, ()> {
        Box::pin(async move {
            self.options.validate()?;
            let limit = Duration::from_millis(self.options.connect_timeout_ms);
            let connected = self.transport.wait_connected(limit).await?;
            if !connected {
                // The connection keeps retrying in the background.
                self.core.warn(&format!(
                    "TCP timeout: Unable to connect to {}:{}",
                    self.options.host, self.options.port
                ));
            }
            self.set_connected(connected);
            Ok(())
        })
    }

    fn terminate(&mut self) -> DeviceFuture<'_, ()> {
        Box::pin(async move {
            self.core.clear_queue();
            for p in self.pending.drain(..) {
                p.task.abort();
            }
            self.transport.dispose().await?;
            self.set_connected(false);
            Ok(())
        })
    }

    fn handle_state(&mut self, state: &ResolvedState) {
        self.core.handle_state(state.time, |old, ctx, warnings| {
            let new = convert_state(state, ctx.mappings, ctx.device_id, warnings);
            let commands = diff_states(&old.state, &new, state.time);
            (new, commands)
        });
    }

    fn prepare_for_handle_state(&mut self, time: Timestamp) {
        self.core.prepare_for_handle_state(time);
    }

    fn clear_future(&mut self, time: Timestamp) {
        self.core.clear_future(time);
        self.abort_pending_after(time);
    }

    fn set_mappings(&mut self, mappings: Mappings) {
        self.core.set_mappings(mappings);
    }

    fn status(&self) -> DeviceStatus {
        let mut status = DeviceStatus::good();
        if !self.connected {
            status.degrade(StatusCode::Bad, "Not connected");
        }
        status
    }

    fn connected(&self) -> bool {
        self.connected
    }

    fn queue(&self) -> Vec<QueuedCommand> {
        self.core.queue_snapshot()
    }

    fn execute_due(&mut self) -> DeviceFuture<'_, ()> {
        Box::pin(async move {
            for entry in self.core.take_due() {
                debug!("{}: executing {}", self.core.device_id(), entry.payload.context());
                let sent = self.core.command_started(&entry);
                let result = self.execute(&entry.payload).await;
                self.core.command_finished(&entry, sent, result);
            }
            let connected = self.transport.is_connected();
            self.set_connected(connected);
            Ok(())
        })
    }

    fn monitor_interval(&self) -> Option<Duration> {
        Some(Duration::from_millis(self.options.monitor_interval_ms))
    }

    fn monitor(&mut self) -> DeviceFuture<'_, ()> {
        Box::pin(async move {
            let connected = self.transport.is_connected();
            self.set_connected(connected);
            Ok(())
        })
    }
}
