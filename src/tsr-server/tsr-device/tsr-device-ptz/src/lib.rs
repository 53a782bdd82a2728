// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Pan/tilt/zoom camera driver.

pub mod command;
pub mod http;
pub mod peer;
pub mod sim;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use tsr_core::{
    Clock, CoreOptions, Device, DeviceCore, DeviceError, DeviceEventEmitter, DeviceFuture, DeviceResult,
    DeviceStatus, DeviceType, Mappings, QueuedCommand, ResolvedState, StatusCode, Timestamp,
};

use crate::command::{diff_states, PtzCommand};
use crate::peer::{CameraCommand, PtzCamera};
use crate::state::{convert_state, PtzState};

pub use crate::http::PtzHttpCamera;
pub use crate::sim::SimulatedCamera;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PtzOptions {
    pub host: String,
    pub port: Option<u16>,
    pub https: bool,
    /// How often the camera is probed for liveness.
    pub probe_interval_ms: u64,
    pub min_command_interval_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for PtzOptions {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: None,
            https: false,
            probe_interval_ms: 10_000,
            min_command_interval_ms: 130,
            request_timeout_ms: 2_000,
        }
    }
}

impl PtzOptions {
    pub fn validate(&self) -> DeviceResult<()> {
        if self.host.trim().is_empty() {
            return Err(DeviceError::config("There are no cameras set up for this device"));
        }
        Ok(())
    }

    /// HTTP camera for these options.
    pub fn http_camera(&self) -> DeviceResult<PtzHttpCamera> {
        self.validate()?;
        PtzHttpCamera::new(
            &self.host,
            self.port,
            self.https,
            Duration::from_millis(self.request_timeout_ms),
            Duration::from_millis(self.min_command_interval_ms),
        )
    }
}

pub struct PtzDevice {
    core: DeviceCore<PtzState, PtzCommand>,
    camera: Arc<dyn PtzCamera>,
    options: PtzOptions,
    connected: bool,
}

impl PtzDevice {
    pub fn new(
        device_id: impl Into<String>,
        camera: Arc<dyn PtzCamera>,
        clock: Arc<dyn Clock>,
        core_options: CoreOptions,
        options: PtzOptions,
    ) -> Self {
        Self {
            core: DeviceCore::new(device_id, clock, core_options),
            camera,
            options,
            connected: false,
        }
    }

    pub fn current_state(&self) -> Option<&PtzState> {
        self.core.current_state().map(|entry| &entry.state)
    }

    fn set_connected(&mut self, connected: bool) {
        if self.connected != connected {
            self.connected = connected;
            self.core.events().notify_connection_changed(&self.status());
        }
    }

    async fn probe(&mut self) {
        match self.camera.send(CameraCommand::PowerQuery).await {
            Ok(power) => {
                debug!("PTZ {} power state {}", self.camera.address(), power);
                self.set_connected(true);
            }
            Err(err) => {
                warn!("PTZ {} probe failed: {}", self.camera.address(), err);
                self.set_connected(false);
            }
        }
    }
}

impl Device for PtzDevice {
    fn device_id(&self) -> &str {
        self.core.device_id()
    }

    fn device_type(&self) -> DeviceType {
        DeviceType::PanasonicPtz
    }

    fn device_name(&self) -> String {
        format!("Panasonic PTZ {}", self.core.device_id())
    }

    fn events(&self) -> &Arc<DeviceEventEmitter> {
        self.core.events()
    }

    fn init(&mut self) -> DeviceFuture<'_, ()> {
        Box::pin(async move {
            self.options.validate()?;
            self.probe().await;
            Ok(())
        })
    }

    fn terminate(&mut self) -> DeviceFuture<'_, ()> {
        Box::pin(async move {
            self.core.clear_queue();
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
                let command = CameraCommand::from_action(&entry.payload.action);
                debug!("{}: sending {} ({})", self.core.device_id(), command, entry.payload.context);
                let sent = self.core.command_started(&entry);
                let result = self.camera.send(command).await.map(|_| ());
                if let Err(err) = &result {
                    if err.is_connection() {
                        self.set_connected(false);
                    }
                }
                self.core.command_finished(&entry, sent, result);
            }
            Ok(())
        })
    }

    fn monitor_interval(&self) -> Option<Duration> {
        Some(Duration::from_millis(self.options.probe_interval_ms))
    }

    fn monitor(&mut self) -> DeviceFuture<'_, ()> {
        Box::pin(async move {
            self.probe().await;
            Ok(())
        })
    }
}
