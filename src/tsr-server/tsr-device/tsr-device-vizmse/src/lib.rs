// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Graphics engine driver, controlled through a media sequencer.

pub mod command;
pub mod convert;
pub mod diff;
pub mod peer;
pub mod resources;
pub mod sim;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use tsr_core::{
    Clock, CoreOptions, Device, DeviceCommand, DeviceCore, DeviceError, DeviceEventEmitter,
    DeviceFuture, DeviceResult, DeviceStatus, DeviceType, ExpectedPlayoutItem, Mappings, QueuedCommand, ResolvedState, StatusCode,
    Timestamp,
};

use crate::command::VizMseCommand;
use crate::convert::convert_state;
use crate::diff::{diff_states, DiffTiming};
use crate::peer::{Mse, RundownInfo};
use crate::resources::{ElementManager, ManagerOptions};
use crate::state::VizMseState;

pub use crate::sim::SimulatedMse;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct VizMseOptions {
    pub host: String,
    pub rest_port: Option<u16>,
    pub ws_port: Option<u16>,
    pub show_id: String,
    pub profile: String,
    pub playlist_id: Option<String>,
    /// Create and load every expected element ahead of use.
    pub preload_all_elements: bool,
    pub monitor_interval_ms: u64,
    pub safe_preload_ms: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub timing: DiffTiming,
}

impl Default for VizMseOptions {
    fn default() -> Self {
        Self {
            host: String::new(),
            rest_port: None,
            ws_port: None,
            show_id: String::new(),
            profile: String::new(),
            playlist_id: None,
            preload_all_elements: false,
            monitor_interval_ms: 5_000,
            safe_preload_ms: 2_000,
            retry_attempts: 5,
            retry_delay_ms: 300,
            timing: DiffTiming::default(),
        }
    }
}

impl VizMseOptions {
    pub fn validate(&self) -> DeviceResult<()> {
        if self.host.trim().is_empty() {
            return Err(DeviceError::config("VizMSE bad option: host"));
        }
        if self.show_id.trim().is_empty() {
            return Err(DeviceError::config("VizMSE bad option: show_id"));
        }
        if self.profile.trim().is_empty() {
            return Err(DeviceError::config("VizMSE bad option: profile"));
        }
        Ok(())
    }

    fn manager_options(&self) -> ManagerOptions {
        ManagerOptions {
            preload_all_elements: self.preload_all_elements,
            retry_attempts: self.retry_attempts,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            safe_preload_window: Duration::from_millis(self.safe_preload_ms),
            ..ManagerOptions::default()
        }
    }

    fn rundown_info(&self) -> RundownInfo {
        RundownInfo {
            show: self.show_id.clone(),
            profile: self.profile.clone(),
            playlist: self.playlist_id.clone(),
        }
    }
}

pub struct VizMseDevice {
    core: DeviceCore<VizMseState, VizMseCommand>,
    options: VizMseOptions,
    manager: ElementManager,
    connected: bool,
}

impl VizMseDevice {
    pub fn new(
        device_id: impl Into<String>,
        mse: Arc<dyn Mse>,
        clock: Arc<dyn Clock>,
        core_options: CoreOptions,
        options: VizMseOptions,
    ) -> Self {
        let core = DeviceCore::new(device_id, clock, core_options);
        let manager = ElementManager::new(mse, options.manager_options(), core.events().clone());
        Self {
            core,
            options,
            manager,
            connected: false,
        }
    }

    /// Latest engine state computed by `handle_state`.
    pub fn current_state(&self) -> Option<&VizMseState> {
        self.core.current_state().map(|entry| &entry.state)
    }

    pub fn element_manager(&self) -> &ElementManager {
        &self.manager
    }

    fn set_connected(&mut self, connected: bool) {
        if self.connected != connected {
            self.connected = connected;
            self.core.events().notify_connection_changed(&self.status());
        }
    }
}

impl Device for VizMseDevice {
    fn device_id(&self) -> &str {
        self.core.device_id()
    }

    fn device_type(&self) -> DeviceType {
        DeviceType::VizMse
    }

    fn device_name(&self) -> String {
        format!("VizMSE {}", self.manager.host())
    }

    fn events(&self) -> &Arc<DeviceEventEmitter> {
        self.core.events()
    }

    fn init(&mut self) -> DeviceFuture<'_, ()> {
        Box::pin(async move {
            self.options.validate()?;
            self.manager.initialize_rundown(self.options.rundown_info()).await?;
            self.set_connected(true);
            Ok(())
        })
    }

    fn terminate(&mut self) -> DeviceFuture<'_, ()> {
        Box::pin(async move {
            self.core.clear_queue();
            let result = self.manager.terminate().await;
            self.set_connected(false);
            result
        })
    }

    fn handle_state(&mut self, state: &ResolvedState) {
        if !self.manager.is_initialized() {
            self.core.warn("VizMSE not initialized yet");
            return;
        }
        let timing = self.options.timing;
        self.core.handle_state(state.time, |old, ctx, warnings| {
            let new = convert_state(state, ctx.mappings, ctx.device_id, warnings);
            let commands = diff_states(&old.state, &new, state.time, ctx.now, &timing);
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
        let (not_loaded, loading) = self.manager.load_counts();
        if not_loaded > 0 || loading > 0 {
            status.degrade(
                StatusCode::WarningMinor,
                format!(
                    "Got {} elements not yet loaded to the Viz Engine ({} are currently loading)",
                    not_loaded, loading
                ),
            );
        }
        status.active = self.manager.is_active();
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
                let result = self.manager.execute(&entry.payload.action).await;
                self.core.command_finished(&entry, sent, result);
            }
            let connected = self.manager.is_connected();
            self.set_connected(connected);
            Ok(())
        })
    }

    fn monitor_interval(&self) -> Option<Duration> {
        Some(Duration::from_millis(self.options.monitor_interval_ms))
    }

    fn monitor(&mut self) -> DeviceFuture<'_, ()> {
        Box::pin(async move {
            let connected = self.manager.is_connected();
            self.set_connected(connected);
            if self.manager.monitor().await {
                self.core.events().notify_connection_changed(&self.status());
            }
            Ok(())
        })
    }

    fn make_ready(&mut self, ok_to_destroy: bool) -> DeviceFuture<'_, ()> {
        Box::pin(async move {
            if !self.manager.is_initialized() {
                return Err(DeviceError::config("Unable to activate VizMSE, not initialized yet"));
            }
            self.manager.activate().await?;
            if ok_to_destroy {
                self.core.clear_states();
            }
            Ok(())
        })
    }

    fn stand_down(&mut self, ok_to_destroy: bool) -> DeviceFuture<'_, ()> {
        Box::pin(async move {
            if ok_to_destroy && self.manager.is_initialized() {
                self.manager.deactivate().await?;
            }
            Ok(())
        })
    }

    fn handle_expected_playout_items(&mut self, items: Vec<ExpectedPlayoutItem>) -> DeviceFuture<'_, ()> {
        Box::pin(async move {
            let items = items
                .into_iter()
                .filter_map(|item| match item {
                    ExpectedPlayoutItem::VizMse(item) => Some(item),
                    ExpectedPlayoutItem::Other => None,
                })
                .collect();
            self.manager.set_expected_items(items).await;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::MseCall;
    use tsr_core::device::controller::{RecordedEvent, RecordingListener};
    use tsr_core::types::vizmse::{VizMseContent, VizMseContinue, VizMseElementInternal};
    use tsr_core::{ManualClock, Mapping, MappingOptions, ResolvedInstance, TimelineContent};

    fn options() -> VizMseOptions {
        VizMseOptions {
            host: "mse0".into(),
            show_id: "show0".into(),
            profile: "sofie".into(),
            ..VizMseOptions::default()
        }
    }

    fn lower(data: &str) -> TimelineContent {
        TimelineContent::VizMse(VizMseContent::ElementInternal(VizMseElementInternal {
            template_name: "lower".into(),
            template_data: vec![data.into()],
            channel_name: None,
            continue_step: None,
            cue: false,
        }))
    }

    async fn device(sim: &SimulatedMse, clock: &ManualClock) -> (VizMseDevice, Arc<RecordingListener>) {
        let mut device = VizMseDevice::new(
            "viz0",
            Arc::new(sim.clone()),
            Arc::new(clock.clone()),
            CoreOptions::default(),
            options(),
        );
        let listener = RecordingListener::new();
        device.events().register(listener.clone());
        let mut mappings = Mappings::new();
        mappings.insert("gfx".into(), Mapping::new("viz0", MappingOptions::VizMse));
        mappings.insert("gfx_cont".into(), Mapping::new("viz0", MappingOptions::VizMse));
        device.set_mappings(mappings);
        device.init().await.unwrap();
        (device, listener)
    }

    #[tokio::test]
    async fn test_init_rejects_missing_host() {
        let sim = SimulatedMse::new("mse0");
        let mut device = VizMseDevice::new(
            "viz0",
            Arc::new(sim.clone()),
            Arc::new(ManualClock::new(0)),
            CoreOptions::default(),
            VizMseOptions::default(),
        );
        let err = device.init().await.unwrap_err();
        assert_eq!(err, DeviceError::config("VizMSE bad option: host"));
        assert!(sim.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_take_executes_at_its_time() {
        let sim = SimulatedMse::new("mse0");
        let clock = ManualClock::new(0);
        let (mut device, listener) = device(&sim, &clock).await;
        assert!(device.connected());
        assert_eq!(device.status().status_code, StatusCode::Good);

        device.handle_state(&ResolvedState::new(1_000).with_layer("gfx", ResolvedInstance::new("obj0", lower("a"))));

        let queued = device.queue();
        assert_eq!(queued.len(), 2);
        assert_eq!(queued[0].context, "prepare_obj0");
        assert!(queued[0].time <= 1_000);
        assert_eq!(queued[1].context, "take_obj0");
        assert_eq!(queued[1].time, 1_000);

        clock.set(queued[0].time);
        device.execute_due().await.unwrap();
        assert_eq!(sim.count("create_internal"), 1);
        assert_eq!(sim.count("take"), 0);

        clock.set(1_000);
        device.execute_due().await.unwrap();
        assert_eq!(sim.count("take"), 1);
        assert!(device.queue().is_empty());
        assert!(listener.warnings().is_empty());
        assert!(listener.command_errors().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_reference_only_warns() {
        let sim = SimulatedMse::new("mse0");
        let clock = ManualClock::new(0);
        let (mut device, listener) = device(&sim, &clock).await;

        let cont = TimelineContent::VizMse(VizMseContent::Continue(VizMseContinue {
            reference: "gfx".into(),
            direction: None,
        }));
        device.handle_state(&ResolvedState::new(500).with_layer("gfx_cont", ResolvedInstance::new("obj1", cont)));

        assert!(device.queue().is_empty());
        assert_eq!(listener.warnings().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_state_supersedes_queued_commands() {
        let sim = SimulatedMse::new("mse0");
        let clock = ManualClock::new(0);
        let (mut device, _) = device(&sim, &clock).await;

        device.handle_state(&ResolvedState::new(2_000).with_layer("gfx", ResolvedInstance::new("obj0", lower("a"))));
        device.prepare_for_handle_state(900);
        device.handle_state(&ResolvedState::new(900).with_layer("gfx", ResolvedInstance::new("obj1", lower("b"))));

        let contexts: Vec<String> = device.queue().into_iter().map(|q| q.context).collect();
        assert_eq!(contexts, vec!["prepare_obj1".to_string(), "take_obj1".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_command_reports_and_continues() {
        let sim = SimulatedMse::new("mse0");
        let clock = ManualClock::new(0);
        let (mut device, listener) = device(&sim, &clock).await;
        device.handle_state(&ResolvedState::new(100).with_layer("gfx", ResolvedInstance::new("obj0", lower("a"))));
        sim.fail_next("create_internal", DeviceError::remote("template missing"));

        clock.set(100);
        device.execute_due().await.unwrap();

        // The prepare failed, the take created the element late and ran.
        assert_eq!(listener.command_errors(), vec![DeviceError::remote("template missing")]);
        assert_eq!(sim.count("take"), 1);
        assert!(listener.warnings()[0].starts_with("Late preparation"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_degrades_status() {
        let sim = SimulatedMse::new("mse0");
        let clock = ManualClock::new(0);
        let (mut device, listener) = device(&sim, &clock).await;
        listener.clear();

        sim.set_connected(false);
        device.monitor().await.unwrap();

        let status = device.status();
        assert_eq!(status.status_code, StatusCode::Bad);
        assert_eq!(status.messages, vec!["Not connected".to_string()]);
        assert!(matches!(
            listener.events().as_slice(),
            [RecordedEvent::ConnectionChanged(s)] if s.status_code == StatusCode::Bad
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_make_ready_and_stand_down() {
        let sim = SimulatedMse::new("mse0");
        let clock = ManualClock::new(0);
        let (mut device, _) = device(&sim, &clock).await;
        device.handle_state(&ResolvedState::new(100).with_layer("gfx", ResolvedInstance::new("obj0", lower("a"))));
        assert!(device.current_state().is_some());

        device.make_ready(true).await.unwrap();
        assert!(sim.is_active());
        assert!(device.current_state().is_none());

        device.stand_down(false).await.unwrap();
        assert!(sim.is_active());
        device.stand_down(true).await.unwrap();
        assert!(!sim.is_active());
        assert!(sim.calls().contains(&MseCall::Deactivate));
    }

    #[tokio::test]
    async fn test_handle_state_before_init_warns() {
        let sim = SimulatedMse::new("mse0");
        let mut device = VizMseDevice::new(
            "viz0",
            Arc::new(sim),
            Arc::new(ManualClock::new(0)),
            CoreOptions::default(),
            options(),
        );
        let listener = RecordingListener::new();
        device.events().register(listener.clone());

        device.handle_state(&ResolvedState::new(100));
        assert_eq!(listener.warnings(), vec!["VizMSE not initialized yet".to_string()]);
    }
}
