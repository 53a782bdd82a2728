// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! State/queue bookkeeping shared by every driver.
//!
//! A driver owns one [`DeviceCore`] and supplies only its own conversion,
//! diffing and execution. The core keeps the state history, the scheduled
//! commands and the event emitter, and applies the common handle-state
//! sequence: look up the previous state, diff, cancel superseded commands,
//! enqueue, store.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::device::controller::events::{CommandContext, CommandReport, DeviceEventEmitter};
use crate::device::controller::queue::{CommandQueue, QueueEntry, DEFAULT_DUE_EPSILON_MS};
use crate::device::controller::store::{StateHistoryEntry, StateStore, DEFAULT_RETENTION_MS};
use crate::device::error::DeviceResult;
use crate::mapping::Mappings;
use crate::time::{Clock, Timestamp};

/// A command produced by a differ.
pub trait DeviceCommand: Clone + Serialize + Send + Sync {
    /// When the command should fire.
    fn time(&self) -> Timestamp;
    /// Grouping key used for cancellation.
    fn layer_id(&self) -> Option<&str>;
    fn timeline_obj_id(&self) -> &str;
    /// Short label used in error and report context, e.g. `take_obj0`.
    fn context(&self) -> String;
}

/// Behaviour shared by all devices, usually taken from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreOptions {
    pub due_epsilon_ms: i64,
    pub retention_ms: i64,
    /// Report commands sent later than this after their scheduled time.
    pub limit_slow_sent_ms: Option<i64>,
    /// Report commands fulfilled later than this after their scheduled time.
    pub limit_slow_fulfilled_ms: Option<i64>,
    pub report_all_commands: bool,
}

impl Default for CoreOptions {
    fn default() -> Self {
        Self {
            due_epsilon_ms: DEFAULT_DUE_EPSILON_MS,
            retention_ms: DEFAULT_RETENTION_MS,
            limit_slow_sent_ms: None,
            limit_slow_fulfilled_ms: None,
            report_all_commands: false,
        }
    }
}

/// Diagnostic view of one pending command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedCommand {
    pub id: u64,
    pub time: Timestamp,
    pub layer_id: Option<String>,
    pub context: String,
    pub command: serde_json::Value,
}

/// Inputs of a state transition besides the previous state.
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext<'a> {
    pub now: Timestamp,
    pub device_id: &'a str,
    pub mappings: &'a Mappings,
}

pub struct DeviceCore<S, C> {
    clock: Arc<dyn Clock>,
    events: Arc<DeviceEventEmitter>,
    mappings: Mappings,
    store: StateStore<S>,
    queue: CommandQueue<C>,
    options: CoreOptions,
}

impl<S, C> DeviceCore<S, C>
where
    S: Clone + Default,
    C: DeviceCommand,
{
    pub fn new(device_id: impl Into<String>, clock: Arc<dyn Clock>, options: CoreOptions) -> Self {
        Self {
            clock,
            events: Arc::new(DeviceEventEmitter::new(device_id)),
            mappings: Mappings::new(),
            store: StateStore::new(options.retention_ms),
            queue: CommandQueue::new(options.due_epsilon_ms),
            options,
        }
    }

    pub fn device_id(&self) -> &str {
        self.events.device_id()
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn events(&self) -> &Arc<DeviceEventEmitter> {
        &self.events
    }

    pub fn mappings(&self) -> &Mappings {
        &self.mappings
    }

    pub fn set_mappings(&mut self, mappings: Mappings) {
        self.mappings = mappings;
    }

    pub fn options(&self) -> &CoreOptions {
        &self.options
    }

    /// Latest stored device state.
    pub fn current_state(&self) -> Option<&StateHistoryEntry<S>> {
        self.store.entry_before(Timestamp::MAX)
    }

    pub fn state_before(&self, time: Timestamp) -> StateHistoryEntry<S> {
        self.store.state_before(time)
    }

    /// Run one handle-state cycle.
    ///
    /// `transition` receives the state that was active at
    /// `max(now, state_time)` and returns the new device state and the
    /// commands that reach it. Warnings it collects are emitted afterwards.
    pub fn handle_state<F>(&mut self, state_time: Timestamp, transition: F)
    where
        F: FnOnce(&StateHistoryEntry<S>, &TransitionContext<'_>, &mut Vec<String>) -> (S, Vec<C>),
    {
        let now = self.now();
        let previous_time = now.max(state_time);
        let old = self.store.state_before(previous_time);

        let mut warnings = Vec::new();
        let ctx = TransitionContext {
            now,
            device_id: self.events.device_id(),
            mappings: &self.mappings,
        };
        let (new_state, commands) = transition(&old, &ctx, &mut warnings);
        for message in warnings {
            self.warn(&message);
        }

        let dropped = self.queue.cancel_from(previous_time);
        if dropped > 0 {
            debug!("{}: dropped {} superseded commands", self.device_id(), dropped);
        }
        for command in commands {
            self.schedule(command);
        }
        self.store.set_state(new_state, state_time, now);
    }

    /// Flush commands and states that a handle-state at `time` supersedes.
    pub fn prepare_for_handle_state(&mut self, time: Timestamp) {
        self.queue.cancel_from(time);
        self.store.clear_from(time);
    }

    /// Drop commands scheduled after `time`.
    pub fn clear_future(&mut self, time: Timestamp) {
        self.queue.cancel_after(time);
    }

    /// Drop every pending command.
    pub fn clear_queue(&mut self) {
        self.queue.clear();
    }

    pub fn clear_states(&mut self) {
        self.store.clear();
    }

    pub fn schedule(&mut self, command: C) -> u64 {
        let layer = command.layer_id().map(str::to_owned);
        self.queue.enqueue(command.time(), layer, command)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queue_snapshot(&self) -> Vec<QueuedCommand> {
        self.queue
            .snapshot()
            .into_iter()
            .map(|entry| QueuedCommand {
                id: entry.id,
                time: entry.time,
                context: entry.payload.context(),
                command: serde_json::to_value(&entry.payload).unwrap_or_default(),
                layer_id: entry.group,
            })
            .collect()
    }

    /// Pop the commands due now, in execution order.
    pub fn take_due(&mut self) -> Vec<QueueEntry<C>> {
        let now = self.now();
        self.queue.take_due(now)
    }

    /// Mark `entry` as being sent. Returns the send time.
    pub fn command_started(&self, entry: &QueueEntry<C>) -> Timestamp {
        let sent_time = self.now();
        if let Some(limit) = self.options.limit_slow_sent_ms {
            let delay = sent_time - entry.time;
            if delay > limit {
                self.events.notify_slow_command(&format!(
                    "Slow sent command, should have been sent at {}, was {} ms slow (sent at {}). Command: {}",
                    entry.time,
                    delay,
                    sent_time,
                    command_json(&entry.payload)
                ));
            }
        }
        sent_time
    }

    /// Report the outcome of `entry`. Failures become `command_error` events
    /// and never propagate further.
    pub fn command_finished(&self, entry: &QueueEntry<C>, sent_time: Timestamp, result: DeviceResult<()>) {
        let fulfilled_time = self.now();
        let command = &entry.payload;

        if let Some(limit) = self.options.limit_slow_fulfilled_ms {
            let delay = fulfilled_time - entry.time;
            if delay > limit {
                self.events.notify_slow_command(&format!(
                    "Slow fulfilled command, should have been fulfilled at {}, was {} ms slow. Command: {}",
                    entry.time,
                    delay,
                    command_json(command)
                ));
            }
        }

        if self.options.report_all_commands {
            self.events.notify_command_report(&CommandReport {
                planned_time: entry.time,
                sent_time,
                fulfilled_time,
                queue_id: entry.id,
                command: serde_json::to_value(command).unwrap_or_default(),
                context: command.context(),
                timeline_obj_id: command.timeline_obj_id().to_string(),
            });
        }

        if let Err(err) = result {
            warn!("{}: command {} failed: {}", self.device_id(), command.context(), err);
            let context = CommandContext {
                context: command.context(),
                command: serde_json::to_value(command).unwrap_or_default(),
                timeline_obj_id: command.timeline_obj_id().to_string(),
            };
            self.events.notify_command_error(&err, &context);
        }
    }

    pub fn info(&self, message: &str) {
        info!("{}: {}", self.device_id(), message);
        self.events.notify_info(message);
    }

    pub fn warn(&self, message: &str) {
        warn!("{}: {}", self.device_id(), message);
        self.events.notify_warning(message);
    }

    pub fn debug(&self, message: &str) {
        debug!("{}: {}", self.device_id(), message);
        self.events.notify_debug(message);
    }
}

fn command_json<C: Serialize>(command: &C) -> String {
    serde_json::to_string(command).unwrap_or_else(|_| "<unserializable>".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::controller::events::{RecordedEvent, RecordingListener};
    use crate::device::error::DeviceError;
    use crate::time::ManualClock;

    #[derive(Debug, Clone, PartialEq, Serialize)]
    struct TestCommand {
        time: Timestamp,
        layer: String,
        name: &'static str,
    }

    impl DeviceCommand for TestCommand {
        fn time(&self) -> Timestamp {
            self.time
        }
        fn layer_id(&self) -> Option<&str> {
            Some(&self.layer)
        }
        fn timeline_obj_id(&self) -> &str {
            "obj0"
        }
        fn context(&self) -> String {
            format!("{}_obj0", self.name)
        }
    }

    fn cmd(time: Timestamp, name: &'static str) -> TestCommand {
        TestCommand {
            time,
            layer: "gfx".into(),
            name,
        }
    }

    fn new_core(clock: &ManualClock, options: CoreOptions) -> DeviceCore<Vec<&'static str>, TestCommand> {
        DeviceCore::new("dev0", Arc::new(clock.clone()), options)
    }

    #[test]
    fn test_handle_state_supersedes_future_commands() {
        let clock = ManualClock::new(0);
        let mut core = new_core(&clock, CoreOptions::default());

        core.handle_state(200, |old, _, _| {
            assert!(old.state.is_empty());
            (vec!["a"], vec![cmd(200, "take")])
        });
        core.handle_state(100, |old, ctx, _| {
            // State at max(now, 100) predates the first call.
            assert_eq!(ctx.now, 0);
            assert_eq!(ctx.device_id, "dev0");
            assert!(old.state.is_empty());
            (vec!["b"], vec![cmd(100, "cue")])
        });

        let queued = core.queue_snapshot();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].context, "cue_obj0");
        assert_eq!(core.state_before(500).state, vec!["b"]);
    }

    #[test]
    fn test_handle_state_sees_previous_state() {
        let clock = ManualClock::new(0);
        let mut core = new_core(&clock, CoreOptions::default());

        core.handle_state(100, |_, _, _| (vec!["a"], vec![]));
        clock.set(150);
        core.handle_state(120, |old, _, warnings| {
            assert_eq!(old.state, vec!["a"]);
            warnings.push("something odd".into());
            (vec!["a", "b"], vec![])
        });
        assert_eq!(core.current_state().map(|e| e.time), Some(120));
    }

    #[test]
    fn test_warnings_are_emitted() {
        let clock = ManualClock::new(0);
        let mut core = new_core(&clock, CoreOptions::default());
        let listener = RecordingListener::new();
        core.events().register(listener.clone());

        core.handle_state(100, |_, _, warnings| {
            warnings.push("missing layer".into());
            (vec![], vec![])
        });

        assert_eq!(listener.warnings(), vec!["missing layer".to_string()]);
    }

    #[test]
    fn test_command_failure_becomes_event() {
        let clock = ManualClock::new(1_000);
        let mut core = new_core(&clock, CoreOptions::default());
        let listener = RecordingListener::new();
        core.events().register(listener.clone());

        core.schedule(cmd(1_000, "take"));
        let due = core.take_due();
        assert_eq!(due.len(), 1);

        let sent = core.command_started(&due[0]);
        core.command_finished(&due[0], sent, Err(DeviceError::remote("boom")));

        match listener.events().as_slice() {
            [RecordedEvent::CommandError(err, context)] => {
                assert_eq!(err, &DeviceError::remote("boom"));
                assert_eq!(context.context, "take_obj0");
                assert_eq!(context.timeline_obj_id, "obj0");
            }
            other => panic!("unexpected events: {:?}", other),
        }
    }

    #[test]
    fn test_slow_commands_and_reports() {
        let clock = ManualClock::new(0);
        let options = CoreOptions {
            limit_slow_sent_ms: Some(40),
            limit_slow_fulfilled_ms: Some(100),
            report_all_commands: true,
            ..CoreOptions::default()
        };
        let mut core = new_core(&clock, options);
        let listener = RecordingListener::new();
        core.events().register(listener.clone());

        core.schedule(cmd(1_000, "take"));
        clock.set(1_050);
        let due = core.take_due();
        let sent = core.command_started(&due[0]);
        clock.set(1_200);
        core.command_finished(&due[0], sent, Ok(()));

        let events = listener.events();
        let slow = events
            .iter()
            .filter(|e| matches!(e, RecordedEvent::SlowCommand(_)))
            .count();
        assert_eq!(slow, 2);
        assert!(events.iter().any(|e| matches!(
            e,
            RecordedEvent::CommandReport(r) if r.sent_time == 1_050 && r.fulfilled_time == 1_200
        )));
    }

    #[test]
    fn test_prepare_and_clear_future() {
        let clock = ManualClock::new(0);
        let mut core = new_core(&clock, CoreOptions::default());
        core.schedule(cmd(100, "a"));
        core.schedule(cmd(200, "b"));
        core.schedule(cmd(300, "c"));

        core.clear_future(200);
        assert_eq!(core.queue_len(), 2);

        core.prepare_for_handle_state(200);
        assert_eq!(core.queue_len(), 1);
    }
}
