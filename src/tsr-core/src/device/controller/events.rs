// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Device event notification system.
//!
//! Drivers report connection changes, command failures and free-form
//! log messages through a [`DeviceEventEmitter`]. Anything interested in
//! those events implements [`DeviceListener`] and overrides the callbacks
//! it cares about.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::Serialize;

use crate::device::error::DeviceError;
use crate::device::status::DeviceStatus;
use crate::time::Timestamp;

/// Unique identifier for a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// What was being executed when a command failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandContext {
    pub context: String,
    pub command: serde_json::Value,
    pub timeline_obj_id: String,
}

/// Per-command execution report, emitted when command reporting is enabled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandReport {
    pub planned_time: Timestamp,
    pub sent_time: Timestamp,
    pub fulfilled_time: Timestamp,
    pub queue_id: u64,
    pub command: serde_json::Value,
    pub context: String,
    pub timeline_obj_id: String,
}

/// Trait for components that want to receive device events.
///
/// All methods have default no-op implementations.
pub trait DeviceListener: Send + Sync {
    /// Called when the device connects, disconnects or changes status.
    fn on_connection_changed(&self, _device_id: &str, _status: &DeviceStatus) {}

    /// Called when a queued command fails.
    fn on_command_error(&self, _device_id: &str, _error: &DeviceError, _context: &CommandContext) {}

    /// Called for errors outside of command execution.
    fn on_error(&self, _device_id: &str, _context: &str, _error: &DeviceError) {}

    fn on_info(&self, _device_id: &str, _message: &str) {}

    fn on_warning(&self, _device_id: &str, _message: &str) {}

    fn on_debug(&self, _device_id: &str, _message: &str) {}

    /// Called when a command was sent or fulfilled later than allowed.
    fn on_slow_command(&self, _device_id: &str, _message: &str) {}

    fn on_command_report(&self, _device_id: &str, _report: &CommandReport) {}
}

/// Manages registered listeners and dispatches events for one device.
///
/// Registration goes through a lock so an emitter can be shared between the
/// device and its background tasks.
pub struct DeviceEventEmitter {
    device_id: String,
    listeners: RwLock<Vec<(ListenerId, Arc<dyn DeviceListener>)>>,
}

impl DeviceEventEmitter {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Register a listener to receive events.
    /// Returns an ID that can be used to unregister the listener.
    pub fn register(&self, listener: Arc<dyn DeviceListener>) -> ListenerId {
        let id = ListenerId::new();
        self.write_listeners().push((id, listener));
        id
    }

    /// Unregister a listener by its ID.
    pub fn unregister(&self, id: ListenerId) {
        self.write_listeners().retain(|(lid, _)| *lid != id);
    }

    /// Get the number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.read_listeners().len()
    }

    pub fn notify_connection_changed(&self, status: &DeviceStatus) {
        self.each(|l| l.on_connection_changed(&self.device_id, status));
    }

    pub fn notify_command_error(&self, error: &DeviceError, context: &CommandContext) {
        self.each(|l| l.on_command_error(&self.device_id, error, context));
    }

    pub fn notify_error(&self, context: &str, error: &DeviceError) {
        self.each(|l| l.on_error(&self.device_id, context, error));
    }

    pub fn notify_info(&self, message: &str) {
        self.each(|l| l.on_info(&self.device_id, message));
    }

    pub fn notify_warning(&self, message: &str) {
        self.each(|l| l.on_warning(&self.device_id, message));
    }

    pub fn notify_debug(&self, message: &str) {
        self.each(|l| l.on_debug(&self.device_id, message));
    }

    pub fn notify_slow_command(&self, message: &str) {
        self.each(|l| l.on_slow_command(&self.device_id, message));
    }

    pub fn notify_command_report(&self, report: &CommandReport) {
        self.each(|l| l.on_command_report(&self.device_id, report));
    }

    fn each(&self, f: impl Fn(&dyn DeviceListener)) {
        // Snapshot so a listener may (un)register without deadlocking.
        let listeners: Vec<Arc<dyn DeviceListener>> = self
            .read_listeners()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            f(listener.as_ref());
        }
    }

    fn read_listeners(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, Vec<(ListenerId, Arc<dyn DeviceListener>)>> {
        self.listeners.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_listeners(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, Vec<(ListenerId, Arc<dyn DeviceListener>)>> {
        self.listeners.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Listener that keeps every event it receives. Used by tests across the
/// workspace to assert on emitted warnings and errors.
#[derive(Default)]
pub struct RecordingListener {
    events: std::sync::Mutex<Vec<RecordedEvent>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedEvent {
    ConnectionChanged(DeviceStatus),
    CommandError(DeviceError, CommandContext),
    Error(String, DeviceError),
    Info(String),
    Warning(String),
    Debug(String),
    SlowCommand(String),
    CommandReport(CommandReport),
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.lock().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                RecordedEvent::Warning(msg) => Some(msg.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn command_errors(&self) -> Vec<DeviceError> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                RecordedEvent::CommandError(err, _) => Some(err.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn push(&self, event: RecordedEvent) {
        self.lock().push(event);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RecordedEvent>> {
        self.events.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DeviceListener for RecordingListener {
    fn on_connection_changed(&self, _device_id: &str, status: &DeviceStatus) {
        self.push(RecordedEvent::ConnectionChanged(status.clone()));
    }

    fn on_command_error(&self, _device_id: &str, error: &DeviceError, context: &CommandContext) {
        self.push(RecordedEvent::CommandError(error.clone(), context.clone()));
    }

    fn on_error(&self, _device_id: &str, context: &str, error: &DeviceError) {
        self.push(RecordedEvent::Error(context.to_string(), error.clone()));
    }

    fn on_info(&self, _device_id: &str, message: &str) {
        self.push(RecordedEvent::Info(message.to_string()));
    }

    fn on_warning(&self, _device_id: &str, message: &str) {
        self.push(RecordedEvent::Warning(message.to_string()));
    }

    fn on_debug(&self, _device_id: &str, message: &str) {
        self.push(RecordedEvent::Debug(message.to_string()));
    }

    fn on_slow_command(&self, _device_id: &str, message: &str) {
        self.push(RecordedEvent::SlowCommand(message.to_string()));
    }

    fn on_command_report(&self, _device_id: &str, report: &CommandReport) {
        self.push(RecordedEvent::CommandReport(report.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    struct TestListener {
        warned: AtomicBool,
        connection_changed: AtomicBool,
    }

    impl TestListener {
        fn new() -> Self {
            Self {
                warned: AtomicBool::new(false),
                connection_changed: AtomicBool::new(false),
            }
        }
    }

    impl DeviceListener for TestListener {
        fn on_warning(&self, device_id: &str, _message: &str) {
            assert_eq!(device_id, "viz0");
            self.warned.store(true, Ordering::Relaxed);
        }

        fn on_connection_changed(&self, _device_id: &str, _status: &DeviceStatus) {
            self.connection_changed.store(true, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_register_and_notify() {
        let emitter = DeviceEventEmitter::new("viz0");
        let listener = Arc::new(TestListener::new());
        let id = emitter.register(listener.clone());

        assert_eq!(emitter.listener_count(), 1);

        emitter.notify_warning("Late preparation");
        assert!(listener.warned.load(Ordering::Relaxed));
        assert!(!listener.connection_changed.load(Ordering::Relaxed));

        emitter.notify_connection_changed(&DeviceStatus::good());
        assert!(listener.connection_changed.load(Ordering::Relaxed));

        emitter.unregister(id);
        assert_eq!(emitter.listener_count(), 0);
    }

    #[test]
    fn test_multiple_listeners() {
        let emitter = DeviceEventEmitter::new("viz0");
        let listener1 = Arc::new(TestListener::new());
        let listener2 = RecordingListener::new();

        emitter.register(listener1.clone());
        emitter.register(listener2.clone());

        emitter.notify_warning("missing layer");

        assert!(listener1.warned.load(Ordering::Relaxed));
        assert_eq!(listener2.warnings(), vec!["missing layer".to_string()]);
    }
}
