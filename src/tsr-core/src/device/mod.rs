// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod connection;
pub mod controller;
pub mod error;
pub mod status;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::mapping::Mappings;
use crate::time::Timestamp;
use crate::timeline::ResolvedState;
use crate::types::ExpectedPlayoutItem;

use self::controller::{DeviceEventEmitter, QueuedCommand};
use self::error::DeviceResult;
use self::status::DeviceStatus;

/// Future returned by async device operations.
pub type DeviceFuture<'a, T> = Pin<Box<dyn Future<Output = DeviceResult<T>> + Send + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    #[serde(rename = "VIZMSE")]
    VizMse,
    #[serde(rename = "PANASONIC_PTZ")]
    PanasonicPtz,
    #[serde(rename = "SHOTOKU")]
    Shotoku,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VizMse => write!(f, "VIZMSE"),
            Self::PanasonicPtz => write!(f, "PANASONIC_PTZ"),
            Self::Shotoku => write!(f, "SHOTOKU"),
        }
    }
}

/// Contract between the orchestrator and a device driver.
///
/// Drivers are owned by a single task which serialises every call, so the
/// methods take `&mut self` and need no internal locking.
pub trait Device: Send {
    fn device_id(&self) -> &str;

    fn device_type(&self) -> DeviceType;

    /// Human readable name, usually including the remote address.
    fn device_name(&self) -> String;

    /// Emitter carrying this device's events.
    fn events(&self) -> &Arc<DeviceEventEmitter>;

    /// Connect and configure. Missing options fail here.
    fn init(&mut self) -> DeviceFuture<'_, ()>;

    /// Release every resource and stop background work.
    fn terminate(&mut self) -> DeviceFuture<'_, ()>;

    /// Convert, diff and enqueue commands for `state`.
    fn handle_state(&mut self, state: &ResolvedState);

    /// Flush commands and states superseded by an upcoming state at `time`.
    fn prepare_for_handle_state(&mut self, time: Timestamp);

    /// Drop commands scheduled after `time`.
    fn clear_future(&mut self, time: Timestamp);

    fn set_mappings(&mut self, mappings: Mappings);

    fn status(&self) -> DeviceStatus;

    fn connected(&self) -> bool;

    /// Pending commands, for diagnostics.
    fn queue(&self) -> Vec<QueuedCommand>;

    /// Execute every queued command that is due.
    fn execute_due(&mut self) -> DeviceFuture<'_, ()>;

    /// Interval of the device's background monitor, if it has one.
    fn monitor_interval(&self) -> Option<Duration> {
        None
    }

    /// One round of background monitoring (probing, load polling).
    fn monitor(&mut self) -> DeviceFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }

    /// Prepare the remote side for playout.
    fn make_ready(&mut self, _ok_to_destroy: bool) -> DeviceFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }

    /// Leave playout; may affect visible output when allowed.
    fn stand_down(&mut self, _ok_to_destroy: bool) -> DeviceFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }

    /// Items the device should preload ahead of time.
    fn handle_expected_playout_items(&mut self, _items: Vec<ExpectedPlayoutItem>) -> DeviceFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }
}
