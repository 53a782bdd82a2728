// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Thin handle giving the conductor access to one device's task and report.

use tokio::sync::{mpsc, oneshot, watch};

use tsr_protocol::{ClientCommand, DeviceReport};

/// One command for a device task, answered with the device's report.
pub struct DeviceRequest {
    pub cmd: ClientCommand,
    pub respond_to: oneshot::Sender<DeviceReport>,
}

/// A handle to a single running device task.
///
/// One `DeviceHandle` is created per configured device in `main.rs` and
/// owned by the conductor.
pub struct DeviceHandle {
    /// Stable device identifier, matches `[[devices]].id`.
    pub device_id: String,
    /// Send commands to the device task.
    pub tx: mpsc::Sender<DeviceRequest>,
    /// Latest report, for answers that must not wait on a busy task.
    pub report_rx: watch::Receiver<DeviceReport>,
}
