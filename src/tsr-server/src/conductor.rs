// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Fans client commands out to the device tasks.

use std::collections::BTreeMap;

use tokio::sync::oneshot;
use tracing::error;

use tsr_protocol::{ClientCommand, ClientResponse, DeviceReport};

use crate::device_handle::{DeviceHandle, DeviceRequest};

pub struct Conductor {
    devices: BTreeMap<String, DeviceHandle>,
}

impl Conductor {
    pub fn new(handles: impl IntoIterator<Item = DeviceHandle>) -> Self {
        Self {
            devices: handles.into_iter().map(|h| (h.device_id.clone(), h)).collect(),
        }
    }

    pub fn device_ids(&self) -> Vec<String> {
        self.devices.keys().cloned().collect()
    }

    /// Run `cmd` on one device, or on all of them when `device_id` is `None`.
    ///
    /// Every targeted task gets the command before any answer is awaited,
    /// so devices work on it concurrently.
    pub async fn dispatch(&self, device_id: Option<&str>, cmd: ClientCommand) -> ClientResponse {
        let targets: Vec<&DeviceHandle> = match device_id {
            Some(id) => match self.devices.get(id) {
                Some(handle) => vec![handle],
                None => return ClientResponse::error(format!("Unknown device: {}", id)),
            },
            None => self.devices.values().collect(),
        };

        // Listing must answer even while a device is busy initializing.
        if matches!(cmd, ClientCommand::GetDevices) {
            let reports = targets.iter().map(|h| h.report_rx.borrow().clone()).collect();
            return ClientResponse::ok(reports);
        }

        let mut pending = Vec::with_capacity(targets.len());
        for handle in targets {
            let (respond_to, resp_rx) = oneshot::channel();
            let req = DeviceRequest {
                cmd: cmd.clone(),
                respond_to,
            };
            if let Err(e) = handle.tx.send(req).await {
                error!("Failed to send request to device {}: {:?}", handle.device_id, e);
                pending.push((handle, None));
            } else {
                pending.push((handle, Some(resp_rx)));
            }
        }

        let mut reports = Vec::with_capacity(pending.len());
        for (handle, resp_rx) in pending {
            let report = match resp_rx {
                Some(rx) => rx.await.ok(),
                None => None,
            };
            reports.push(report.unwrap_or_else(|| unavailable(handle)));
        }
        ClientResponse::ok(reports)
    }
}

fn unavailable(handle: &DeviceHandle) -> DeviceReport {
    DeviceReport {
        error: Some("Internal error: device task not available".into()),
        queue: None,
        ..handle.report_rx.borrow().clone()
    }
}
