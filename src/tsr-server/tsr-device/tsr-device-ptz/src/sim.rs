// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! In-memory camera for tests and dry runs.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tsr_core::{DeviceError, DeviceFuture, DeviceResult};

use crate::peer::{CameraCommand, PtzCamera};

#[derive(Debug)]
struct SimInner {
    sent: Vec<CameraCommand>,
    online: bool,
    failures: VecDeque<DeviceError>,
}

#[derive(Debug, Clone)]
pub struct SimulatedCamera {
    address: String,
    inner: Arc<Mutex<SimInner>>,
}

impl SimulatedCamera {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            inner: Arc::new(Mutex::new(SimInner {
                sent: Vec::new(),
                online: true,
                failures: VecDeque::new(),
            })),
        }
    }

    /// Every command that reached the camera, oldest first.
    pub fn sent(&self) -> Vec<CameraCommand> {
        self.lock().sent.clone()
    }

    pub fn set_online(&self, online: bool) {
        self.lock().online = online;
    }

    /// Make the next command fail with `error`.
    pub fn fail_next(&self, error: DeviceError) {
        self.lock().failures.push_back(error);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn handle(&self, command: CameraCommand) -> DeviceResult<String> {
        let mut inner = self.lock();
        if !inner.online {
            return Err(DeviceError::connection(format!("PTZ {} unreachable", self.address)));
        }
        if let Some(err) = inner.failures.pop_front() {
            return Err(err);
        }
        inner.sent.push(command);
        let reply = command.expected_reply();
        Ok(reply[command.reply_prefix().len()..].to_string())
    }
}

impl PtzCamera for SimulatedCamera {
    fn address(&self) -> &str {
        &self.address
    }

    fn send(&self, command: CameraCommand) -> DeviceFuture<'_, String> {
        let result = self.handle(command);
        Box::pin(async move { result })
    }
}
