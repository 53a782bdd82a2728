// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Byte transport to the robotics controller.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tsr_core::device::connection::TcpConnection;
use tsr_core::{DeviceError, DeviceFuture, DeviceResult};

pub trait ShotokuTransport: Send + Sync {
    fn send(&self, frame: Vec<u8>) -> DeviceFuture<'_, ()>;

    fn is_connected(&self) -> bool;

    /// Resolve with the connection state once connected or after `limit`.
    fn wait_connected(&self, limit: Duration) -> DeviceFuture<'_, bool>;

    fn dispose(&self) -> DeviceFuture<'_, ()>;
}

impl ShotokuTransport for TcpConnection {
    fn send(&self, frame: Vec<u8>) -> DeviceFuture<'_, ()> {
        Box::pin(TcpConnection::send(self, frame))
    }

    fn is_connected(&self) -> bool {
        TcpConnection::is_connected(self)
    }

    fn wait_connected(&self, limit: Duration) -> DeviceFuture<'_, bool> {
        let mut connected = self.subscribe();
        Box::pin(async move {
            let _ = tokio::time::timeout(limit, connected.wait_for(|c| *c)).await;
            let is_connected = *connected.borrow();
            Ok(is_connected)
        })
    }

    fn dispose(&self) -> DeviceFuture<'_, ()> {
        Box::pin(async move {
            TcpConnection::dispose(self).await;
            Ok(())
        })
    }
}

#[derive(Debug, Default)]
struct SimInner {
    frames: Vec<Vec<u8>>,
    offline: bool,
    disposed: bool,
}

/// Records frames instead of writing them to a socket.
#[derive(Debug, Clone, Default)]
pub struct SimulatedTransport {
    inner: Arc<Mutex<SimInner>>,
}

impl SimulatedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.lock().frames.clone()
    }

    pub fn set_connected(&self, connected: bool) {
        self.lock().offline = !connected;
    }

    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self, frame: Vec<u8>) -> DeviceResult<()> {
        let mut inner = self.lock();
        if inner.offline || inner.disposed {
            return Err(DeviceError::connection("not connected"));
        }
        inner.frames.push(frame);
        Ok(())
    }
}

impl ShotokuTransport for SimulatedTransport {
    fn send(&self, frame: Vec<u8>) -> DeviceFuture<'_, ()> {
        let result = self.write(frame);
        Box::pin(async move { result })
    }

    fn is_connected(&self) -> bool {
        let inner = self.lock();
        !inner.offline && !inner.disposed
    }

    fn wait_connected(&self, _limit: Duration) -> DeviceFuture<'_, bool> {
        let connected = ShotokuTransport::is_connected(self);
        Box::pin(async move { Ok(connected) })
    }

    fn dispose(&self) -> DeviceFuture<'_, ()> {
        self.lock().disposed = true;
        Box::pin(async { Ok(()) })
    }
}
