// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Camera control over the HTTP CGI interface.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use tsr_core::{DeviceError, DeviceFuture, DeviceResult};

use crate::peer::{parse_reply, CameraCommand, PtzCamera};

/// Cameras drop commands that arrive closer together than this.
pub const DEFAULT_MIN_COMMAND_INTERVAL: Duration = Duration::from_millis(130);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

pub struct PtzHttpCamera {
    client: reqwest::Client,
    address: String,
    base_url: String,
    min_interval: Duration,
    /// Held for the duration of a request so commands go out one at a time.
    last_sent: Mutex<Option<Instant>>,
}

impl PtzHttpCamera {
    pub fn new(
        host: &str,
        port: Option<u16>,
        https: bool,
        timeout: Duration,
        min_interval: Duration,
    ) -> DeviceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeviceError::config(format!("failed to build HTTP client: {}", e)))?;
        let address = match port {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        let scheme = if https { "https" } else { "http" };
        Ok(Self {
            client,
            base_url: format!("{}://{}", scheme, address),
            address,
            min_interval,
            last_sent: Mutex::new(None),
        })
    }

    pub fn command_url(&self, command: &CameraCommand) -> String {
        format!(
            "{}/cgi-bin/aw_ptz?cmd={}&res=1",
            self.base_url,
            command.encode().replace('#', "%23")
        )
    }

    async fn request(&self, command: CameraCommand) -> DeviceResult<String> {
        let mut last_sent = self.last_sent.lock().await;
        if let Some(at) = *last_sent {
            tokio::time::sleep_until(at + self.min_interval).await;
        }
        *last_sent = Some(Instant::now());

        let url = self.command_url(&command);
        debug!("PTZ {} -> {}", self.address, url);
        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                DeviceError::timeout(format!("PTZ command {}", command))
            } else {
                DeviceError::connection(format!("PTZ {}: {}", self.address, e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeviceError::remote(format!("PTZ {} answered HTTP {}", self.address, status)));
        }
        let body = response
            .text()
            .await
            .map_err(|e| DeviceError::connection(format!("PTZ {}: {}", self.address, e)))?;
        parse_reply(&command, &body)
    }
}

impl PtzCamera for PtzHttpCamera {
    fn address(&self) -> &str {
        &self.address
    }

    fn send(&self, command: CameraCommand) -> DeviceFuture<'_, String> {
        Box::pin(self.request(command))
    }
}
