// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Transport DTOs for the JSON line protocol.

use serde::{Deserialize, Serialize};

use tsr_core::{
    DeviceStatus, DeviceType, ExpectedPlayoutItem, Mappings, QueuedCommand, ResolvedState,
    Timestamp,
};

use crate::auth::AuthScope;

/// Command received from network clients (JSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Apply a resolved timeline state.
    HandleState { state: ResolvedState },
    /// Sent shortly before `handle_state` for the same time.
    PrepareForHandleState { time: Timestamp },
    ClearFuture { time: Timestamp },
    SetMappings { mappings: Mappings },
    MakeReady {
        #[serde(default)]
        ok_to_destroy: bool,
    },
    StandDown {
        #[serde(default)]
        ok_to_destroy: bool,
    },
    SetExpectedPlayoutItems { items: Vec<ExpectedPlayoutItem> },
    GetStatus,
    GetQueue,
    GetDevices,
}

impl ClientCommand {
    /// Scope a token needs to run this command.
    pub fn scope(&self) -> AuthScope {
        match self {
            Self::GetStatus | Self::GetQueue | Self::GetDevices => AuthScope::Read,
            _ => AuthScope::Control,
        }
    }
}

/// Envelope for client commands with optional authentication token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientEnvelope {
    pub token: Option<String>,
    /// Restrict the command to one device. `None` targets all devices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(flatten)]
    pub cmd: ClientCommand,
}

/// Per-device part of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceReport {
    pub device_id: String,
    pub device_type: DeviceType,
    pub device_name: String,
    pub connected: bool,
    pub status: DeviceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<Vec<QueuedCommand>>,
    /// Error of this device while running the command, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response sent to network clients over TCP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<DeviceReport>,
    pub error: Option<String>,
}

impl ClientResponse {
    pub fn ok(devices: Vec<DeviceReport>) -> Self {
        let failed: Vec<String> = devices
            .iter()
            .filter_map(|d| d.error.as_ref().map(|e| format!("{}: {}", d.device_id, e)))
            .collect();
        Self {
            success: failed.is_empty(),
            devices,
            error: (!failed.is_empty()).then(|| failed.join("; ")),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            devices: Vec::new(),
            error: Some(message.into()),
        }
    }
}
