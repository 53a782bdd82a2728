// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::{Deserialize, Serialize};

/// Health of a device, ordered from best to worst (`Unknown` aside).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    /// Status unknown
    Unknown = 0,
    /// All good and green
    Good = 1,
    /// Everything is not OK, operation is not affected
    WarningMinor = 2,
    /// Everything is not OK, operation might be affected
    WarningMajor = 3,
    /// Operation affected, possible to recover
    Bad = 4,
    /// Operation affected, not possible to recover without manual interference
    Fatal = 5,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub status_code: StatusCode,
    pub messages: Vec<String>,
    pub active: bool,
}

impl Default for DeviceStatus {
    fn default() -> Self {
        Self {
            status_code: StatusCode::Unknown,
            messages: Vec::new(),
            active: false,
        }
    }
}

impl DeviceStatus {
    pub fn good() -> Self {
        Self {
            status_code: StatusCode::Good,
            messages: Vec::new(),
            active: true,
        }
    }

    /// Raise the status code to `code` if it is worse than the current one,
    /// and record `message`.
    pub fn degrade(&mut self, code: StatusCode, message: impl Into<String>) {
        if code > self.status_code {
            self.status_code = code;
        }
        self.messages.push(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degrade_keeps_worst_code() {
        let mut status = DeviceStatus::good();
        status.degrade(StatusCode::Bad, "Not connected");
        status.degrade(StatusCode::WarningMinor, "2 elements not loaded");

        assert_eq!(status.status_code, StatusCode::Bad);
        assert_eq!(status.messages.len(), 2);
    }

    #[test]
    fn test_status_code_serializes_screaming() {
        let json = serde_json::to_string(&StatusCode::WarningMinor).unwrap();
        assert_eq!(json, "\"WARNING_MINOR\"");
    }
}
