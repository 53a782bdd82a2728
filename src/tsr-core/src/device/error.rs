// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Coarse classification of device errors, used by retry and status logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Refused, reset or timed-out connection. Drives reconnects.
    Connection,
    /// Remote object not there yet or still loading. Worth retrying.
    Transient,
    /// Remote object already exists.
    Conflict,
    /// Command or content type the driver does not handle.
    Unsupported,
    /// Missing option or use of an uninitialized session.
    Config,
    /// Any other error reported by the remote peer.
    Remote,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Connection => "connection",
            Self::Transient => "transient",
            Self::Conflict => "conflict",
            Self::Unsupported => "unsupported",
            Self::Config => "config",
            Self::Remote => "remote",
        };
        f.write_str(label)
    }
}

/// Error type returned by device operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{kind} error: {message}")]
pub struct DeviceError {
    pub kind: ErrorKind,
    pub message: String,
}

pub type DeviceResult<T> = Result<T, DeviceError>;

impl DeviceError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connection, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn unsupported(what: impl fmt::Display) -> Self {
        Self::new(ErrorKind::Unsupported, format!("unsupported: {}", what))
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn remote(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Remote, message)
    }

    pub fn timeout(what: impl fmt::Display) -> Self {
        Self::connection(format!("{} timed out", what))
    }

    /// Errors that may succeed if the same call is repeated shortly after.
    pub fn is_transient(&self) -> bool {
        self.kind == ErrorKind::Transient
    }

    pub fn is_conflict(&self) -> bool {
        self.kind == ErrorKind::Conflict
    }

    pub fn is_connection(&self) -> bool {
        self.kind == ErrorKind::Connection
    }
}

impl From<std::io::Error> for DeviceError {
    fn from(err: std::io::Error) -> Self {
        DeviceError::connection(err.to_string())
    }
}
