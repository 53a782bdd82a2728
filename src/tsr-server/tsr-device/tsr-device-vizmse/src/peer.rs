// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Remote media sequencer interface.
//!
//! The engine is reached through a media sequencer which owns rundowns, and
//! a rundown owns the elements that can be cued and taken. Transports
//! implement [`Mse`] and [`MseRundown`]; [`crate::sim::SimulatedMse`] is the
//! in-process implementation.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use tsr_core::{DeviceError, DeviceFuture};

/// How an element is addressed on the remote side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum ElementRef {
    Name(String),
    VcpId(i64),
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{}", name),
            Self::VcpId(id) => write!(f, "{}", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoadState {
    Loaded,
    NotLoaded,
    Loading,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemoteElement {
    Internal {
        name: String,
    },
    Pilot {
        vcp_id: i64,
        available: f64,
        loaded: f64,
        is_loading: bool,
    },
}

impl RemoteElement {
    pub fn reference(&self) -> ElementRef {
        match self {
            Self::Internal { name } => ElementRef::Name(name.clone()),
            Self::Pilot { vcp_id, .. } => ElementRef::VcpId(*vcp_id),
        }
    }

    /// Internal elements do not report progress and count as loaded.
    pub fn load_state(&self) -> LoadState {
        match self {
            Self::Internal { .. } => LoadState::Loaded,
            Self::Pilot {
                available,
                loaded,
                is_loading,
                ..
            } => {
                if *is_loading {
                    LoadState::Loading
                } else if *available >= 1.0 && *loaded >= 1.0 {
                    LoadState::Loaded
                } else if *loaded <= 0.0 {
                    LoadState::NotLoaded
                } else {
                    LoadState::Loading
                }
            }
        }
    }

    pub fn is_pilot(&self) -> bool {
        matches!(self, Self::Pilot { .. })
    }
}

/// Identity of a rundown: the show, profile and playlist it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RundownInfo {
    pub show: String,
    pub profile: String,
    pub playlist: Option<String>,
}

pub trait MseRundown: Send + Sync {
    fn info(&self) -> &RundownInfo;

    fn create_internal_element<'a>(
        &'a self,
        template_name: &'a str,
        instance_name: &'a str,
        data: &'a [String],
        channel: Option<&'a str>,
    ) -> DeviceFuture<'a, RemoteElement>;

    fn create_pilot_element<'a>(&'a self, vcp_id: i64, channel: Option<&'a str>) -> DeviceFuture<'a, RemoteElement>;

    /// Fetch an existing element by identity.
    fn get_element<'a>(&'a self, element: &'a ElementRef) -> DeviceFuture<'a, RemoteElement>;

    fn cue<'a>(&'a self, element: &'a ElementRef) -> DeviceFuture<'a, ()>;

    fn take<'a>(&'a self, element: &'a ElementRef) -> DeviceFuture<'a, ()>;

    fn out<'a>(&'a self, element: &'a ElementRef) -> DeviceFuture<'a, ()>;

    fn continue_element<'a>(&'a self, element: &'a ElementRef) -> DeviceFuture<'a, ()>;

    fn continue_reverse<'a>(&'a self, element: &'a ElementRef) -> DeviceFuture<'a, ()>;

    /// Start loading an element onto the engine.
    fn initialize<'a>(&'a self, element: &'a ElementRef) -> DeviceFuture<'a, ()>;

    fn activate(&self) -> DeviceFuture<'_, ()>;

    fn deactivate(&self) -> DeviceFuture<'_, ()>;
}

pub trait Mse: Send + Sync {
    fn host(&self) -> &str;

    fn ping(&self) -> DeviceFuture<'_, ()>;

    fn get_rundowns(&self) -> DeviceFuture<'_, Vec<Arc<dyn MseRundown>>>;

    fn create_rundown<'a>(&'a self, info: &'a RundownInfo) -> DeviceFuture<'a, Arc<dyn MseRundown>>;

    fn is_connected(&self) -> bool;

    fn close(&self) -> DeviceFuture<'_, ()>;
}

/// Sort remote failures into the error taxonomy.
///
/// The sequencer only reports free-text errors: "inexistent" means the
/// element is not there yet and is worth retrying, "already exists" comes
/// back from a creation that raced an earlier one.
pub fn classify_remote_error(err: DeviceError) -> DeviceError {
    if !matches!(err.kind, tsr_core::ErrorKind::Remote) {
        return err;
    }
    let lower = err.message.to_lowercase();
    if lower.contains("inexistent") {
        DeviceError::transient(err.message)
    } else if lower.contains("already exist") {
        DeviceError::conflict(err.message)
    } else {
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pilot(available: f64, loaded: f64, is_loading: bool) -> RemoteElement {
        RemoteElement::Pilot {
            vcp_id: 1,
            available,
            loaded,
            is_loading,
        }
    }

    #[test]
    fn test_load_state() {
        assert_eq!(pilot(1.0, 1.0, false).load_state(), LoadState::Loaded);
        assert_eq!(pilot(1.0, 0.0, false).load_state(), LoadState::NotLoaded);
        assert_eq!(pilot(1.0, 0.4, true).load_state(), LoadState::Loading);
        assert_eq!(pilot(1.0, 1.0, true).load_state(), LoadState::Loading);
        assert_eq!(
            RemoteElement::Internal { name: "x".into() }.load_state(),
            LoadState::Loaded
        );
    }

    #[test]
    fn test_classify_remote_error() {
        assert!(classify_remote_error(DeviceError::remote("PepTalk inexistent error")).is_transient());
        assert!(classify_remote_error(DeviceError::remote(
            "An internal graphics element with name 'x' already exists."
        ))
        .is_conflict());
        assert_eq!(
            classify_remote_error(DeviceError::remote("syntax error")),
            DeviceError::remote("syntax error")
        );
        assert!(classify_remote_error(DeviceError::connection("inexistent")).is_connection());
    }
}
