// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Camera control protocol.
//!
//! Commands are short ASCII strings like `#R05`; the camera echoes a reply
//! with a command-specific prefix, or `E1`..`E3` on failure.

use std::fmt;

use tsr_core::{DeviceError, DeviceFuture, DeviceResult};

use crate::command::PtzAction;

/// Lowest and highest zoom speed levels; 50 stops the zoom.
pub const ZOOM_SPEED_MIN: u8 = 1;
pub const ZOOM_SPEED_MAX: u8 = 99;
/// Absolute zoom position range.
pub const ZOOM_WIDE: u16 = 0x555;
pub const ZOOM_TELE: u16 = 0xFFF;
pub const PRESET_MAX: u8 = 99;
pub const PRESET_SPEED_MAX: u16 = 999;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraCommand {
    PowerQuery,
    RecallPreset(u8),
    PresetSpeed(u16),
    ZoomSpeed(u8),
    Zoom(u16),
}

impl CameraCommand {
    /// Scale a timeline value onto the camera's integer ranges.
    pub fn from_action(action: &PtzAction) -> Self {
        match *action {
            PtzAction::Preset(preset) => Self::RecallPreset(preset.min(PRESET_MAX)),
            PtzAction::Speed(speed) => Self::PresetSpeed(speed.min(PRESET_SPEED_MAX)),
            PtzAction::ZoomSpeed(speed) => Self::ZoomSpeed(zoom_speed_level(speed)),
            PtzAction::Zoom(zoom) => Self::Zoom(zoom_level(zoom)),
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::PowerQuery => "O",
            Self::RecallPreset(_) => "R",
            Self::PresetSpeed(_) => "UPVS",
            Self::ZoomSpeed(_) => "Z",
            Self::Zoom(_) => "AXZ",
        }
    }

    fn argument(&self) -> String {
        match self {
            Self::PowerQuery => String::new(),
            Self::RecallPreset(preset) => format!("{:02}", preset),
            Self::PresetSpeed(speed) => format!("{:03}", speed),
            Self::ZoomSpeed(level) => format!("{:02}", level),
            Self::Zoom(level) => format!("{:03X}", level),
        }
    }

    /// Prefix of a successful reply.
    pub fn reply_prefix(&self) -> &'static str {
        match self {
            Self::PowerQuery => "p",
            Self::RecallPreset(_) => "s",
            Self::PresetSpeed(_) => "uPVS",
            Self::ZoomSpeed(_) => "zS",
            Self::Zoom(_) => "axz",
        }
    }

    /// Command string as sent on the wire, e.g. `#AXZ555`.
    pub fn encode(&self) -> String {
        format!("#{}{}", self.code(), self.argument())
    }

    /// The reply a camera gives when it accepts this command.
    pub fn expected_reply(&self) -> String {
        match self {
            Self::PowerQuery => "p1".to_string(),
            _ => format!("{}{}", self.reply_prefix(), self.argument()),
        }
    }
}

impl fmt::Display for CameraCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// -1.0..1.0 onto 1..99, 50 being stationary.
pub fn zoom_speed_level(speed: f64) -> u8 {
    let level = (speed.clamp(-1.0, 1.0) * 49.0 + 50.0).round();
    (level as u8).clamp(ZOOM_SPEED_MIN, ZOOM_SPEED_MAX)
}

/// 0.0..1.0 onto the wide..tele position range.
pub fn zoom_level(zoom: f64) -> u16 {
    let span = f64::from(ZOOM_TELE - ZOOM_WIDE);
    let level = (zoom.clamp(0.0, 1.0) * span + f64::from(ZOOM_WIDE)).round();
    (level as u16).clamp(ZOOM_WIDE, ZOOM_TELE)
}

/// Check a camera reply to `command`, returning the payload after the
/// reply prefix.
pub fn parse_reply(command: &CameraCommand, reply: &str) -> DeviceResult<String> {
    let reply = reply.trim();
    if let Some(code) = reply.get(..2) {
        match code {
            "E1" => return Err(DeviceError::unsupported(format!("camera command {}", command))),
            "E2" => return Err(DeviceError::transient(format!("camera busy, {} not executed", command))),
            "E3" => return Err(DeviceError::remote(format!("{}: value out of range", command))),
            _ => {}
        }
    }
    reply
        .strip_prefix(command.reply_prefix())
        .map(str::to_string)
        .ok_or_else(|| DeviceError::remote(format!("unexpected reply to {}: {:?}", command, reply)))
}

/// A camera reachable through its control protocol.
pub trait PtzCamera: Send + Sync {
    fn address(&self) -> &str;

    /// Send one command and return the reply payload.
    fn send(&self, command: CameraCommand) -> DeviceFuture<'_, String>;
}
