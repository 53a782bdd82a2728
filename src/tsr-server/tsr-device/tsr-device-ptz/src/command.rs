// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Camera commands and the state differ that produces them.

use std::fmt;

use serde::Serialize;

use tsr_core::{DeviceCommand, Timestamp};

use crate::state::{PtzState, PtzValue};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum PtzAction {
    Preset(u8),
    Speed(u16),
    ZoomSpeed(f64),
    Zoom(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PtzCommand {
    pub time: Timestamp,
    pub timeline_obj_id: String,
    /// Which value changed and from what.
    pub context: String,
    pub action: PtzAction,
}

impl DeviceCommand for PtzCommand {
    fn time(&self) -> Timestamp {
        self.time
    }

    fn layer_id(&self) -> Option<&str> {
        None
    }

    fn timeline_obj_id(&self) -> &str {
        &self.timeline_obj_id
    }

    fn context(&self) -> String {
        self.context.clone()
    }
}

/// Commands that move the camera from `old` to `new` at `time`. Values
/// missing from `new` are left where they are.
pub fn diff_states(old: &PtzState, new: &PtzState, time: Timestamp) -> Vec<PtzCommand> {
    let mut commands = Vec::new();
    diff_field(&mut commands, time, "preset", &old.preset, &new.preset, PtzAction::Preset);
    diff_field(&mut commands, time, "speed", &old.speed, &new.speed, PtzAction::Speed);
    diff_field(
        &mut commands,
        time,
        "zoom speed",
        &old.zoom_speed,
        &new.zoom_speed,
        PtzAction::ZoomSpeed,
    );
    diff_field(&mut commands, time, "zoom", &old.zoom, &new.zoom, PtzAction::Zoom);
    commands
}

fn diff_field<T>(
    commands: &mut Vec<PtzCommand>,
    time: Timestamp,
    label: &str,
    old: &Option<PtzValue<T>>,
    new: &Option<PtzValue<T>>,
    action: impl Fn(T) -> PtzAction,
) where
    T: Copy + PartialEq + fmt::Display,
{
    let Some(new) = new else {
        return;
    };
    let old_text = match old {
        Some(old) if old.value == new.value => return,
        Some(old) => old.value.to_string(),
        None => "none".to_string(),
    };
    commands.push(PtzCommand {
        time,
        timeline_obj_id: new.timeline_obj_id.clone(),
        context: format!("{} differ ({}, {})", label, new.value, old_text),
        action: action(new.value),
    });
}
