// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Robotics controller state: the last shot per layer and the running
//! sequences.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use tsr_core::types::shotoku::{ShotokuContent, ShotokuSequenceShot, ShotokuShot};
use tsr_core::{DeviceType, Mappings, ResolvedState, TimelineContent};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShotEntry {
    pub timeline_obj_id: String,
    pub shot: ShotokuShot,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequenceEntry {
    pub timeline_obj_id: String,
    pub layer_id: String,
    pub shots: Vec<ShotokuSequenceShot>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ShotokuState {
    /// Keyed by layer.
    pub shots: BTreeMap<String, ShotEntry>,
    /// Keyed by sequence id.
    pub sequences: BTreeMap<String, SequenceEntry>,
}

pub fn convert_state(
    state: &ResolvedState,
    mappings: &Mappings,
    device_id: &str,
    warnings: &mut Vec<String>,
) -> ShotokuState {
    let mut result = ShotokuState::default();

    for (layer_id, instance) in &state.layers {
        let Some(mapping) = mappings.get(layer_id) else {
            continue;
        };
        if !mapping.targets(device_id, DeviceType::Shotoku) {
            continue;
        }
        if instance.is_lookahead {
            debug!("Skipping lookahead object {} on {}", instance.id, layer_id);
            continue;
        }
        let TimelineContent::Shotoku(content) = &instance.content else {
            continue;
        };

        match content {
            ShotokuContent::Shot(shot) => {
                result.shots.insert(
                    layer_id.clone(),
                    ShotEntry {
                        timeline_obj_id: instance.id.clone(),
                        shot: shot.clone(),
                    },
                );
            }
            ShotokuContent::Sequence { sequence_id, shots } => {
                result.sequences.insert(
                    sequence_id.clone(),
                    SequenceEntry {
                        timeline_obj_id: instance.id.clone(),
                        layer_id: layer_id.clone(),
                        shots: shots.clone(),
                    },
                );
            }
            ShotokuContent::Unknown => warnings.push(format!(
                "Unknown Shotoku content in object \"{}\" on layer \"{}\"",
                instance.id, layer_id
            )),
        }
    }

    result
}
