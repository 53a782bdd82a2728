// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Layer to device mappings. Supplied by the orchestrator, never computed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::device::DeviceType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    pub device_id: String,
    #[serde(flatten)]
    pub options: MappingOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "device")]
pub enum MappingOptions {
    #[serde(rename = "VIZMSE")]
    VizMse,
    #[serde(rename = "PANASONIC_PTZ", rename_all = "camelCase")]
    PanasonicPtz { mapping_type: PtzMappingType },
    #[serde(rename = "SHOTOKU")]
    Shotoku,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PtzMappingType {
    PresetSpeed,
    Preset,
    Zoom,
    ZoomSpeed,
}

/// Layer id to mapping.
pub type Mappings = BTreeMap<String, Mapping>;

impl Mapping {
    pub fn new(device_id: impl Into<String>, options: MappingOptions) -> Self {
        Self {
            device_id: device_id.into(),
            options,
        }
    }

    pub fn device_type(&self) -> Option<DeviceType> {
        match self.options {
            MappingOptions::VizMse => Some(DeviceType::VizMse),
            MappingOptions::PanasonicPtz { .. } => Some(DeviceType::PanasonicPtz),
            MappingOptions::Shotoku => Some(DeviceType::Shotoku),
            MappingOptions::Other => None,
        }
    }

    /// True when this mapping routes to `device_id` of type `device_type`.
    pub fn targets(&self, device_id: &str, device_type: DeviceType) -> bool {
        self.device_id == device_id && self.device_type() == Some(device_type)
    }
}

/// Find the mapping for `layer`, falling back to the layer a lookahead
/// instance stands in for. The flag tells whether the fallback was used.
pub fn find_mapping<'a>(
    mappings: &'a Mappings,
    layer: &str,
    lookahead_for: Option<&str>,
) -> Option<(&'a Mapping, bool)> {
    if let Some(mapping) = mappings.get(layer) {
        return Some((mapping, false));
    }
    lookahead_for
        .and_then(|other| mappings.get(other))
        .map(|mapping| (mapping, true))
}
