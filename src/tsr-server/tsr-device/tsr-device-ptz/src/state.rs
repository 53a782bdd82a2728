// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Camera state and its conversion from the timeline.

use serde::Serialize;

use tsr_core::types::ptz::PtzContent;
use tsr_core::{DeviceType, Mappings, MappingOptions, PtzMappingType, ResolvedState, TimelineContent};

/// One controlled value and the timeline object that set it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PtzValue<T> {
    pub value: T,
    pub timeline_obj_id: String,
}

impl<T> PtzValue<T> {
    pub fn new(value: T, timeline_obj_id: impl Into<String>) -> Self {
        Self {
            value,
            timeline_obj_id: timeline_obj_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PtzState {
    pub preset: Option<PtzValue<u8>>,
    pub speed: Option<PtzValue<u16>>,
    pub zoom_speed: Option<PtzValue<f64>>,
    pub zoom: Option<PtzValue<f64>>,
}

/// Zoom is assumed stationary unless the timeline says otherwise.
impl Default for PtzState {
    fn default() -> Self {
        Self {
            preset: None,
            speed: None,
            zoom_speed: Some(PtzValue::new(0.0, "default")),
            zoom: None,
        }
    }
}

/// Build the camera state for `state` from the layers mapped to
/// `device_id`. The mapping type decides which value a layer controls.
pub fn convert_state(
    state: &ResolvedState,
    mappings: &Mappings,
    device_id: &str,
    warnings: &mut Vec<String>,
) -> PtzState {
    let mut result = PtzState::default();

    for (layer_id, instance) in &state.layers {
        let Some(mapping) = mappings.get(layer_id) else {
            continue;
        };
        if !mapping.targets(device_id, DeviceType::PanasonicPtz) {
            continue;
        }
        let MappingOptions::PanasonicPtz { mapping_type } = mapping.options else {
            continue;
        };
        let TimelineContent::PanasonicPtz(content) = &instance.content else {
            continue;
        };

        let id = instance.id.as_str();
        match (mapping_type, content) {
            (PtzMappingType::Preset, PtzContent::Preset { preset }) => {
                result.preset = Some(PtzValue::new(*preset, id));
            }
            (PtzMappingType::PresetSpeed, PtzContent::PresetSpeed { speed }) => {
                result.speed = Some(PtzValue::new(*speed, id));
            }
            (PtzMappingType::ZoomSpeed, PtzContent::ZoomSpeed { zoom_speed }) => {
                result.zoom_speed = Some(PtzValue::new(*zoom_speed, id));
            }
            (PtzMappingType::Zoom, PtzContent::Zoom { zoom }) => {
                result.zoom = Some(PtzValue::new(*zoom, id));
            }
            (mapping_type, _) => warnings.push(format!(
                "object \"{}\" on layer \"{}\" does not match mapping type {:?}",
                instance.id, layer_id, mapping_type
            )),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsr_core::{Mapping, ResolvedInstance};

    fn mappings() -> Mappings {
        let ptz = |mapping_type| Mapping::new("ptz0", MappingOptions::PanasonicPtz { mapping_type });
        let mut mappings = Mappings::new();
        mappings.insert("cam_preset".into(), ptz(PtzMappingType::Preset));
        mappings.insert("cam_speed".into(), ptz(PtzMappingType::PresetSpeed));
        mappings.insert("cam_zoom".into(), ptz(PtzMappingType::Zoom));
        mappings.insert("cam_zoom_speed".into(), ptz(PtzMappingType::ZoomSpeed));
        mappings
    }

    fn ptz(content: PtzContent) -> TimelineContent {
        TimelineContent::PanasonicPtz(content)
    }

    #[test]
    fn test_empty_state_has_stationary_zoom() {
        let state = convert_state(&ResolvedState::new(0), &mappings(), "ptz0", &mut Vec::new());
        assert_eq!(state, PtzState::default());
        assert_eq!(state.zoom_speed.map(|v| v.value), Some(0.0));
    }

    #[test]
    fn test_layers_fill_their_fields() {
        let state = ResolvedState::new(0)
            .with_layer("cam_preset", ResolvedInstance::new("p", ptz(PtzContent::Preset { preset: 4 })))
            .with_layer("cam_speed", ResolvedInstance::new("s", ptz(PtzContent::PresetSpeed { speed: 250 })))
            .with_layer("cam_zoom", ResolvedInstance::new("z", ptz(PtzContent::Zoom { zoom: 0.5 })));

        let mut warnings = Vec::new();
        let converted = convert_state(&state, &mappings(), "ptz0", &mut warnings);

        assert_eq!(converted.preset, Some(PtzValue::new(4, "p")));
        assert_eq!(converted.speed, Some(PtzValue::new(250, "s")));
        assert_eq!(converted.zoom, Some(PtzValue::new(0.5, "z")));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_mismatched_content_warns() {
        let state = ResolvedState::new(0)
            .with_layer("cam_zoom", ResolvedInstance::new("p", ptz(PtzContent::Preset { preset: 4 })));

        let mut warnings = Vec::new();
        let converted = convert_state(&state, &mappings(), "ptz0", &mut warnings);

        assert_eq!(converted.preset, None);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_other_device_ignored() {
        let state = ResolvedState::new(0)
            .with_layer("cam_preset", ResolvedInstance::new("p", ptz(PtzContent::Preset { preset: 4 })));
        let converted = convert_state(&state, &mappings(), "ptz1", &mut Vec::new());
        assert_eq!(converted, PtzState::default());
    }
}
