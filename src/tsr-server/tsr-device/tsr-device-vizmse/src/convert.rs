// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Resolved timeline state to engine state.

use tracing::debug;

use tsr_core::mapping::find_mapping;
use tsr_core::types::vizmse::VizMseContent;
use tsr_core::{DeviceType, Mappings, ResolvedState, TimelineContent};

use crate::state::{ElementKey, ElementLayer, ElementTarget, LayerContent, VizMseLayer, VizMseState};

/// Build the engine state for `state`.
///
/// Only layers mapped to `device_id` are considered. A lookahead instance
/// without its own mapping borrows the mapping of the layer it stands in
/// for. Problems are pushed to `warnings`; conversion never fails.
pub fn convert_state(
    state: &ResolvedState,
    mappings: &Mappings,
    device_id: &str,
    warnings: &mut Vec<String>,
) -> VizMseState {
    let mut result = VizMseState {
        time: state.time,
        ..VizMseState::default()
    };

    for (layer_id, instance) in &state.layers {
        let lookahead_for = instance
            .is_lookahead
            .then_some(instance.lookahead_for_layer.as_deref())
            .flatten();
        let Some((mapping, via_fallback)) = find_mapping(mappings, layer_id, lookahead_for) else {
            continue;
        };
        if !mapping.targets(device_id, DeviceType::VizMse) {
            continue;
        }
        let TimelineContent::VizMse(content) = &instance.content else {
            debug!("{}: layer {} carries foreign content, skipped", device_id, layer_id);
            continue;
        };

        let content = match content {
            VizMseContent::ElementInternal(element) => LayerContent::Element(ElementLayer {
                target: ElementTarget {
                    key: ElementKey::Internal {
                        template_name: element.template_name.clone(),
                        template_data: element.template_data.clone(),
                    },
                    channel_name: element.channel_name.clone(),
                },
                continue_step: element.continue_step.unwrap_or(0),
                cue: element.cue,
            }),
            VizMseContent::ElementPilot(element) => LayerContent::Element(ElementLayer {
                target: ElementTarget {
                    key: ElementKey::Pilot {
                        vcp_id: element.template_vcp_id,
                    },
                    channel_name: element.channel_name.clone(),
                },
                continue_step: element.continue_step.unwrap_or(0),
                cue: element.cue,
            }),
            VizMseContent::Continue(cont) => LayerContent::Continue {
                reference: cont.reference.clone(),
                reverse: cont.is_reverse(),
                reference_content: None,
            },
            VizMseContent::LoadAllElements => LayerContent::LoadAllElements,
            VizMseContent::Unknown => {
                warnings.push(format!(
                    "object \"{}\" on layer \"{}\" has unsupported content, ignoring it",
                    instance.id, layer_id
                ));
                continue;
            }
        };

        result.layers.insert(
            layer_id.clone(),
            VizMseLayer {
                timeline_obj_id: instance.id.clone(),
                lookahead: instance.is_lookahead || via_fallback,
                content,
            },
        );
    }

    resolve_references(&mut result, warnings);
    result
}

/// Point every continue layer at the element of the layer it references.
fn resolve_references(state: &mut VizMseState, warnings: &mut Vec<String>) {
    let resolved: Vec<(String, Option<ElementLayer>)> = state
        .layers
        .iter()
        .filter_map(|(layer_id, layer)| match &layer.content {
            LayerContent::Continue { reference, .. } => {
                let target = match state.layers.get(reference) {
                    Some(other) => match other.element() {
                        Some(element) => Some(element.clone()),
                        None => {
                            warnings.push(format!(
                                "object \"{}\" cannot reference object \"{}\" on layer \"{}\", it is not an element",
                                layer.timeline_obj_id, other.timeline_obj_id, reference
                            ));
                            None
                        }
                    },
                    None => {
                        warnings.push(format!(
                            "object \"{}\" references layer \"{}\" which has no element",
                            layer.timeline_obj_id, reference
                        ));
                        None
                    }
                };
                Some((layer_id.clone(), target))
            }
            _ => None,
        })
        .collect();

    for (layer_id, target) in resolved {
        if let Some(LayerContent::Continue {
            reference_content, ..
        }) = state.layers.get_mut(&layer_id).map(|l| &mut l.content)
        {
            *reference_content = target;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsr_core::types::vizmse::{VizMseContinue, VizMseElementInternal, VizMseElementPilot};
    use tsr_core::{Mapping, MappingOptions, ResolvedInstance};

    fn mappings() -> Mappings {
        let mut mappings = Mappings::new();
        mappings.insert("gfx".into(), Mapping::new("viz0", MappingOptions::VizMse));
        mappings.insert("gfx_next".into(), Mapping::new("viz0", MappingOptions::VizMse));
        mappings.insert("other_viz".into(), Mapping::new("viz1", MappingOptions::VizMse));
        mappings
    }

    fn internal(name: &str) -> TimelineContent {
        TimelineContent::VizMse(VizMseContent::ElementInternal(VizMseElementInternal {
            template_name: name.into(),
            template_data: vec!["a".into()],
            channel_name: None,
            continue_step: None,
            cue: false,
        }))
    }

    fn continue_on(reference: &str) -> TimelineContent {
        TimelineContent::VizMse(VizMseContent::Continue(VizMseContinue {
            reference: reference.into(),
            direction: None,
        }))
    }

    #[test]
    fn test_converts_mapped_layers_only() {
        let state = ResolvedState::new(1_000)
            .with_layer("gfx", ResolvedInstance::new("obj0", internal("lower")))
            .with_layer("other_viz", ResolvedInstance::new("obj1", internal("lower")))
            .with_layer("unmapped", ResolvedInstance::new("obj2", internal("lower")));

        let mut warnings = Vec::new();
        let converted = convert_state(&state, &mappings(), "viz0", &mut warnings);

        assert_eq!(converted.time, 1_000);
        assert_eq!(converted.layers.keys().collect::<Vec<_>>(), vec!["gfx"]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_lookahead_borrows_mapping() {
        let pilot = TimelineContent::VizMse(VizMseContent::ElementPilot(VizMseElementPilot {
            template_vcp_id: 1234,
            channel_name: Some("FULL1".into()),
            continue_step: Some(2),
            cue: true,
        }));
        let state = ResolvedState::new(0).with_layer(
            "gfx_lookahead",
            ResolvedInstance::new("obj_la", pilot).lookahead_for("gfx"),
        );

        let mut warnings = Vec::new();
        let converted = convert_state(&state, &mappings(), "viz0", &mut warnings);

        let layer = &converted.layers["gfx_lookahead"];
        assert!(layer.lookahead);
        let element = layer.element().unwrap();
        assert_eq!(element.target.key, ElementKey::Pilot { vcp_id: 1234 });
        assert_eq!(element.continue_step, 2);
        assert!(element.cue);
    }

    #[test]
    fn test_continue_resolves_reference() {
        let state = ResolvedState::new(0)
            .with_layer("gfx", ResolvedInstance::new("obj0", internal("lower")))
            .with_layer("gfx_next", ResolvedInstance::new("obj1", continue_on("gfx")));

        let mut warnings = Vec::new();
        let converted = convert_state(&state, &mappings(), "viz0", &mut warnings);

        match &converted.layers["gfx_next"].content {
            LayerContent::Continue {
                reference_content: Some(element),
                reverse,
                ..
            } => {
                assert!(!reverse);
                assert_eq!(Some(element), converted.layers["gfx"].element());
            }
            other => panic!("unexpected layer content: {:?}", other),
        }
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_missing_reference_warns_once() {
        let state = ResolvedState::new(0)
            .with_layer("gfx_next", ResolvedInstance::new("obj1", continue_on("nowhere")));

        let mut warnings = Vec::new();
        let converted = convert_state(&state, &mappings(), "viz0", &mut warnings);

        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            converted.layers["gfx_next"].content,
            LayerContent::Continue {
                reference_content: None,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_content_warns() {
        let state = ResolvedState::new(0).with_layer(
            "gfx",
            ResolvedInstance::new("obj0", TimelineContent::VizMse(VizMseContent::Unknown)),
        );
        let mut warnings = Vec::new();
        let converted = convert_state(&state, &mappings(), "viz0", &mut warnings);

        assert!(converted.layers.is_empty());
        assert_eq!(warnings.len(), 1);
    }
}
