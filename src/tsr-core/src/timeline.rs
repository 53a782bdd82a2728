// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Resolved timeline state, as handed to devices by the orchestrator.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::time::Timestamp;
use crate::types::ptz::PtzContent;
use crate::types::shotoku::ShotokuContent;
use crate::types::vizmse::VizMseContent;

/// Per-layer active instances at `time`. Read-only to drivers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedState {
    pub time: Timestamp,
    #[serde(default)]
    pub layers: BTreeMap<String, ResolvedInstance>,
}

impl ResolvedState {
    pub fn new(time: Timestamp) -> Self {
        Self {
            time,
            layers: BTreeMap::new(),
        }
    }

    /// Builder helper, mostly for tests and fixtures.
    pub fn with_layer(mut self, layer: impl Into<String>, instance: ResolvedInstance) -> Self {
        self.layers.insert(layer.into(), instance);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedInstance {
    /// Source timeline object id.
    pub id: String,
    pub content: TimelineContent,
    /// Future cue surfaced early for preparation.
    #[serde(default)]
    pub is_lookahead: bool,
    /// Layer this lookahead instance stands in for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookahead_for_layer: Option<String>,
}

impl ResolvedInstance {
    pub fn new(id: impl Into<String>, content: TimelineContent) -> Self {
        Self {
            id: id.into(),
            content,
            is_lookahead: false,
            lookahead_for_layer: None,
        }
    }

    pub fn lookahead_for(mut self, layer: impl Into<String>) -> Self {
        self.is_lookahead = true;
        self.lookahead_for_layer = Some(layer.into());
        self
    }
}

/// Device-specific payload of a timeline object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "deviceType")]
pub enum TimelineContent {
    #[serde(rename = "VIZMSE")]
    VizMse(VizMseContent),
    #[serde(rename = "PANASONIC_PTZ")]
    PanasonicPtz(PtzContent),
    #[serde(rename = "SHOTOKU")]
    Shotoku(ShotokuContent),
    /// Content for a device family this build does not drive.
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::vizmse::VizMseElementInternal;

    #[test]
    fn test_parse_resolved_state() {
        let json = r#"{
            "time": 1000,
            "layers": {
                "gfx_lower": {
                    "id": "obj0",
                    "content": {
                        "deviceType": "VIZMSE",
                        "type": "element_internal",
                        "templateName": "lower_third",
                        "templateData": ["Jane Doe", "Reporter"]
                    }
                },
                "audio": {
                    "id": "obj1",
                    "content": { "deviceType": "SISYFOS", "faderLevel": 0.75 }
                }
            }
        }"#;

        let state: ResolvedState = serde_json::from_str(json).unwrap();
        assert_eq!(state.time, 1000);
        assert_eq!(
            state.layers["gfx_lower"].content,
            TimelineContent::VizMse(VizMseContent::ElementInternal(VizMseElementInternal {
                template_name: "lower_third".into(),
                template_data: vec!["Jane Doe".into(), "Reporter".into()],
                channel_name: None,
                continue_step: None,
                cue: false,
            }))
        );
        assert_eq!(state.layers["audio"].content, TimelineContent::Other);
        assert!(!state.layers["audio"].is_lookahead);
    }
}
