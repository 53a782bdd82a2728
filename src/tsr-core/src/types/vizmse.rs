// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VizMseContent {
    /// Element built from a template inside the graphics engine.
    ElementInternal(VizMseElementInternal),
    /// Element backed by an external (pilot) data entry.
    ElementPilot(VizMseElementPilot),
    /// Step another layer's element forward or backward.
    Continue(VizMseContinue),
    /// Ask the engine to load every expected element.
    LoadAllElements,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VizMseElementInternal {
    pub template_name: String,
    #[serde(default)]
    pub template_data: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continue_step: Option<i64>,
    /// Cue instead of take.
    #[serde(default)]
    pub cue: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VizMseElementPilot {
    pub template_vcp_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continue_step: Option<i64>,
    #[serde(default)]
    pub cue: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VizMseContinue {
    /// Layer whose element is continued.
    pub reference: String,
    /// `1` forward (default), `-1` reverse.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<i8>,
}

impl VizMseContinue {
    pub fn is_reverse(&self) -> bool {
        self.direction.unwrap_or(1) < 0
    }
}

/// Template reference of an expected item: a pilot VCP id or an internal
/// template name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TemplateRef {
    VcpId(i64),
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VizMseExpectedItem {
    pub template_name: TemplateRef,
    #[serde(default)]
    pub template_data: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_name: Option<String>,
    /// Track the item but leave loading to the operator.
    #[serde(default)]
    pub no_auto_preloading: bool,
}
