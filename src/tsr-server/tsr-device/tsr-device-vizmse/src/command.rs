// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::Serialize;

use tsr_core::{DeviceCommand, Timestamp};

use crate::state::ElementTarget;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "element", rename_all = "snake_case")]
pub enum VizMseAction {
    Prepare(ElementTarget),
    Cue(ElementTarget),
    Take(ElementTarget),
    TakeOut(ElementTarget),
    Continue(ElementTarget),
    ContinueReverse(ElementTarget),
    LoadAllElements,
}

impl VizMseAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Prepare(_) => "prepare",
            Self::Cue(_) => "cue",
            Self::Take(_) => "take",
            Self::TakeOut(_) => "out",
            Self::Continue(_) => "continue",
            Self::ContinueReverse(_) => "continuereverse",
            Self::LoadAllElements => "load_all_elements",
        }
    }

    pub fn target(&self) -> Option<&ElementTarget> {
        match self {
            Self::Prepare(t)
            | Self::Cue(t)
            | Self::Take(t)
            | Self::TakeOut(t)
            | Self::Continue(t)
            | Self::ContinueReverse(t) => Some(t),
            Self::LoadAllElements => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VizMseCommand {
    pub time: Timestamp,
    pub layer_id: String,
    pub timeline_obj_id: String,
    pub from_lookahead: bool,
    #[serde(flatten)]
    pub action: VizMseAction,
}

impl DeviceCommand for VizMseCommand {
    fn time(&self) -> Timestamp {
        self.time
    }

    fn layer_id(&self) -> Option<&str> {
        Some(&self.layer_id)
    }

    fn timeline_obj_id(&self) -> &str {
        &self.timeline_obj_id
    }

    fn context(&self) -> String {
        format!("{}_{}", self.action.name(), self.timeline_obj_id)
    }
}
