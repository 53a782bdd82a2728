// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Device state of the graphics engine, one entry per mapped layer.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use tsr_app::stable_hash;
use tsr_core::Timestamp;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VizMseState {
    pub time: Timestamp,
    pub layers: BTreeMap<String, VizMseLayer>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VizMseLayer {
    pub timeline_obj_id: String,
    pub lookahead: bool,
    pub content: LayerContent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayerContent {
    Element(ElementLayer),
    Continue {
        reference: String,
        reverse: bool,
        /// Element of the referenced layer, filled in after conversion.
        reference_content: Option<ElementLayer>,
    },
    LoadAllElements,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementLayer {
    pub target: ElementTarget,
    pub continue_step: i64,
    pub cue: bool,
}

/// Identity of a remote element. Two equal keys always address the same
/// element in the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementKey {
    Internal {
        template_name: String,
        template_data: Vec<String>,
    },
    Pilot {
        vcp_id: i64,
    },
}

impl ElementKey {
    /// Instance name used for the element in the engine's rundown.
    pub fn instance_name(&self) -> String {
        match self {
            Self::Internal {
                template_name,
                template_data,
            } => format!("tsrInt_{}_{}", template_name, stable_hash(template_data.as_slice())),
            Self::Pilot { vcp_id } => format!("pilot_{}", vcp_id),
        }
    }
}

impl fmt::Display for ElementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal { .. } => write!(f, "int_{}", self.instance_name()),
            Self::Pilot { vcp_id } => write!(f, "pilot_{}", vcp_id),
        }
    }
}

/// An element together with the output channel it plays on. This is the
/// identity of a cached element: the same template on two channels is two
/// elements in the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ElementTarget {
    pub key: ElementKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_name: Option<String>,
}

impl ElementTarget {
    /// Instance name in the rundown. Internal elements on a channel get the
    /// channel folded into the hash.
    pub fn instance_name(&self) -> String {
        match (&self.key, &self.channel_name) {
            (
                ElementKey::Internal {
                    template_name,
                    template_data,
                },
                Some(channel),
            ) => {
                let mut fields = template_data.clone();
                fields.push(format!("channel:{}", channel));
                format!("tsrInt_{}_{}", template_name, stable_hash(fields.as_slice()))
            }
            (key, _) => key.instance_name(),
        }
    }
}

impl fmt::Display for ElementTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.channel_name {
            Some(channel) => write!(f, "{}@{}", self.key, channel),
            None => write!(f, "{}", self.key),
        }
    }
}

impl ElementLayer {
    /// Equal in everything but the continue step.
    pub fn same_element(&self, other: &ElementLayer) -> bool {
        self.target == other.target && self.cue == other.cue
    }
}

impl VizMseLayer {
    pub fn element(&self) -> Option<&ElementLayer> {
        match &self.content {
            LayerContent::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Equality that ignores the continue step counter.
    pub fn same_except_step(&self, other: &VizMseLayer) -> bool {
        if self.timeline_obj_id != other.timeline_obj_id || self.lookahead != other.lookahead {
            return false;
        }
        match (&self.content, &other.content) {
            (LayerContent::Element(a), LayerContent::Element(b)) => a.same_element(b),
            (a, b) => a == b,
        }
    }
}
