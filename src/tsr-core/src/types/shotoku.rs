// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShotokuContent {
    Shot(ShotokuShot),
    #[serde(rename_all = "camelCase")]
    Sequence {
        sequence_id: String,
        shots: Vec<ShotokuSequenceShot>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShotokuTransition {
    #[default]
    Cut,
    Fade,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShotokuShot {
    pub shot: u8,
    /// Defaults to 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_type: Option<ShotokuTransition>,
    #[serde(default)]
    pub change_operator_screen: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShotokuSequenceShot {
    /// Milliseconds after the sequence starts.
    pub offset: Timestamp,
    #[serde(flatten)]
    pub shot: ShotokuShot,
}
