// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Timeline content and expected-item types per device family.

pub mod ptz;
pub mod shotoku;
pub mod vizmse;

use serde::{Deserialize, Serialize};

/// Item a device may want to preload before it shows up on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "deviceType")]
pub enum ExpectedPlayoutItem {
    #[serde(rename = "VIZMSE")]
    VizMse(vizmse::VizMseExpectedItem),
    #[serde(other)]
    Other,
}
