// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PtzContent {
    /// Recall a stored preset.
    #[serde(rename = "presetMem")]
    Preset { preset: u8 },
    /// Speed used for preset recall moves.
    #[serde(rename = "presetSpeed")]
    PresetSpeed { speed: u16 },
    /// Continuous zoom, -1.0 (wide) to 1.0 (tele), 0 stops.
    #[serde(rename = "zoomSpeed", rename_all = "camelCase")]
    ZoomSpeed { zoom_speed: f64 },
    /// Absolute zoom position, 0.0 (wide) to 1.0 (tele).
    #[serde(rename = "zoom")]
    Zoom { zoom: f64 },
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ptz_content() {
        let c: PtzContent = serde_json::from_str(r#"{"type":"zoomSpeed","zoomSpeed":-0.5}"#).unwrap();
        assert_eq!(c, PtzContent::ZoomSpeed { zoom_speed: -0.5 });

        let c: PtzContent = serde_json::from_str(r#"{"type":"presetMem","preset":3}"#).unwrap();
        assert_eq!(c, PtzContent::Preset { preset: 3 });
    }
}
