// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Shot commands, their wire framing and the state differ.

use serde::Serialize;

use tsr_core::types::shotoku::{ShotokuSequenceShot, ShotokuShot, ShotokuTransition};
use tsr_core::{DeviceCommand, Timestamp};

use crate::state::ShotokuState;

pub const FRAME_LEN: usize = 9;
const FRAME_START: u8 = 0xf9;
const FRAME_ADDRESS: u8 = 0x01;
const CODE_FADE: u8 = 0x01;
const CODE_CUT: u8 = 0x02;
const CODE_OPERATOR_SCREEN: u8 = 0x20;
/// All bytes of a frame add up to this, modulo 256.
const CHECKSUM_TARGET: u8 = 0x40;

/// Frame that recalls `shot` on the controller.
pub fn encode_shot(shot: &ShotokuShot) -> [u8; FRAME_LEN] {
    let mut code = match shot.transition_type.unwrap_or_default() {
        ShotokuTransition::Fade => CODE_FADE,
        ShotokuTransition::Cut => CODE_CUT,
    };
    if shot.change_operator_screen {
        code += CODE_OPERATOR_SCREEN;
    }
    let show = shot.show.filter(|s| *s != 0).unwrap_or(1);

    let mut frame = [FRAME_START, FRAME_ADDRESS, code, 0x00, show, shot.shot, 0x00, 0x00, 0x00];
    let sum = frame[..FRAME_LEN - 1].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    frame[FRAME_LEN - 1] = CHECKSUM_TARGET.wrapping_sub(sum);
    frame
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShotokuAction {
    Shot(ShotokuShot),
    #[serde(rename_all = "camelCase")]
    Sequence {
        sequence_id: String,
        shots: Vec<ShotokuSequenceShot>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShotokuCommand {
    pub time: Timestamp,
    pub layer_id: String,
    pub timeline_obj_id: String,
    pub action: ShotokuAction,
}

impl DeviceCommand for ShotokuCommand {
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
        match &self.action {
            ShotokuAction::Shot(shot) => format!("shot_{}_{}", shot.shot, self.timeline_obj_id),
            ShotokuAction::Sequence { sequence_id, .. } => {
                format!("sequence_{}_{}", sequence_id, self.timeline_obj_id)
            }
        }
    }
}

/// Shots that changed per layer, and sequences that are new or changed,
/// all at `time`. Nothing is sent for removed entries.
pub fn diff_states(old: &ShotokuState, new: &ShotokuState, time: Timestamp) -> Vec<ShotokuCommand> {
    let mut commands = Vec::new();

    for (layer_id, entry) in &new.shots {
        if old.shots.get(layer_id).map(|o| &o.shot) == Some(&entry.shot) {
            continue;
        }
        commands.push(ShotokuCommand {
            time,
            layer_id: layer_id.clone(),
            timeline_obj_id: entry.timeline_obj_id.clone(),
            action: ShotokuAction::Shot(entry.shot.clone()),
        });
    }

    for (sequence_id, entry) in &new.sequences {
        if old.sequences.get(sequence_id).map(|o| &o.shots) == Some(&entry.shots) {
            continue;
        }
        commands.push(ShotokuCommand {
            time,
            layer_id: entry.layer_id.clone(),
            timeline_obj_id: entry.timeline_obj_id.clone(),
            action: ShotokuAction::Sequence {
                sequence_id: sequence_id.clone(),
                shots: entry.shots.clone(),
            },
        });
    }

    commands
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{SequenceEntry, ShotEntry};

    fn shot(n: u8) -> ShotokuShot {
        ShotokuShot {
            shot: n,
            show: None,
            transition_type: None,
            change_operator_screen: false,
        }
    }

    fn with_shot(layer: &str, id: &str, n: u8) -> ShotokuState {
        let mut state = ShotokuState::default();
        state.shots.insert(
            layer.into(),
            ShotEntry {
                timeline_obj_id: id.into(),
                shot: shot(n),
            },
        );
        state
    }

    #[test]
    fn test_cut_frame() {
        assert_eq!(
            encode_shot(&shot(5)),
            [0xf9, 0x01, 0x02, 0x00, 0x01, 0x05, 0x00, 0x00, 0x3e]
        );
    }

    #[test]
    fn test_fade_with_operator_screen() {
        let frame = encode_shot(&ShotokuShot {
            shot: 200,
            show: Some(3),
            transition_type: Some(ShotokuTransition::Fade),
            change_operator_screen: true,
        });
        assert_eq!(frame[2], 0x21);
        assert_eq!(frame[4], 3);
        assert_eq!(frame[5], 200);
        let sum = frame.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
        assert_eq!(sum, 0x40);
    }

    #[test]
    fn test_show_zero_means_default() {
        let frame = encode_shot(&ShotokuShot {
            show: Some(0),
            ..shot(1)
        });
        assert_eq!(frame[4], 1);
    }

    #[test]
    fn test_diff_shot_changes_only() {
        let old = with_shot("robo", "o1", 4);
        assert!(diff_states(&old, &with_shot("robo", "o2", 4), 100).is_empty());

        let commands = diff_states(&old, &with_shot("robo", "o3", 7), 100);
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].layer_id(), Some("robo"));
        assert_eq!(commands[0].context(), "shot_7_o3");
        assert_eq!(commands[0].time, 100);

        assert!(diff_states(&old, &ShotokuState::default(), 100).is_empty());
    }

    #[test]
    fn test_diff_new_sequence() {
        let mut new = ShotokuState::default();
        new.sequences.insert(
            "intro".into(),
            SequenceEntry {
                timeline_obj_id: "o9".into(),
                layer_id: "robo_seq".into(),
                shots: vec![
                    ShotokuSequenceShot { offset: 0, shot: shot(1) },
                    ShotokuSequenceShot { offset: 1_500, shot: shot(2) },
                ],
            },
        );

        let commands = diff_states(&ShotokuState::default(), &new, 500);
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].context(), "sequence_intro_o9");
        assert!(diff_states(&new, &new, 600).is_empty());
    }
}
