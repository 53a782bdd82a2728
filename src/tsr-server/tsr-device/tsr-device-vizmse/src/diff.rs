// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Engine state differ.
//!
//! Commands for lookahead layers are appended after every live command, so a
//! preview can never race ahead of what is on air.

use serde::Deserialize;

use tsr_core::Timestamp;

use crate::command::{VizMseAction, VizMseCommand};
use crate::state::{LayerContent, VizMseLayer, VizMseState};

/// Timing of the preparation phase relative to activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DiffTiming {
    /// Ideal lead of a prepare before its take.
    pub ideal_prepare_ms: i64,
    /// Earliest prepare after the previous state became active.
    pub prepare_settle_ms: i64,
    /// Lead used when the prepare would otherwise land after the take.
    pub min_prepare_margin_ms: i64,
}

impl Default for DiffTiming {
    fn default() -> Self {
        Self {
            ideal_prepare_ms: 1_000,
            prepare_settle_ms: 50,
            min_prepare_margin_ms: 10,
        }
    }
}

/// When to prepare elements that activate at `time`.
pub fn prepare_time(time: Timestamp, old_time: Timestamp, now: Timestamp, timing: &DiffTiming) -> Timestamp {
    let mut prepare = time.min((time - timing.ideal_prepare_ms).max(old_time + timing.prepare_settle_ms));
    if prepare < now {
        prepare = now;
    }
    if time < prepare {
        prepare = time - timing.min_prepare_margin_ms;
    }
    prepare
}

#[derive(Default)]
struct CommandSink {
    live: Vec<VizMseCommand>,
    lookahead: Vec<VizMseCommand>,
}

impl CommandSink {
    fn push(&mut self, layer_id: &str, layer: &VizMseLayer, time: Timestamp, action: VizMseAction) {
        let command = VizMseCommand {
            time,
            layer_id: layer_id.to_string(),
            timeline_obj_id: layer.timeline_obj_id.clone(),
            from_lookahead: layer.lookahead,
            action,
        };
        if layer.lookahead {
            self.lookahead.push(command);
        } else {
            self.live.push(command);
        }
    }

    fn finish(mut self) -> Vec<VizMseCommand> {
        self.live.append(&mut self.lookahead);
        self.live
    }
}

/// Commands that take the engine from `old` to `new`, activating at `time`.
pub fn diff_states(
    old: &VizMseState,
    new: &VizMseState,
    time: Timestamp,
    now: Timestamp,
    timing: &DiffTiming,
) -> Vec<VizMseCommand> {
    let prepare_at = prepare_time(time, old.time, now, timing);
    let mut sink = CommandSink::default();

    for (layer_id, new_layer) in &new.layers {
        let old_layer = old.layers.get(layer_id);

        match &new_layer.content {
            LayerContent::LoadAllElements => {
                if old_layer != Some(new_layer) {
                    sink.push(layer_id, new_layer, time, VizMseAction::LoadAllElements);
                }
            }
            LayerContent::Continue {
                reverse,
                reference_content: Some(element),
                ..
            } => {
                if old_layer != Some(new_layer) {
                    let target = element.target.clone();
                    let action = if *reverse {
                        VizMseAction::ContinueReverse(target)
                    } else {
                        VizMseAction::Continue(target)
                    };
                    sink.push(layer_id, new_layer, time, action);
                }
            }
            // Unresolved reference, already reported by the converter.
            LayerContent::Continue { .. } => {}
            LayerContent::Element(element) => {
                let target = element.target.clone();
                match old_layer {
                    Some(old_layer) if old_layer.same_except_step(new_layer) => {
                        let old_step = old_layer.element().map_or(0, |e| e.continue_step);
                        if element.continue_step > old_step {
                            sink.push(layer_id, new_layer, time, VizMseAction::Continue(target));
                        } else if element.continue_step < old_step {
                            sink.push(layer_id, new_layer, time, VizMseAction::ContinueReverse(target));
                        }
                    }
                    _ => {
                        sink.push(layer_id, new_layer, prepare_at, VizMseAction::Prepare(target.clone()));
                        let action = if element.cue {
                            VizMseAction::Cue(target)
                        } else {
                            VizMseAction::Take(target)
                        };
                        sink.push(layer_id, new_layer, time, action);
                    }
                }
            }
        }
    }

    for (layer_id, old_layer) in &old.layers {
        if new.layers.contains_key(layer_id) {
            continue;
        }
        if let Some(element) = old_layer.element() {
            sink.push(
                layer_id,
                old_layer,
                time,
                VizMseAction::TakeOut(element.target.clone()),
            );
        }
    }

    sink.finish()
}
