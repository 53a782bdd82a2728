// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Device controller components.
//!
//! This module contains the machinery every driver shares: scheduling
//! commands, remembering past states, emitting events, retrying remote
//! calls and tracking connection state.

pub mod driver;
pub mod events;
pub mod machine;
pub mod policies;
pub mod queue;
pub mod store;

pub use driver::{CoreOptions, DeviceCommand, DeviceCore, QueuedCommand, TransitionContext};
pub use events::{
    CommandContext, CommandReport, DeviceEventEmitter, DeviceListener, ListenerId, RecordedEvent,
    RecordingListener,
};
pub use machine::{ConnectionAction, ConnectionEvent, ConnectionMachine, ConnectionPhase};
pub use policies::{retry_with, FixedDelay, RetryPolicy};
pub use queue::{CommandQueue, QueueEntry};
pub use store::{StateHistoryEntry, StateStore};
