// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod device;
pub mod mapping;
pub mod time;
pub mod timeline;
pub mod types;

pub type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub use device::controller::{
    CoreOptions, DeviceCommand, DeviceCore, DeviceEventEmitter, DeviceListener, QueuedCommand,
    TransitionContext,
};
pub use device::error::{DeviceError, DeviceResult, ErrorKind};
pub use device::status::{DeviceStatus, StatusCode};
pub use device::{Device, DeviceFuture, DeviceType};
pub use mapping::{Mapping, MappingOptions, Mappings, PtzMappingType};
pub use time::{Clock, ManualClock, SystemClock, Timestamp};
pub use timeline::{ResolvedInstance, ResolvedState, TimelineContent};
pub use types::ExpectedPlayoutItem;
