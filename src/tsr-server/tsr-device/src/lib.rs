// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use tsr_app::normalize_name;
use tsr_core::{Clock, CoreOptions, Device, DynResult};

#[cfg(feature = "ptz")]
use tsr_device_ptz::{PtzDevice, PtzOptions, SimulatedCamera};
#[cfg(feature = "shotoku")]
use tsr_device_shotoku::{ShotokuDevice, ShotokuOptions, SimulatedTransport};
#[cfg(feature = "vizmse")]
use tsr_device_vizmse::{SimulatedMse, VizMseDevice, VizMseOptions};

/// How a device reaches its hardware.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceAccess {
    /// In-memory peer, for dry runs and tests.
    #[default]
    Simulated,
    Tcp { host: String, port: u16 },
    Http { host: String, port: Option<u16> },
}

/// Everything a factory needs to build one device.
pub struct DeviceSpec {
    pub device_id: String,
    pub access: DeviceAccess,
    pub clock: Arc<dyn Clock>,
    pub core: CoreOptions,
    /// Driver-specific options, deserialized by the factory.
    pub options: serde_json::Value,
}

pub type DeviceFactory = fn(DeviceSpec) -> DynResult<Box<dyn Device>>;

/// Context for registering and instantiating device drivers.
#[derive(Clone)]
pub struct RegistrationContext {
    factories: HashMap<String, DeviceFactory>,
}

impl RegistrationContext {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a driver factory under a stable name (e.g. "vizmse").
    pub fn register_device(&mut self, name: &str, factory: DeviceFactory) {
        let key = normalize_name(name);
        self.factories.insert(key, factory);
    }

    pub fn is_device_registered(&self, name: &str) -> bool {
        self.factories.contains_key(&normalize_name(name))
    }

    /// List registered driver names.
    pub fn registered_devices(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Instantiate a device of driver `name`.
    pub fn build_device(&self, name: &str, spec: DeviceSpec) -> DynResult<Box<dyn Device>> {
        let factory = self
            .factories
            .get(&normalize_name(name))
            .ok_or_else(|| format!("Unknown device type: {}", name))?;
        debug!("Building {} device {}", name, spec.device_id);
        factory(spec)
    }

    /// Merge another registration context into this one.
    pub fn extend_from(&mut self, other: &RegistrationContext) {
        for (name, factory) in &other.factories {
            self.factories.insert(name.clone(), *factory);
        }
    }
}

impl Default for RegistrationContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Register all built-in drivers enabled by features on a context.
pub fn register_builtin_devices_on(context: &mut RegistrationContext) {
    #[cfg(feature = "vizmse")]
    context.register_device("vizmse", vizmse_factory);
    #[cfg(feature = "ptz")]
    context.register_device("panasonic_ptz", ptz_factory);
    #[cfg(feature = "shotoku")]
    context.register_device("shotoku", shotoku_factory);
}

#[cfg(feature = "vizmse")]
fn vizmse_factory(spec: DeviceSpec) -> DynResult<Box<dyn Device>> {
    let options: VizMseOptions = serde_json::from_value(spec.options)?;
    match spec.access {
        DeviceAccess::Simulated => {
            let mse = SimulatedMse::new(options.host.clone());
            Ok(Box::new(VizMseDevice::new(
                spec.device_id,
                Arc::new(mse),
                spec.clock,
                spec.core,
                options,
            )))
        }
        _ => Err("VizMSE devices only support simulated access".into()),
    }
}

#[cfg(feature = "ptz")]
fn ptz_factory(spec: DeviceSpec) -> DynResult<Box<dyn Device>> {
    let mut options: PtzOptions = serde_json::from_value(spec.options)?;
    let camera: Arc<dyn tsr_device_ptz::peer::PtzCamera> = match spec.access {
        DeviceAccess::Simulated => Arc::new(SimulatedCamera::new(options.host.clone())),
        DeviceAccess::Http { host, port } => {
            options.host = host;
            options.port = port;
            Arc::new(options.http_camera()?)
        }
        DeviceAccess::Tcp { .. } => return Err("Panasonic PTZ only supports HTTP access".into()),
    };
    Ok(Box::new(PtzDevice::new(
        spec.device_id,
        camera,
        spec.clock,
        spec.core,
        options,
    )))
}

#[cfg(feature = "shotoku")]
fn shotoku_factory(spec: DeviceSpec) -> DynResult<Box<dyn Device>> {
    let mut options: ShotokuOptions = serde_json::from_value(spec.options)?;
    let transport: Arc<dyn tsr_device_shotoku::transport::ShotokuTransport> = match spec.access {
        DeviceAccess::Simulated => Arc::new(SimulatedTransport::new()),
        DeviceAccess::Tcp { host, port } => {
            options.host = host;
            options.port = port;
            Arc::new(options.connect()?)
        }
        DeviceAccess::Http { .. } => return Err("Shotoku only supports TCP access".into()),
    };
    Ok(Box::new(ShotokuDevice::new(
        spec.device_id,
        transport,
        spec.clock,
        spec.core,
        options,
    )))
}
