// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration file support for tsr-server.
//!
//! Config is loaded from the `[tsr-server]` section of `tsr-rs.toml`.
//! Default search order:
//! 1. Path specified via `--config` CLI argument
//! 2. `./tsr-rs.toml`
//! 3. `~/.config/tsr-rs/tsr-rs.toml`
//! 4. `/etc/tsr-rs/tsr-rs.toml`

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};

use tsr_app::{ConfigError, ConfigFile};
use tsr_core::device::controller::queue::DEFAULT_TICK_MS;
use tsr_core::{CoreOptions, Mapping, MappingOptions, Mappings, PtzMappingType};
use tsr_device::DeviceAccess;

/// Top-level server configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub general: GeneralConfig,
    /// TCP listener configuration
    pub listen: ListenConfig,
    /// Scheduling behaviour shared by all devices
    pub engine: EngineConfig,
    pub devices: Vec<DeviceConfig>,
    /// Layer id to device mapping
    pub mappings: Mappings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    pub enabled: bool,
    /// IP address to listen on
    pub listen: IpAddr,
    pub port: u16,
    pub auth: AuthConfig,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 4540,
            auth: AuthConfig::default(),
        }
    }
}

/// Authentication for the TCP listener. No tokens at all means no auth.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Tokens allowed to run every command
    pub tokens: Vec<String>,
    /// Tokens limited to status and queue queries
    pub read_tokens: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How often each device drains its due commands
    pub tick_ms: u64,
    pub due_epsilon_ms: i64,
    /// How long superseded states are kept
    pub retention_ms: i64,
    pub limit_slow_sent_ms: Option<i64>,
    pub limit_slow_fulfilled_ms: Option<i64>,
    pub report_all_commands: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let core = CoreOptions::default();
        Self {
            tick_ms: DEFAULT_TICK_MS,
            due_epsilon_ms: core.due_epsilon_ms,
            retention_ms: core.retention_ms,
            limit_slow_sent_ms: core.limit_slow_sent_ms,
            limit_slow_fulfilled_ms: core.limit_slow_fulfilled_ms,
            report_all_commands: core.report_all_commands,
        }
    }
}

impl EngineConfig {
    pub fn core_options(&self) -> CoreOptions {
        CoreOptions {
            due_epsilon_ms: self.due_epsilon_ms,
            retention_ms: self.retention_ms,
            limit_slow_sent_ms: self.limit_slow_sent_ms,
            limit_slow_fulfilled_ms: self.limit_slow_fulfilled_ms,
            report_all_commands: self.report_all_commands,
        }
    }
}

/// One entry of `[[devices]]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub id: String,
    /// Driver name, e.g. "vizmse", "panasonic_ptz", "shotoku"
    #[serde(rename = "type")]
    pub device_type: String,
    pub disable: bool,
    pub access: DeviceAccess,
    /// Driver specific options
    pub options: toml::Table,
}

impl DeviceConfig {
    /// Driver options in the form device factories expect.
    pub fn options_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(&self.options)
    }
}

impl ServerConfig {
    pub fn enabled_devices(&self) -> impl Iterator<Item = &DeviceConfig> {
        self.devices.iter().filter(|d| !d.disable)
    }

    /// Generate an example configuration wrapped under the `[tsr-server]`
    /// section header.
    pub fn example_toml() -> String {
        #[derive(Serialize)]
        struct Wrapper {
            #[serde(rename = "tsr-server")]
            inner: ServerConfig,
        }

        let mut vizmse = toml::Table::new();
        vizmse.insert("host".into(), "mse01".into());
        vizmse.insert("show_id".into(), "A5B3C1D0-0000-0000-0000-000000000000".into());
        vizmse.insert("profile".into(), "sofie".into());
        let mut ptz = toml::Table::new();
        ptz.insert("probe_interval_ms".into(), toml::Value::Integer(10_000));

        let mut mappings = Mappings::new();
        mappings.insert("gfx_lower".into(), Mapping::new("viz0", MappingOptions::VizMse));
        mappings.insert(
            "cam1_preset".into(),
            Mapping::new(
                "ptz1",
                MappingOptions::PanasonicPtz {
                    mapping_type: PtzMappingType::Preset,
                },
            ),
        );
        mappings.insert("robo".into(), Mapping::new("robo0", MappingOptions::Shotoku));

        let example = ServerConfig {
            general: GeneralConfig {
                log_level: Some("info".to_string()),
            },
            listen: ListenConfig::default(),
            engine: EngineConfig::default(),
            devices: vec![
                DeviceConfig {
                    id: "viz0".into(),
                    device_type: "vizmse".into(),
                    disable: false,
                    access: DeviceAccess::Simulated,
                    options: vizmse,
                },
                DeviceConfig {
                    id: "ptz1".into(),
                    device_type: "panasonic_ptz".into(),
                    disable: false,
                    access: DeviceAccess::Http {
                        host: "10.0.1.21".into(),
                        port: None,
                    },
                    options: ptz,
                },
                DeviceConfig {
                    id: "robo0".into(),
                    device_type: "shotoku".into(),
                    disable: true,
                    access: DeviceAccess::Tcp {
                        host: "10.0.1.30".into(),
                        port: 9_000,
                    },
                    options: toml::Table::new(),
                },
            ],
            mappings,
        };
        toml::to_string_pretty(&Wrapper { inner: example }).unwrap_or_default()
    }
}

fn validate_log_level(level: Option<&str>) -> Result<(), String> {
    if let Some(level) = level {
        match level {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(format!(
                    "[general].log_level '{}' is invalid (expected one of: trace, debug, info, warn, error)",
                    level
                ))
            }
        }
    }
    Ok(())
}

fn validate_tokens(path: &str, tokens: &[String]) -> Result<(), String> {
    if tokens.iter().any(|t| t.trim().is_empty()) {
        return Err(format!("{path} must not contain empty tokens"));
    }
    Ok(())
}

fn validate_devices(devices: &[DeviceConfig], mappings: &Mappings) -> Result<(), String> {
    let mut ids = HashSet::new();
    for device in devices {
        if device.id.trim().is_empty() {
            return Err("[[devices]].id must not be empty".to_string());
        }
        if !ids.insert(device.id.as_str()) {
            return Err(format!("[[devices]].id '{}' is used more than once", device.id));
        }
        if device.device_type.trim().is_empty() {
            return Err(format!("[[devices]] '{}' has no type", device.id));
        }
        match &device.access {
            DeviceAccess::Tcp { host, port } if host.trim().is_empty() || *port == 0 => {
                return Err(format!("[[devices]] '{}': tcp access needs host and port", device.id));
            }
            DeviceAccess::Http { host, .. } if host.trim().is_empty() => {
                return Err(format!("[[devices]] '{}': http access needs a host", device.id));
            }
            _ => {}
        }
    }
    for (layer, mapping) in mappings {
        if !ids.contains(mapping.device_id.as_str()) {
            return Err(format!(
                "[mappings.{}] refers to unknown device '{}'",
                layer, mapping.device_id
            ));
        }
    }
    Ok(())
}

impl ConfigFile for ServerConfig {
    fn section_key() -> &'static str {
        "tsr-server"
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let check = || -> Result<(), String> {
            validate_log_level(self.general.log_level.as_deref())?;
            validate_tokens("[listen.auth].tokens", &self.listen.auth.tokens)?;
            validate_tokens("[listen.auth].read_tokens", &self.listen.auth.read_tokens)?;
            if self.listen.enabled && self.listen.port == 0 {
                return Err("[listen].port must be > 0 when listener is enabled".to_string());
            }
            if self.engine.tick_ms == 0 {
                return Err("[engine].tick_ms must be > 0".to_string());
            }
            if self.engine.due_epsilon_ms < 0 {
                return Err("[engine].due_epsilon_ms must not be negative".to_string());
            }
            validate_devices(&self.devices, &self.mappings)
        };
        check().map_err(ConfigError::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert!(config.listen.enabled);
        assert_eq!(config.listen.port, 4540);
        assert!(config.listen.auth.tokens.is_empty());
        assert_eq!(config.engine.tick_ms, 20);
        assert_eq!(config.engine.due_epsilon_ms, 10);
        assert_eq!(config.engine.retention_ms, 60_000);
        assert!(config.devices.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_devices_and_mappings() {
        let toml_str = r#"
[tsr-server.general]
log_level = "debug"

[tsr-server.engine]
limit_slow_sent_ms = 40

[[tsr-server.devices]]
id = "viz0"
type = "vizmse"
options = { host = "mse01", show_id = "show", profile = "sofie" }

[[tsr-server.devices]]
id = "ptz1"
type = "panasonic_ptz"
access = { type = "http", host = "10.0.1.21" }

[tsr-server.mappings.gfx]
device = "VIZMSE"
deviceId = "viz0"

[tsr-server.mappings.cam]
device = "PANASONIC_PTZ"
deviceId = "ptz1"
mappingType = "ZOOM"
"#;
        let config = ServerConfig::load_from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level.as_deref(), Some("debug"));
        assert_eq!(config.engine.core_options().limit_slow_sent_ms, Some(40));
        assert_eq!(config.devices.len(), 2);
        assert_eq!(config.devices[0].access, DeviceAccess::Simulated);
        assert_eq!(
            config.devices[1].access,
            DeviceAccess::Http {
                host: "10.0.1.21".into(),
                port: None
            }
        );
        assert_eq!(config.devices[0].options_json().unwrap()["profile"], "sofie");
        assert_eq!(
            config.mappings["cam"].options,
            MappingOptions::PanasonicPtz {
                mapping_type: PtzMappingType::Zoom
            }
        );
    }

    #[test]
    fn test_mapping_to_unknown_device_rejected() {
        let toml_str = r#"
[tsr-server.mappings.gfx]
device = "VIZMSE"
deviceId = "viz9"
"#;
        let err = ServerConfig::load_from_str(toml_str).unwrap_err();
        assert!(err.to_string().contains("unknown device 'viz9'"));
    }

    #[test]
    fn test_duplicate_device_ids_rejected() {
        let config = ServerConfig {
            devices: vec![
                DeviceConfig {
                    id: "a".into(),
                    device_type: "shotoku".into(),
                    ..DeviceConfig::default()
                },
                DeviceConfig {
                    id: "a".into(),
                    device_type: "shotoku".into(),
                    ..DeviceConfig::default()
                },
            ],
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = ServerConfig::default();
        config.general.log_level = Some("loud".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_example_round_trips() {
        let example = ServerConfig::example_toml();
        let config = ServerConfig::load_from_str(&example).unwrap();
        assert_eq!(config.devices.len(), 3);
        assert_eq!(config.enabled_devices().count(), 2);
        assert_eq!(config.mappings.len(), 3);
    }
}
