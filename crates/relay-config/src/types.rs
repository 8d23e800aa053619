//! Configuration file layout.

use alloy_primitives::Address;
use relay_types::GasSchedule;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
	pub module: ModuleSettings,
	#[serde(default)]
	pub gas: GasSchedule,
	#[serde(default)]
	pub storage: StorageSettings,
	#[serde(default)]
	pub logging: LoggingSettings,
}

/// Deployment the module hashes its messages for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleSettings {
	#[serde(default = "default_name")]
	pub name: String,
	pub address: Address,
	pub chain_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
	#[serde(default = "default_backend")]
	pub backend: String,
	/// Backend-specific settings, handed to the backend factory as is.
	#[serde(default = "empty_table")]
	pub config: toml::Value,
}

impl Default for StorageSettings {
	fn default() -> Self {
		Self {
			backend: default_backend(),
			config: empty_table(),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
	#[serde(default = "default_level")]
	pub level: String,
}

impl Default for LoggingSettings {
	fn default() -> Self {
		Self {
			level: default_level(),
		}
	}
}

fn default_name() -> String {
	"relay-module".to_string()
}

fn default_backend() -> String {
	"memory".to_string()
}

fn default_level() -> String {
	"info".to_string()
}

pub(crate) fn empty_table() -> toml::Value {
	toml::Value::Table(toml::map::Map::new())
}
