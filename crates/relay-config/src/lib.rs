//! Configuration loading for the relay module.

use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

pub mod types;

pub use types::{LoggingSettings, ModuleSettings, RelayConfig, StorageSettings};

/// Storage backends the service knows how to build.
pub const STORAGE_BACKENDS: &[&str] = &["memory", "file"];

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("File not found: {0}")]
	FileNotFound(String),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Validation error: {0}")]
	ValidationError(String),

	#[error("Environment variable not found: {0}")]
	EnvVarNotFound(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}

/// Configuration loader with environment variable substitution
pub struct ConfigLoader {
	file_path: Option<String>,
	env_prefix: String,
}

impl Default for ConfigLoader {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self {
			file_path: None,
			env_prefix: "RELAY_".to_string(),
		}
	}

	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_string_lossy().to_string());
		self
	}

	pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.env_prefix = prefix.into();
		self
	}

	pub async fn load(&self) -> Result<RelayConfig, ConfigError> {
		let Some(file_path) = &self.file_path else {
			return Err(ConfigError::FileNotFound(
				"No configuration file specified".to_string(),
			));
		};

		if !tokio::fs::try_exists(file_path).await? {
			return Err(ConfigError::FileNotFound(file_path.clone()));
		}

		debug!(path = %file_path, "Loading configuration");
		let content = tokio::fs::read_to_string(file_path).await?;
		self.parse(&content)
	}

	/// Builds a configuration from TOML text, applying substitution,
	/// environment overrides and validation.
	pub fn parse(&self, content: &str) -> Result<RelayConfig, ConfigError> {
		let substituted = self.substitute_env_vars(content)?;

		let mut config: RelayConfig =
			toml::from_str(&substituted).map_err(|e| ConfigError::ParseError(e.to_string()))?;

		self.apply_env_overrides(&mut config)?;
		self.validate_config(&config)?;

		Ok(config)
	}

	fn substitute_env_vars(&self, content: &str) -> Result<String, ConfigError> {
		let mut result = content.to_string();

		// Find and replace ${VAR_NAME} patterns
		let re = regex::Regex::new(r"\$\{([^}]+)\}")
			.map_err(|e| ConfigError::ParseError(e.to_string()))?;

		for cap in re.captures_iter(content) {
			let full_match = &cap[0];
			let var_name = &cap[1];

			let env_value = env::var(var_name)
				.map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;

			result = result.replace(full_match, &env_value);
		}

		Ok(result)
	}

	fn apply_env_overrides(&self, config: &mut RelayConfig) -> Result<(), ConfigError> {
		if let Ok(log_level) = env::var(format!("{}LOG_LEVEL", self.env_prefix)) {
			config.logging.level = log_level;
		}

		if let Ok(chain_id) = env::var(format!("{}CHAIN_ID", self.env_prefix)) {
			config.module.chain_id = chain_id
				.parse()
				.map_err(|e| ConfigError::ValidationError(format!("Invalid chain id: {}", e)))?;
		}

		if let Ok(storage_path) = env::var(format!("{}STORAGE_PATH", self.env_prefix)) {
			if !config.storage.config.is_table() {
				config.storage.config = types::empty_table();
			}
			if let Some(table) = config.storage.config.as_table_mut() {
				table.insert("storage_path".to_string(), toml::Value::String(storage_path));
			}
		}

		Ok(())
	}

	fn validate_config(&self, config: &RelayConfig) -> Result<(), ConfigError> {
		if config.module.address.is_zero() {
			return Err(ConfigError::ValidationError(
				"Module address must not be zero".to_string(),
			));
		}

		if config.module.chain_id == 0 {
			return Err(ConfigError::ValidationError(
				"Chain id must not be zero".to_string(),
			));
		}

		if !STORAGE_BACKENDS.contains(&config.storage.backend.as_str()) {
			return Err(ConfigError::ValidationError(format!(
				"Unknown storage backend '{}'",
				config.storage.backend
			)));
		}

		if !LOG_LEVELS.contains(&config.logging.level.to_lowercase().as_str()) {
			return Err(ConfigError::ValidationError(format!(
				"Unknown log level '{}'",
				config.logging.level
			)));
		}

		Ok(())
	}
}
