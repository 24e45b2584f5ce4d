//! Configuration module for the uploader service.
//!
//! This module provides structures and utilities for managing uploader
//! configuration. It supports loading configuration from TOML files,
//! resolving environment variable references, and validating that the relay
//! endpoint, currency table, and wallet backends are coherently specified.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;
use uploader_types::{default_currencies, CurrenciesConfig, ProviderKind};

/// Default relay node endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://node1.bundlr.network";

/// Minimum length of a usable endpoint URL.
///
/// Anything at or below this cannot be a real `http(s)://` URL with a host.
const MIN_ENDPOINT_LENGTH: usize = 8;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		let message = err.message().to_string();
		ConfigError::Parse(message)
	}
}

/// Main configuration structure for the uploader.
///
/// Contains the relay node settings, the currency table with its provider
/// and chain options, and the wallet backend configurations.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Configuration for the relay node.
	#[serde(default)]
	pub relay: RelayConfig,
	/// Currency table keyed by currency name.
	#[serde(default = "default_currencies")]
	pub currencies: CurrenciesConfig,
	/// Configuration for wallet backends.
	#[serde(default)]
	pub wallet: WalletConfig,
}

/// Configuration for the relay node.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayConfig {
	/// Relay node endpoint URL.
	#[serde(default = "default_endpoint")]
	pub endpoint: String,
	/// Which implementation to use as primary.
	#[serde(default = "default_relay_primary")]
	pub primary: String,
	/// Map of relay implementation names to their configurations.
	#[serde(default = "default_relay_implementations")]
	pub implementations: HashMap<String, toml::Value>,
}

impl Default for RelayConfig {
	fn default() -> Self {
		Self {
			endpoint: default_endpoint(),
			primary: default_relay_primary(),
			implementations: default_relay_implementations(),
		}
	}
}

/// Configuration for wallet backends.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WalletConfig {
	/// Map of wallet backend names to their configurations.
	/// Keys must be provider kind names: injected, walletconnect, phantom.
	#[serde(default)]
	pub implementations: HashMap<String, toml::Value>,
}

/// Returns the default relay endpoint.
fn default_endpoint() -> String {
	DEFAULT_ENDPOINT.to_string()
}

/// Returns the default primary relay implementation.
fn default_relay_primary() -> String {
	"http".to_string()
}

/// Returns the default relay implementation table.
///
/// An empty `http` entry, so a bare configuration file still yields a
/// working relay backend against the default endpoint.
fn default_relay_implementations() -> HashMap<String, toml::Value> {
	let mut implementations = HashMap::new();
	implementations.insert("http".to_string(), toml::Value::Table(toml::map::Map::new()));
	implementations
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	// Limit input size to prevent ReDoS attacks
	const MAX_INPUT_SIZE: usize = 1024 * 1024; // 1MB
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {e}")))?;

	let mut result = input.to_string();
	let mut replacements = Vec::new();

	for cap in re.captures_iter(input) {
		let full_match = cap.get(0).unwrap();
		let var_name = cap.get(1).unwrap().as_str();
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name) {
			Ok(v) => v,
			Err(_) => {
				if let Some(default) = default_value {
					default.to_string()
				} else {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{var_name}' not found"
					)));
				}
			},
		};

		replacements.push((full_match.start(), full_match.end(), value));
	}

	// Apply replacements in reverse order to maintain positions
	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(start..end, value);
	}

	Ok(result)
}

impl Config {
	/// Loads configuration from a file.
	///
	/// Environment variable references in the file are resolved and the
	/// configuration is validated before being returned.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let contents = tokio::fs::read_to_string(path).await?;
		contents.parse()
	}

	/// Validates the configuration to ensure all required fields are properly set.
	///
	/// - The relay endpoint must be a plausible http(s) URL
	/// - The primary relay implementation must exist in the implementation table
	/// - Every currency must name at least one provider
	/// - Configured chains must carry a nonzero chain id and at least one RPC URL
	/// - Wallet backend names must be known provider kinds
	fn validate(&self) -> Result<(), ConfigError> {
		// Validate relay config
		if self.relay.endpoint.len() <= MIN_ENDPOINT_LENGTH {
			return Err(ConfigError::Validation(format!(
				"Relay endpoint '{}' is too short to be a URL",
				self.relay.endpoint
			)));
		}
		if !self.relay.endpoint.starts_with("http://") && !self.relay.endpoint.starts_with("https://")
		{
			return Err(ConfigError::Validation(format!(
				"Relay endpoint '{}' must start with http:// or https://",
				self.relay.endpoint
			)));
		}
		if self.relay.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one relay implementation must be configured".into(),
			));
		}
		if !self
			.relay
			.implementations
			.contains_key(&self.relay.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary relay '{}' not found in implementations",
				self.relay.primary
			)));
		}

		// Validate currency table
		if self.currencies.is_empty() {
			return Err(ConfigError::Validation(
				"At least one currency must be configured".into(),
			));
		}
		for (currency, currency_config) in &self.currencies {
			if currency_config.providers.is_empty() {
				return Err(ConfigError::Validation(format!(
					"Currency '{currency}' must name at least one provider"
				)));
			}
			if let Some(chain) = &currency_config.chain {
				if chain.chain_id == 0 {
					return Err(ConfigError::Validation(format!(
						"Currency '{currency}' has chain id 0"
					)));
				}
				if chain.rpc_urls.is_empty() {
					return Err(ConfigError::Validation(format!(
						"Currency '{currency}' chain must list at least one RPC URL"
					)));
				}
			}
		}

		// Validate wallet backend names
		for name in self.wallet.implementations.keys() {
			ProviderKind::from_str(name).map_err(|e| {
				ConfigError::Validation(format!("Unknown wallet backend '{name}': {e}"))
			})?;
		}

		Ok(())
	}
}

/// Implementation of FromStr trait for Config to enable parsing from string.
///
/// Environment variables are resolved and the configuration is automatically
/// validated after parsing.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
