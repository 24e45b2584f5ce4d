//! Coordinator assembly from configuration.
//!
//! Builds the wallet service and relay builder out of the implementation
//! registries, wiring each configured backend through its factory function.

use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;
use uploader_config::Config;
use uploader_core::{Coordinator, RelayBuilder};
use uploader_types::ProviderKind;
use uploader_wallet::{WalletInterface, WalletService};

/// Errors that can occur while assembling the coordinator.
#[derive(Debug, Error)]
pub enum BuildError {
	#[error("Unknown wallet backend: {0}")]
	UnknownWalletBackend(String),
	#[error("Unknown relay backend: {0}")]
	UnknownRelayBackend(String),
	#[error("Wallet backend '{name}' failed to initialize: {message}")]
	WalletInit { name: String, message: String },
}

/// Builds a coordinator from the given configuration.
///
/// Each entry in `wallet.implementations` is instantiated through its
/// registered factory and keyed by provider kind. The relay backend named by
/// `relay.primary` becomes the builder used for relay sessions; it is
/// instantiated lazily, per session, with the endpoint the user supplies.
pub fn build_coordinator(config: &Config) -> Result<Coordinator, BuildError> {
	let wallet_factories: HashMap<&str, _> =
		uploader_wallet::get_all_implementations().into_iter().collect();

	let mut wallets: HashMap<ProviderKind, Box<dyn WalletInterface>> = HashMap::new();
	for (name, backend_config) in &config.wallet.implementations {
		let factory = wallet_factories
			.get(name.as_str())
			.ok_or_else(|| BuildError::UnknownWalletBackend(name.clone()))?;
		let backend = factory(backend_config).map_err(|e| BuildError::WalletInit {
			name: name.clone(),
			message: e.to_string(),
		})?;
		// Config validation already checked the name parses
		let kind = ProviderKind::from_str(name)
			.map_err(|_| BuildError::UnknownWalletBackend(name.clone()))?;
		tracing::debug!(backend = name, "wallet backend configured");
		wallets.insert(kind, backend);
	}

	let relay_factories: HashMap<&str, _> =
		uploader_relay::get_all_implementations().into_iter().collect();
	let relay_factory = *relay_factories
		.get(config.relay.primary.as_str())
		.ok_or_else(|| BuildError::UnknownRelayBackend(config.relay.primary.clone()))?;
	let relay_config = config
		.relay
		.implementations
		.get(&config.relay.primary)
		.cloned()
		.unwrap_or(toml::Value::Table(toml::map::Map::new()));
	let relay_builder: RelayBuilder =
		Box::new(move |endpoint| relay_factory(endpoint, &relay_config));

	Ok(Coordinator::new(
		config.currencies.clone(),
		WalletService::new(wallets),
		relay_builder,
		config.relay.endpoint.clone(),
	))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_build_from_default_config() {
		let config: Config = "".parse().unwrap();
		let coordinator = build_coordinator(&config).unwrap();
		assert_eq!(coordinator.endpoint(), "https://node1.bundlr.network");
	}

	#[test]
	fn test_build_with_mock_relay_and_wallet() {
		let config: Config = r#"
[relay]
primary = "mock"
[relay.implementations.mock]

[wallet.implementations.injected]
rpc_url = "http://localhost:8545"
"#
		.parse()
		.unwrap();
		assert!(build_coordinator(&config).is_ok());
	}

	#[test]
	fn test_unknown_relay_primary_rejected() {
		let mut config: Config = "".parse().unwrap();
		config.relay.primary = "grpc".to_string();
		config
			.relay
			.implementations
			.insert("grpc".to_string(), toml::Value::Table(toml::map::Map::new()));
		let err = build_coordinator(&config).unwrap_err();
		assert!(matches!(err, BuildError::UnknownRelayBackend(_)));
	}
}
