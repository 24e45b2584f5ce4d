//! Phantom wallet backend.
//!
//! Connects through the HTTP surface of a Phantom adapter. The adapter is
//! only usable when it reports itself as Phantom; anything else on the port
//! is treated as the provider being absent. Phantom is a Solana wallet, so
//! connections carry no chain id and chain options are ignored.

use crate::{WalletConnection, WalletError, WalletFactory, WalletInterface, WalletRegistry};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use uploader_types::{
	Address, ChainOptions, ConfigSchema, Field, FieldType, ImplementationRegistry, ProviderKind,
	Schema, ValidationError,
};

/// Default timeout for adapter requests in seconds.
const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

#[derive(Debug, Deserialize)]
struct StatusResponse {
	is_phantom: bool,
}

#[derive(Debug, Deserialize)]
struct ConnectResponse {
	public_key: String,
}

/// Phantom wallet backend.
pub struct PhantomWallet {
	client: reqwest::Client,
	adapter_url: String,
}

impl PhantomWallet {
	/// Creates a new PhantomWallet instance with configuration.
	pub fn new(config: &toml::Value) -> Result<Self, WalletError> {
		let schema = PhantomWalletSchema;
		schema.validate(config).map_err(|e| {
			WalletError::Connection(format!("Configuration validation failed: {e}"))
		})?;

		let adapter_url = config
			.get("adapter_url")
			.and_then(|v| v.as_str())
			.ok_or_else(|| WalletError::Connection("adapter_url is required".to_string()))?
			.trim_end_matches('/')
			.to_string();

		let timeout = config
			.get("timeout_seconds")
			.and_then(|v| v.as_integer())
			.map(|v| v as u64)
			.unwrap_or(DEFAULT_TIMEOUT_SECONDS);

		let client = reqwest::Client::builder()
			.timeout(Duration::from_secs(timeout))
			.build()
			.map_err(|e| WalletError::Connection(format!("Failed to build client: {e}")))?;

		Ok(Self {
			client,
			adapter_url,
		})
	}

	/// Checks that the adapter on the configured port really is Phantom.
	async fn check_presence(&self) -> Result<(), WalletError> {
		let response = self
			.client
			.get(format!("{}/status", self.adapter_url))
			.send()
			.await
			.map_err(|e| WalletError::ProviderUnavailable(format!("adapter: {e}")))?;

		let status: StatusResponse = response
			.json()
			.await
			.map_err(|e| WalletError::InvalidResponse(format!("status: {e}")))?;

		if !status.is_phantom {
			return Err(WalletError::ProviderUnavailable(
				"adapter is not Phantom".to_string(),
			));
		}
		Ok(())
	}
}

#[async_trait]
impl WalletInterface for PhantomWallet {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(PhantomWalletSchema)
	}

	fn kind(&self) -> ProviderKind {
		ProviderKind::Phantom
	}

	async fn connect(&self, _chain: Option<&ChainOptions>) -> Result<WalletConnection, WalletError> {
		self.check_presence().await?;

		debug!(adapter = %self.adapter_url, "requesting Phantom connection");
		let response = self
			.client
			.post(format!("{}/connect", self.adapter_url))
			.send()
			.await
			.map_err(|e| WalletError::ProviderUnavailable(format!("adapter: {e}")))?;

		if response.status().as_u16() == 403 {
			return Err(WalletError::UserRejected);
		}
		if !response.status().is_success() {
			return Err(WalletError::Connection(format!(
				"adapter returned status {}",
				response.status()
			)));
		}

		let connected: ConnectResponse = response
			.json()
			.await
			.map_err(|e| WalletError::InvalidResponse(format!("connect: {e}")))?;

		Ok(WalletConnection {
			address: Address::new(connected.public_key),
			chain_id: None,
		})
	}

	async fn disconnect(&self) -> Result<(), WalletError> {
		self.client
			.post(format!("{}/disconnect", self.adapter_url))
			.send()
			.await
			.map_err(|e| WalletError::ProviderUnavailable(format!("adapter: {e}")))?;
		Ok(())
	}
}

/// Configuration schema for the Phantom backend.
pub struct PhantomWalletSchema;

impl ConfigSchema for PhantomWalletSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("adapter_url", FieldType::String)],
			vec![Field::new(
				"timeout_seconds",
				FieldType::Integer {
					min: Some(1),
					max: Some(300),
				},
			)],
		);
		schema.validate(config)
	}
}

/// Registry for the Phantom backend.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "phantom";
	type Factory = WalletFactory;

	fn factory() -> Self::Factory {
		create_phantom_wallet
	}
}

impl WalletRegistry for Registry {}

/// Factory function for creating PhantomWallet instances.
pub fn create_phantom_wallet(
	config: &toml::Value,
) -> Result<Box<dyn WalletInterface>, WalletError> {
	Ok(Box::new(PhantomWallet::new(config)?))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_missing_adapter_url_rejected() {
		let config: toml::Value = toml::from_str("").unwrap();
		assert!(PhantomWallet::new(&config).is_err());
	}

	#[tokio::test]
	async fn test_unreachable_adapter() {
		let config: toml::Value = toml::from_str(
			r#"
			adapter_url = "http://192.0.2.1:1"
			timeout_seconds = 1
		"#,
		)
		.unwrap();
		let wallet = PhantomWallet::new(&config).unwrap();
		let err = wallet.connect(None).await.unwrap_err();
		assert!(matches!(err, WalletError::ProviderUnavailable(_)));
	}
}
