//! WalletConnect bridge backend.
//!
//! Establishes a session through a WalletConnect bridge over HTTP. The
//! desired chain is part of the session request; the remote wallet either
//! approves the session on that chain or the session comes back on another
//! chain and the connection fails. Unlike the injected backend there is a
//! real remote session, so disconnecting tells the bridge to kill it.

use crate::{WalletConnection, WalletError, WalletFactory, WalletInterface, WalletRegistry};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;
use uploader_types::{
	Address, ChainOptions, ConfigSchema, Field, FieldType, ImplementationRegistry, ProviderKind,
	Schema, ValidationError,
};

/// Default timeout for bridge requests in seconds.
///
/// Session approval waits on a human with a phone, so this is generous.
const DEFAULT_TIMEOUT_SECONDS: u64 = 120;

#[derive(Debug, Deserialize)]
struct SessionResponse {
	approved: bool,
	#[serde(default)]
	accounts: Vec<String>,
	#[serde(default)]
	chain_id: Option<u64>,
}

/// WalletConnect bridge backend.
pub struct WalletConnectWallet {
	client: reqwest::Client,
	bridge_url: String,
}

impl WalletConnectWallet {
	/// Creates a new WalletConnectWallet instance with configuration.
	pub fn new(config: &toml::Value) -> Result<Self, WalletError> {
		let schema = WalletConnectSchema;
		schema.validate(config).map_err(|e| {
			WalletError::Connection(format!("Configuration validation failed: {e}"))
		})?;

		let bridge_url = config
			.get("bridge_url")
			.and_then(|v| v.as_str())
			.ok_or_else(|| WalletError::Connection("bridge_url is required".to_string()))?
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

		Ok(Self { client, bridge_url })
	}
}

#[async_trait]
impl WalletInterface for WalletConnectWallet {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(WalletConnectSchema)
	}

	fn kind(&self) -> ProviderKind {
		ProviderKind::WalletConnect
	}

	async fn connect(&self, chain: Option<&ChainOptions>) -> Result<WalletConnection, WalletError> {
		let mut request = json!({});
		if let Some(chain) = chain {
			request = json!({
				"chain_id": chain.chain_id,
				"rpc_urls": chain.rpc_urls,
			});
		}

		debug!(bridge = %self.bridge_url, "requesting bridge session");
		let response = self
			.client
			.post(format!("{}/session", self.bridge_url))
			.json(&request)
			.send()
			.await
			.map_err(|e| WalletError::ProviderUnavailable(format!("bridge: {e}")))?;

		if !response.status().is_success() {
			return Err(WalletError::Connection(format!(
				"bridge returned status {}",
				response.status()
			)));
		}

		let session: SessionResponse = response
			.json()
			.await
			.map_err(|e| WalletError::InvalidResponse(format!("session: {e}")))?;

		if !session.approved {
			return Err(WalletError::UserRejected);
		}
		let address = session
			.accounts
			.first()
			.ok_or_else(|| WalletError::InvalidResponse("session has no accounts".to_string()))?
			.clone();

		if let Some(target) = chain {
			if session.chain_id != Some(target.chain_id) {
				return Err(WalletError::ChainSwitchFailed {
					chain_id: target.chain_id,
					reason: match session.chain_id {
						Some(actual) => format!("session approved on chain {actual}"),
						None => "session reports no chain".to_string(),
					},
				});
			}
		}

		Ok(WalletConnection {
			address: Address::new(address),
			chain_id: session.chain_id,
		})
	}

	async fn disconnect(&self) -> Result<(), WalletError> {
		debug!(bridge = %self.bridge_url, "killing bridge session");
		self.client
			.post(format!("{}/session/kill", self.bridge_url))
			.send()
			.await
			.map_err(|e| WalletError::ProviderUnavailable(format!("bridge: {e}")))?;
		Ok(())
	}
}

/// Configuration schema for the WalletConnect backend.
pub struct WalletConnectSchema;

impl ConfigSchema for WalletConnectSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("bridge_url", FieldType::String)],
			vec![Field::new(
				"timeout_seconds",
				FieldType::Integer {
					min: Some(1),
					max: Some(600),
				},
			)],
		);
		schema.validate(config)
	}
}

/// Registry for the WalletConnect backend.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "walletconnect";
	type Factory = WalletFactory;

	fn factory() -> Self::Factory {
		create_walletconnect_wallet
	}
}

impl WalletRegistry for Registry {}

/// Factory function for creating WalletConnectWallet instances.
pub fn create_walletconnect_wallet(
	config: &toml::Value,
) -> Result<Box<dyn WalletInterface>, WalletError> {
	Ok(Box::new(WalletConnectWallet::new(config)?))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_missing_bridge_url_rejected() {
		let config: toml::Value = toml::from_str("timeout_seconds = 30").unwrap();
		assert!(WalletConnectWallet::new(&config).is_err());
	}

	#[test]
	fn test_bridge_url_normalized() {
		let config: toml::Value =
			toml::from_str(r#"bridge_url = "https://bridge.example.org/""#).unwrap();
		let wallet = WalletConnectWallet::new(&config).unwrap();
		assert_eq!(wallet.bridge_url, "https://bridge.example.org");
	}

	#[tokio::test]
	async fn test_unreachable_bridge() {
		let config: toml::Value = toml::from_str(
			r#"
			bridge_url = "http://192.0.2.1:1"
			timeout_seconds = 1
		"#,
		)
		.unwrap();
		let wallet = WalletConnectWallet::new(&config).unwrap();
		let err = wallet.connect(None).await.unwrap_err();
		assert!(matches!(err, WalletError::ProviderUnavailable(_)));
	}
}
