//! Injected EVM wallet backend.
//!
//! Talks EIP-1193 style JSON-RPC to an injected provider exposed over HTTP.
//! Connecting requests the account list, reads the current chain, and when a
//! target chain is configured negotiates it: a `wallet_switchEthereumChain`
//! first, and on the unrecognized-chain error a `wallet_addEthereumChain`
//! carrying the full chain parameters before retrying the switch.

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

/// Default timeout for provider requests in seconds.
const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

/// EIP-1193 error code for a user-rejected request.
const CODE_USER_REJECTED: i64 = 4001;
/// EIP-1193 error code for a chain the wallet does not know.
const CODE_UNRECOGNIZED_CHAIN: i64 = 4902;

#[derive(Debug, Deserialize)]
struct RpcResponse {
	result: Option<serde_json::Value>,
	error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
	code: i64,
	message: String,
}

/// Failure of a single provider request, before mapping to [`WalletError`].
#[derive(Debug)]
enum RpcFailure {
	/// The provider could not be reached or answered garbage.
	Transport(WalletError),
	/// The provider answered with a JSON-RPC error object.
	Provider { code: i64, message: String },
}

impl RpcFailure {
	fn into_wallet_error(self, method: &str) -> WalletError {
		match self {
			RpcFailure::Transport(e) => e,
			RpcFailure::Provider { code, message } => {
				if code == CODE_USER_REJECTED {
					WalletError::UserRejected
				} else {
					WalletError::Connection(format!(
						"{method} failed with code {code}: {message}"
					))
				}
			},
		}
	}
}

/// Injected EVM wallet backend speaking JSON-RPC over HTTP.
pub struct InjectedWallet {
	client: reqwest::Client,
	rpc_url: String,
}

impl InjectedWallet {
	/// Creates a new InjectedWallet instance with configuration.
	pub fn new(config: &toml::Value) -> Result<Self, WalletError> {
		let schema = InjectedWalletSchema;
		schema.validate(config).map_err(|e| {
			WalletError::Connection(format!("Configuration validation failed: {e}"))
		})?;

		let rpc_url = config
			.get("rpc_url")
			.and_then(|v| v.as_str())
			.ok_or_else(|| WalletError::Connection("rpc_url is required".to_string()))?
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

		Ok(Self { client, rpc_url })
	}

	/// Sends a single JSON-RPC request to the provider.
	async fn rpc_raw(
		&self,
		method: &str,
		params: serde_json::Value,
	) -> Result<serde_json::Value, RpcFailure> {
		debug!(method, "sending provider request");
		let response = self
			.client
			.post(&self.rpc_url)
			.json(&json!({
				"jsonrpc": "2.0",
				"id": 1,
				"method": method,
				"params": params,
			}))
			.send()
			.await
			.map_err(|e| {
				RpcFailure::Transport(WalletError::ProviderUnavailable(format!("{method}: {e}")))
			})?;

		let body: RpcResponse = response.json().await.map_err(|e| {
			RpcFailure::Transport(WalletError::InvalidResponse(format!("{method}: {e}")))
		})?;

		if let Some(error) = body.error {
			return Err(RpcFailure::Provider {
				code: error.code,
				message: error.message,
			});
		}
		body.result.ok_or_else(|| {
			RpcFailure::Transport(WalletError::InvalidResponse(format!(
				"{method}: empty result"
			)))
		})
	}

	/// Like [`Self::rpc_raw`] but with provider errors mapped to [`WalletError`].
	async fn rpc(
		&self,
		method: &str,
		params: serde_json::Value,
	) -> Result<serde_json::Value, WalletError> {
		self.rpc_raw(method, params)
			.await
			.map_err(|e| e.into_wallet_error(method))
	}

	/// The chain the wallet is currently on.
	async fn current_chain(&self) -> Result<u64, WalletError> {
		let result = self.rpc("eth_chainId", json!([])).await?;
		let hex = result
			.as_str()
			.ok_or_else(|| WalletError::InvalidResponse("eth_chainId: not a string".to_string()))?;
		u64::from_str_radix(hex.trim_start_matches("0x"), 16)
			.map_err(|e| WalletError::InvalidResponse(format!("eth_chainId '{hex}': {e}")))
	}

	/// Moves the wallet onto the given chain.
	///
	/// A wallet that has never seen the chain answers the switch with code
	/// 4902; in that case the chain is added and the switch retried.
	async fn switch_chain(&self, chain: &ChainOptions) -> Result<(), WalletError> {
		let switch_params = json!([{ "chainId": chain.hex_chain_id() }]);
		match self
			.rpc_raw("wallet_switchEthereumChain", switch_params.clone())
			.await
		{
			Ok(_) => return Ok(()),
			Err(RpcFailure::Provider {
				code: CODE_UNRECOGNIZED_CHAIN,
				..
			}) => {
				debug!(chain_id = chain.chain_id, "chain unknown to wallet, adding it");
				self.rpc(
					"wallet_addEthereumChain",
					json!([{
						"chainId": chain.hex_chain_id(),
						"chainName": chain.chain_name,
						"rpcUrls": chain.rpc_urls,
					}]),
				)
				.await
				.map_err(|e| match e {
					WalletError::UserRejected => WalletError::UserRejected,
					other => WalletError::ChainSwitchFailed {
						chain_id: chain.chain_id,
						reason: other.to_string(),
					},
				})?;
				self.rpc("wallet_switchEthereumChain", switch_params)
					.await
					.map_err(|e| match e {
						WalletError::UserRejected => WalletError::UserRejected,
						other => WalletError::ChainSwitchFailed {
							chain_id: chain.chain_id,
							reason: other.to_string(),
						},
					})?;
				Ok(())
			},
			Err(RpcFailure::Provider {
				code: CODE_USER_REJECTED,
				..
			}) => Err(WalletError::UserRejected),
			Err(e) => Err(WalletError::ChainSwitchFailed {
				chain_id: chain.chain_id,
				reason: e.into_wallet_error("wallet_switchEthereumChain").to_string(),
			}),
		}
	}
}

#[async_trait]
impl WalletInterface for InjectedWallet {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(InjectedWalletSchema)
	}

	fn kind(&self) -> ProviderKind {
		ProviderKind::Injected
	}

	async fn connect(&self, chain: Option<&ChainOptions>) -> Result<WalletConnection, WalletError> {
		let accounts = self.rpc("eth_requestAccounts", json!([])).await?;
		let address = accounts
			.as_array()
			.and_then(|a| a.first())
			.and_then(|v| v.as_str())
			.ok_or_else(|| {
				WalletError::InvalidResponse("eth_requestAccounts: no accounts".to_string())
			})?
			.to_string();

		let mut chain_id = self.current_chain().await?;
		if let Some(target) = chain {
			if chain_id != target.chain_id {
				self.switch_chain(target).await?;
				chain_id = self.current_chain().await?;
				if chain_id != target.chain_id {
					return Err(WalletError::ChainSwitchFailed {
						chain_id: target.chain_id,
						reason: format!("wallet reports chain {chain_id} after switch"),
					});
				}
			}
		}

		Ok(WalletConnection {
			address: Address::new(address),
			chain_id: Some(chain_id),
		})
	}

	async fn disconnect(&self) -> Result<(), WalletError> {
		// Injected providers hold no server-side session to tear down.
		Ok(())
	}
}

/// Configuration schema for the injected wallet backend.
pub struct InjectedWalletSchema;

impl ConfigSchema for InjectedWalletSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("rpc_url", FieldType::String)],
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

/// Registry for the injected wallet backend.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "injected";
	type Factory = WalletFactory;

	fn factory() -> Self::Factory {
		create_injected_wallet
	}
}

impl WalletRegistry for Registry {}

/// Factory function for creating InjectedWallet instances.
pub fn create_injected_wallet(
	config: &toml::Value,
) -> Result<Box<dyn WalletInterface>, WalletError> {
	Ok(Box::new(InjectedWallet::new(config)?))
}
