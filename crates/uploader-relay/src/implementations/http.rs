//! HTTP relay backend for production use.
//!
//! Talks to a bundler node's REST surface: `/info` for the capability
//! pre-flight, `/price/{currency}/{bytes}` for quotes, `/tx/{currency}` for
//! uploads, and the `/account` endpoints for balance, funding, and
//! withdrawal.

use crate::{RelayError, RelayFactory, RelayInterface, RelayRegistry};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use uploader_types::{
	Address, ConfigSchema, Field, FieldType, FundReceipt, ImplementationRegistry, Schema,
	UploadReceipt, ValidationError, WithdrawReceipt,
};

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// HTTP relay backend bound to one node endpoint.
pub struct HttpRelay {
	/// HTTP client for node requests.
	client: Client,
	/// Node base URL without a trailing slash.
	base_url: String,
}

/// Node info response carrying the per-currency receiving addresses.
#[derive(Debug, Deserialize)]
struct NodeInfo {
	#[allow(dead_code)]
	version: Option<String>,
	addresses: HashMap<String, String>,
}

/// Balance response for an account.
#[derive(Debug, Deserialize)]
struct BalanceResponse {
	balance: String,
}

/// Upload response carrying the stored item id.
#[derive(Debug, Deserialize)]
struct UploadResponse {
	id: String,
}

/// Funding response.
#[derive(Debug, Deserialize)]
struct FundResponse {
	target: String,
	id: String,
}

/// Withdrawal response.
#[derive(Debug, Deserialize)]
struct WithdrawResponse {
	tx_id: String,
}

impl HttpRelay {
	/// Creates a new HttpRelay for the given endpoint with configuration.
	pub fn new(endpoint: &str, config: &toml::Value) -> Result<Self, RelayError> {
		let schema = HttpRelaySchema;
		schema.validate(config).map_err(|e| {
			RelayError::InvalidResponse(format!("Configuration validation failed: {e}"))
		})?;

		let timeout_seconds = config
			.get("timeout_seconds")
			.and_then(|v| v.as_integer())
			.unwrap_or(DEFAULT_TIMEOUT_SECONDS as i64) as u64;

		let client = Client::builder()
			.timeout(Duration::from_secs(timeout_seconds))
			.build()
			.map_err(|e| RelayError::Network(format!("Failed to create HTTP client: {e}")))?;

		let base_url = endpoint.trim_end_matches('/').to_string();
		debug!("HTTP relay initialized - endpoint: {}", base_url);

		Ok(Self { client, base_url })
	}

	/// Fetches `/info`, mapping unreachability to an endpoint error.
	async fn node_info(&self) -> Result<NodeInfo, RelayError> {
		let url = format!("{}/info", self.base_url);
		let response = self
			.client
			.get(&url)
			.send()
			.await
			.map_err(|e| RelayError::EndpointInvalid(format!("{}: {e}", self.base_url)))?;

		if !response.status().is_success() {
			return Err(RelayError::EndpointInvalid(format!(
				"{} answered status {}",
				self.base_url,
				response.status()
			)));
		}

		response
			.json::<NodeInfo>()
			.await
			.map_err(|e| RelayError::InvalidResponse(format!("Failed to parse node info: {e}")))
	}

	/// Maps a non-success response to an operation failure with its body.
	async fn operation_failure(response: reqwest::Response) -> RelayError {
		let status = response.status().as_u16();
		let message = response.text().await.unwrap_or_default();
		RelayError::OperationFailed { status, message }
	}
}

#[async_trait]
impl RelayInterface for HttpRelay {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(HttpRelaySchema)
	}

	async fn bundler_address(&self, currency: &str) -> Result<Address, RelayError> {
		let info = self.node_info().await?;
		info.addresses
			.get(currency)
			.map(|addr| Address::new(addr.clone()))
			.ok_or_else(|| RelayError::UnsupportedCurrency(currency.to_string()))
	}

	async fn ready(&self, currency: &str) -> Result<(), RelayError> {
		// Session establishment is a second round trip so a node that
		// dropped between pre-flight and ready is still reported.
		let info = self.node_info().await?;
		if !info.addresses.contains_key(currency) {
			return Err(RelayError::UnsupportedCurrency(currency.to_string()));
		}
		Ok(())
	}

	async fn balance(&self, currency: &str, address: &Address) -> Result<String, RelayError> {
		let url = format!(
			"{}/account/balance/{currency}?address={}",
			self.base_url, address
		);
		let response = self
			.client
			.get(&url)
			.send()
			.await
			.map_err(|e| RelayError::Network(format!("Balance request failed: {e}")))?;

		if !response.status().is_success() {
			return Err(Self::operation_failure(response).await);
		}

		let body: BalanceResponse = response
			.json()
			.await
			.map_err(|e| RelayError::InvalidResponse(format!("Failed to parse balance: {e}")))?;
		Ok(body.balance)
	}

	async fn price(&self, currency: &str, byte_length: u64) -> Result<String, RelayError> {
		let url = format!("{}/price/{currency}/{byte_length}", self.base_url);
		let response = self
			.client
			.get(&url)
			.send()
			.await
			.map_err(|e| RelayError::Network(format!("Price request failed: {e}")))?;

		if !response.status().is_success() {
			return Err(Self::operation_failure(response).await);
		}

		// The node answers with a bare atomic amount.
		let text = response
			.text()
			.await
			.map_err(|e| RelayError::InvalidResponse(format!("Failed to read price: {e}")))?;
		let trimmed = text.trim();
		if trimmed.is_empty() || trimmed.parse::<f64>().is_err() {
			return Err(RelayError::InvalidResponse(format!(
				"Price is not numeric: {trimmed}"
			)));
		}
		Ok(trimmed.to_string())
	}

	async fn upload(
		&self,
		currency: &str,
		data: Vec<u8>,
		content_type: &str,
	) -> Result<UploadReceipt, RelayError> {
		let url = format!("{}/tx/{currency}", self.base_url);
		debug!("Uploading {} bytes to {}", data.len(), url);

		let response = self
			.client
			.post(&url)
			.header(reqwest::header::CONTENT_TYPE, content_type)
			.body(data)
			.send()
			.await
			.map_err(|e| RelayError::Network(format!("Upload request failed: {e}")))?;

		let status = response.status().as_u16();
		if !response.status().is_success() {
			return Err(Self::operation_failure(response).await);
		}

		let body: UploadResponse = response
			.json()
			.await
			.map_err(|e| RelayError::InvalidResponse(format!("Failed to parse upload: {e}")))?;
		Ok(UploadReceipt {
			id: body.id,
			status,
		})
	}

	async fn fund(
		&self,
		currency: &str,
		address: &Address,
		amount: &str,
	) -> Result<FundReceipt, RelayError> {
		let url = format!("{}/account/fund/{currency}", self.base_url);
		let response = self
			.client
			.post(&url)
			.json(&serde_json::json!({ "address": address, "amount": amount }))
			.send()
			.await
			.map_err(|e| RelayError::Network(format!("Fund request failed: {e}")))?;

		if !response.status().is_success() {
			return Err(Self::operation_failure(response).await);
		}

		let body: FundResponse = response
			.json()
			.await
			.map_err(|e| RelayError::InvalidResponse(format!("Failed to parse fund: {e}")))?;
		Ok(FundReceipt {
			target: Address::new(body.target),
			id: body.id,
		})
	}

	async fn withdraw(
		&self,
		currency: &str,
		address: &Address,
		amount: &str,
	) -> Result<WithdrawReceipt, RelayError> {
		let url = format!("{}/account/withdraw", self.base_url);
		let response = self
			.client
			.post(&url)
			.json(&serde_json::json!({
				"currency": currency,
				"address": address,
				"amount": amount,
			}))
			.send()
			.await
			.map_err(|e| RelayError::Network(format!("Withdraw request failed: {e}")))?;

		if !response.status().is_success() {
			return Err(Self::operation_failure(response).await);
		}

		let body: WithdrawResponse = response
			.json()
			.await
			.map_err(|e| RelayError::InvalidResponse(format!("Failed to parse withdraw: {e}")))?;
		Ok(WithdrawReceipt { tx_id: body.tx_id })
	}
}

/// Configuration schema for the HTTP relay backend.
pub struct HttpRelaySchema;

impl ConfigSchema for HttpRelaySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
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

/// Registry for the HTTP relay backend.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "http";
	type Factory = RelayFactory;

	fn factory() -> Self::Factory {
		create_http_relay
	}
}

impl RelayRegistry for Registry {}

/// Factory function for creating HttpRelay instances.
pub fn create_http_relay(
	endpoint: &str,
	config: &toml::Value,
) -> Result<Box<dyn RelayInterface>, RelayError> {
	Ok(Box::new(HttpRelay::new(endpoint, config)?))
}
