//! Relay network client module for the bundle uploader system.
//!
//! This module handles communication with a bundled-storage relay node:
//! the pre-flight capability check, session readiness, balance queries,
//! per-byte price quotes, uploads, funding, and withdrawals. It provides
//! abstractions over different relay backends so the coordinator never
//! talks to a node directly.

use async_trait::async_trait;
use thiserror::Error;
use uploader_types::{
	Address, ConfigSchema, FundReceipt, ImplementationRegistry, UploadReceipt, WithdrawReceipt,
};

/// Re-export implementations
pub mod implementations {
	pub mod http;
	pub mod mock;
}

/// Errors that can occur during relay operations.
#[derive(Debug, Error)]
pub enum RelayError {
	/// The configured endpoint is not a reachable relay node.
	#[error("Relay endpoint invalid: {0}")]
	EndpointInvalid(String),
	/// The node is reachable but does not accept the requested currency.
	#[error("Relay does not support currency: {0}")]
	UnsupportedCurrency(String),
	/// Error during network communication with the node.
	#[error("Network error: {0}")]
	Network(String),
	/// The node answered an operation with a non-success status.
	#[error("Relay operation failed with status {status}: {message}")]
	OperationFailed { status: u16, message: String },
	/// The node answered with data the client could not interpret.
	#[error("Invalid relay response: {0}")]
	InvalidResponse(String),
}

/// Trait defining the interface for relay backends.
///
/// The `bundler_address` call doubles as the pre-flight capability check: it
/// must succeed for the active currency before a session is considered
/// establishable. `ready` completes session establishment and is a reported
/// failure when it does not succeed.
#[async_trait]
#[cfg_attr(feature = "testing", mockall::automock)]
pub trait RelayInterface: Send + Sync {
	/// Returns the configuration schema for this relay backend.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Resolves the node's receiving address for a currency.
	///
	/// Fails with [`RelayError::EndpointInvalid`] when the node is
	/// unreachable and [`RelayError::UnsupportedCurrency`] when the node
	/// does not carry the currency.
	async fn bundler_address(&self, currency: &str) -> Result<Address, RelayError>;

	/// Completes session establishment for a currency.
	async fn ready(&self, currency: &str) -> Result<(), RelayError>;

	/// Queries the relay-side balance of an account.
	///
	/// Returns the balance in the currency's atomic unit as a decimal string.
	async fn balance(&self, currency: &str, address: &Address) -> Result<String, RelayError>;

	/// Quotes the upload price for a payload of the given byte length.
	async fn price(&self, currency: &str, byte_length: u64) -> Result<String, RelayError>;

	/// Uploads a payload with its content type tag.
	async fn upload(
		&self,
		currency: &str,
		data: Vec<u8>,
		content_type: &str,
	) -> Result<UploadReceipt, RelayError>;

	/// Transfers funds from the connected account into its relay balance.
	async fn fund(
		&self,
		currency: &str,
		address: &Address,
		amount: &str,
	) -> Result<FundReceipt, RelayError>;

	/// Withdraws funds from the relay balance back to the connected account.
	async fn withdraw(
		&self,
		currency: &str,
		address: &Address,
		amount: &str,
	) -> Result<WithdrawReceipt, RelayError>;
}

/// Type alias for relay factory functions.
///
/// This is the function signature that all relay backends must provide to
/// create instances of their relay interface. The endpoint comes first so a
/// coordinator can construct sessions for user-supplied endpoints.
pub type RelayFactory = fn(&str, &toml::Value) -> Result<Box<dyn RelayInterface>, RelayError>;

/// Registry trait for relay backends.
pub trait RelayRegistry: ImplementationRegistry<Factory = RelayFactory> {}

/// Get all registered relay backends.
///
/// Returns a vector of (name, factory) tuples for all available relay
/// backends, used for configuration-driven construction.
pub fn get_all_implementations() -> Vec<(&'static str, RelayFactory)> {
	use implementations::{http, mock};

	vec![
		(http::Registry::NAME, http::Registry::factory()),
		(mock::Registry::NAME, mock::Registry::factory()),
	]
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_relay_error_display() {
		let err = RelayError::EndpointInvalid("https://nowhere".to_string());
		assert_eq!(err.to_string(), "Relay endpoint invalid: https://nowhere");

		let err = RelayError::UnsupportedCurrency("doge".to_string());
		assert_eq!(err.to_string(), "Relay does not support currency: doge");

		let err = RelayError::OperationFailed {
			status: 402,
			message: "insufficient balance".to_string(),
		};
		assert_eq!(
			err.to_string(),
			"Relay operation failed with status 402: insufficient balance"
		);
	}

	#[test]
	fn test_get_all_implementations_names() {
		let impls = get_all_implementations();
		let names: Vec<&str> = impls.iter().map(|(name, _)| *name).collect();
		assert!(names.contains(&"http"));
		assert!(names.contains(&"mock"));
	}
}
