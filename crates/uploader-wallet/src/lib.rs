//! Wallet provider module for the uploader service.
//!
//! This module defines the interface to external wallet providers and manages
//! the set of configured backends. Each backend talks to one kind of signer
//! surface: an injected EVM provider, a WalletConnect bridge, or Phantom.
//! Establishing a connection yields the signing address and, for EVM
//! providers, the chain the wallet is currently on.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use uploader_types::{Address, ChainOptions, ConfigSchema, ImplementationRegistry, ProviderKind};

pub mod implementations {
	pub mod injected;
	pub mod phantom;
	pub mod walletconnect;
}

/// Errors that can occur during wallet operations.
#[derive(Debug, Error)]
pub enum WalletError {
	/// The provider surface is not present or not reachable.
	#[error("Provider unavailable: {0}")]
	ProviderUnavailable(String),
	/// The user declined the connection or chain-switch prompt.
	#[error("User rejected the request")]
	UserRejected,
	/// The wallet could not be moved to the requested chain.
	#[error("Chain switch to {chain_id} failed: {reason}")]
	ChainSwitchFailed { chain_id: u64, reason: String },
	/// The connection attempt failed for a transport or protocol reason.
	#[error("Connection error: {0}")]
	Connection(String),
	/// The provider returned a response that could not be interpreted.
	#[error("Invalid provider response: {0}")]
	InvalidResponse(String),
}

/// An established wallet connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletConnection {
	/// The signing address reported by the provider.
	pub address: Address,
	/// The chain the wallet is on, absent for non-EVM providers.
	pub chain_id: Option<u64>,
}

/// Trait defining the interface for wallet backends.
///
/// This trait must be implemented by all wallet backends. Connecting may
/// prompt the user, so implementations should treat `connect` as a slow call.
#[async_trait]
#[cfg_attr(feature = "testing", mockall::automock)]
pub trait WalletInterface: Send + Sync {
	/// Returns the configuration schema for this backend.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// The provider kind this backend serves.
	fn kind(&self) -> ProviderKind;

	/// Establishes a connection, negotiating the given chain when present.
	///
	/// EVM backends must end up on `chain.chain_id` or fail with
	/// [`WalletError::ChainSwitchFailed`]. Backends without chain semantics
	/// ignore the argument.
	async fn connect(&self, chain: Option<&ChainOptions>) -> Result<WalletConnection, WalletError>;

	/// Tears down the provider-side session, if the backend has one.
	async fn disconnect(&self) -> Result<(), WalletError>;
}

/// Type alias for wallet factory functions.
pub type WalletFactory = fn(&toml::Value) -> Result<Box<dyn WalletInterface>, WalletError>;

/// Registry trait for wallet backends.
pub trait WalletRegistry: ImplementationRegistry<Factory = WalletFactory> {}

/// Get all registered wallet implementations.
pub fn get_all_implementations() -> Vec<(&'static str, WalletFactory)> {
	vec![
		(
			implementations::injected::Registry::NAME,
			implementations::injected::Registry::factory(),
		),
		(
			implementations::walletconnect::Registry::NAME,
			implementations::walletconnect::Registry::factory(),
		),
		(
			implementations::phantom::Registry::NAME,
			implementations::phantom::Registry::factory(),
		),
	]
}

/// Service managing the configured wallet backends.
///
/// Backends are keyed by provider kind. Connection requests are routed to the
/// backend serving the requested kind.
pub struct WalletService {
	implementations: HashMap<ProviderKind, Box<dyn WalletInterface>>,
}

impl WalletService {
	/// Creates a new WalletService from the given backends.
	pub fn new(implementations: HashMap<ProviderKind, Box<dyn WalletInterface>>) -> Self {
		Self { implementations }
	}

	/// The provider kinds this service can connect through.
	pub fn kinds(&self) -> Vec<ProviderKind> {
		self.implementations.keys().copied().collect()
	}

	/// Whether a backend is configured for the given kind.
	pub fn supports(&self, kind: ProviderKind) -> bool {
		self.implementations.contains_key(&kind)
	}

	/// Connects through the backend serving the given kind.
	pub async fn connect(
		&self,
		kind: ProviderKind,
		chain: Option<&ChainOptions>,
	) -> Result<WalletConnection, WalletError> {
		let implementation = self.implementations.get(&kind).ok_or_else(|| {
			WalletError::ProviderUnavailable(format!("No backend configured for {kind}"))
		})?;
		implementation.connect(chain).await
	}

	/// Disconnects the backend serving the given kind.
	pub async fn disconnect(&self, kind: ProviderKind) -> Result<(), WalletError> {
		let implementation = self.implementations.get(&kind).ok_or_else(|| {
			WalletError::ProviderUnavailable(format!("No backend configured for {kind}"))
		})?;
		implementation.disconnect().await
	}
}
