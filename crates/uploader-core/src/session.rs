//! Session data carried by the coordinator.

use uploader_types::{Address, ProviderKind};

/// A live wallet connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
	/// The currency the connection was established for.
	pub currency: String,
	/// The provider that produced the connection.
	pub provider: ProviderKind,
	/// The signing address.
	pub address: Address,
	/// The chain the wallet ended up on, absent for non-EVM providers.
	pub chain_id: Option<u64>,
}

/// A relay session layered on top of a wallet connection.
///
/// Only valid while the underlying connection is alive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySession {
	/// The relay node endpoint the session was established against.
	pub endpoint: String,
	/// The account address on the relay network.
	pub address: Address,
	/// The node's receiving address for the active currency.
	pub bundler_address: Address,
}

/// A file staged for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFile {
	/// File name, used for logging only.
	pub name: String,
	/// MIME type sent with the upload.
	pub content_type: String,
	/// Raw file bytes.
	pub bytes: Vec<u8>,
}

impl PendingFile {
	/// The payload size the relay prices against.
	pub fn byte_length(&self) -> u64 {
		self.bytes.len() as u64
	}
}
