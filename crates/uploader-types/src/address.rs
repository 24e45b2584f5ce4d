//! Account address representation.
//!
//! Addresses are kept in their native string form because the uploader spans
//! chains with incompatible encodings (hex for EVM chains, base58 for
//! Solana). Parsing or checksumming is left to the wallet that produced the
//! address.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An account address in its chain-native string encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub String);

impl Address {
	/// Creates an address from any string-like value.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the address as a string slice.
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Returns true if the address carries no characters.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl fmt::Display for Address {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for Address {
	fn from(value: &str) -> Self {
		Self(value.to_string())
	}
}

impl From<String> for Address {
	fn from(value: String) -> Self {
		Self(value)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_address_display_and_accessors() {
		let addr = Address::new("0xabc123");
		assert_eq!(addr.to_string(), "0xabc123");
		assert_eq!(addr.as_str(), "0xabc123");
		assert!(!addr.is_empty());
		assert!(Address::new("").is_empty());
	}

	#[test]
	fn test_address_serde_transparent() {
		let addr = Address::new("9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin");
		let json = serde_json::to_string(&addr).unwrap();
		assert_eq!(json, "\"9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin\"");

		let back: Address = serde_json::from_str(&json).unwrap();
		assert_eq!(back, addr);
	}
}
