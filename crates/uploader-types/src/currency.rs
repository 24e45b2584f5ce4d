//! Currency and chain configuration types.
//!
//! A currency is an asset the relay network accepts payment in. Each currency
//! names the wallet providers able to connect for it and, for EVM assets, the
//! chain parameters a wallet must be switched to before a connection counts
//! as established. Solana-style currencies carry no chain options.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// The connection methods a wallet can be reached through.
///
/// Dispatch over providers is exhaustive: adding a variant forces every
/// `match` over provider behavior to be revisited at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
	/// A browser-injected EVM wallet reachable over its RPC surface.
	Injected,
	/// A WalletConnect bridge session.
	WalletConnect,
	/// The Phantom Solana wallet adapter.
	Phantom,
}

impl ProviderKind {
	/// All known provider kinds, in display order.
	pub fn all() -> [ProviderKind; 3] {
		[
			ProviderKind::Injected,
			ProviderKind::WalletConnect,
			ProviderKind::Phantom,
		]
	}

	/// The canonical lowercase name used in configuration tables.
	pub fn as_str(&self) -> &'static str {
		match self {
			ProviderKind::Injected => "injected",
			ProviderKind::WalletConnect => "walletconnect",
			ProviderKind::Phantom => "phantom",
		}
	}
}

impl fmt::Display for ProviderKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ProviderKind {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"injected" => Ok(ProviderKind::Injected),
			"walletconnect" => Ok(ProviderKind::WalletConnect),
			"phantom" => Ok(ProviderKind::Phantom),
			other => Err(format!("unknown provider kind: {other}")),
		}
	}
}

/// Chain parameters a wallet must be on before connecting for a currency.
///
/// These mirror the fields of an EIP-3085 `wallet_addEthereumChain` request
/// so a wallet that lacks the chain can be asked to add it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainOptions {
	/// Numeric chain id (e.g. 137 for Polygon mainnet).
	pub chain_id: u64,
	/// Human-readable chain name shown by wallets during a chain-add prompt.
	pub chain_name: String,
	/// Public RPC endpoints handed to the wallet for a chain-add.
	pub rpc_urls: Vec<String>,
}

impl ChainOptions {
	/// The chain id in the `0x`-prefixed hex form wallet RPCs expect.
	pub fn hex_chain_id(&self) -> String {
		format!("0x{:x}", self.chain_id)
	}
}

/// Configuration for a single currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyConfig {
	/// Wallet providers able to connect for this currency.
	pub providers: Vec<ProviderKind>,
	/// Chain parameters, absent for non-EVM currencies.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub chain: Option<ChainOptions>,
}

impl CurrencyConfig {
	/// Returns true if the given provider may connect for this currency.
	pub fn supports(&self, kind: ProviderKind) -> bool {
		self.providers.contains(&kind)
	}
}

/// Currencies configuration mapping lowercase symbols to their settings.
pub type CurrenciesConfig = HashMap<String, CurrencyConfig>;

fn evm_currency(chain_id: u64, chain_name: &str, rpc_url: &str) -> CurrencyConfig {
	CurrencyConfig {
		providers: vec![ProviderKind::Injected, ProviderKind::WalletConnect],
		chain: Some(ChainOptions {
			chain_id,
			chain_name: chain_name.to_string(),
			rpc_urls: vec![rpc_url.to_string()],
		}),
	}
}

/// The built-in currency set, used when a configuration file supplies none.
pub fn default_currencies() -> CurrenciesConfig {
	let mut currencies = HashMap::new();
	currencies.insert(
		"solana".to_string(),
		CurrencyConfig {
			providers: vec![ProviderKind::Phantom],
			chain: None,
		},
	);
	currencies.insert(
		"matic".to_string(),
		evm_currency(137, "Polygon Mainnet", "https://polygon-rpc.com"),
	);
	currencies.insert(
		"arbitrum".to_string(),
		evm_currency(42161, "Arbitrum One", "https://arb1.arbitrum.io/rpc"),
	);
	currencies.insert(
		"bnb".to_string(),
		evm_currency(56, "Binance Smart Chain", "https://bsc-dataseed.binance.org/"),
	);
	currencies.insert(
		"avalanche".to_string(),
		evm_currency(
			43114,
			"Avalanche Network",
			"https://api.avax.network/ext/bc/C/rpc",
		),
	);
	currencies.insert(
		"boba".to_string(),
		evm_currency(288, "BOBA L2", "https://mainnet.boba.network"),
	);
	currencies
}
