//! Mock relay backend for development and testing.
//!
//! Serves deterministic per-byte quotes and an in-memory balance ledger so
//! coordinator flows can run without a live node. Failure modes for the
//! pre-flight and readiness calls can be switched on through configuration.

use crate::{RelayError, RelayFactory, RelayInterface, RelayRegistry};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use uploader_types::{
	default_currencies, Address, ConfigSchema, Field, FieldType, FundReceipt,
	ImplementationRegistry, Schema, UploadReceipt, ValidationError, WithdrawReceipt,
};

/// Default price per byte in atomic units.
const DEFAULT_PRICE_PER_BYTE: &str = "10";

/// Mock relay backend with fixed pricing and an in-memory ledger.
pub struct MockRelay {
	/// Currencies the mock node accepts.
	currencies: HashSet<String>,
	/// Price per byte in atomic units, per currency.
	price_per_byte: HashMap<String, Decimal>,
	/// Relay-side balances keyed by (currency, address).
	balances: Mutex<HashMap<(String, String), Decimal>>,
	/// Monotonic id source for receipts.
	next_id: AtomicU64,
	/// When set, the pre-flight capability check fails as unreachable.
	fail_preflight: bool,
	/// When set, session establishment fails after a passing pre-flight.
	fail_ready: bool,
}

impl MockRelay {
	/// Creates a new MockRelay instance with configuration.
	pub fn new(config: &toml::Value) -> Result<Self, RelayError> {
		let schema = MockRelaySchema;
		schema.validate(config).map_err(|e| {
			RelayError::InvalidResponse(format!("Configuration validation failed: {e}"))
		})?;

		let currencies: HashSet<String> = match config.get("currencies").and_then(|v| v.as_array())
		{
			Some(list) => list
				.iter()
				.filter_map(|v| v.as_str())
				.map(|s| s.to_lowercase())
				.collect(),
			None => default_currencies().into_keys().collect(),
		};

		let default_price = Decimal::from_str(DEFAULT_PRICE_PER_BYTE)
			.map_err(|e| RelayError::InvalidResponse(format!("Bad default price: {e}")))?;
		let mut price_per_byte: HashMap<String, Decimal> = currencies
			.iter()
			.map(|c| (c.clone(), default_price))
			.collect();

		// Per-currency overrides
		if let Some(prices) = config.get("price_per_byte").and_then(|v| v.as_table()) {
			for (currency, price) in prices {
				if let Some(price_str) = price.as_str() {
					let parsed = Decimal::from_str(price_str).map_err(|e| {
						RelayError::InvalidResponse(format!(
							"Bad price for {currency}: {e}"
						))
					})?;
					price_per_byte.insert(currency.to_lowercase(), parsed);
				}
			}
		}

		let fail_preflight = config
			.get("fail_preflight")
			.and_then(|v| v.as_bool())
			.unwrap_or(false);
		let fail_ready = config
			.get("fail_ready")
			.and_then(|v| v.as_bool())
			.unwrap_or(false);

		Ok(Self {
			currencies,
			price_per_byte,
			balances: Mutex::new(HashMap::new()),
			next_id: AtomicU64::new(1),
			fail_preflight,
			fail_ready,
		})
	}

	fn check_currency(&self, currency: &str) -> Result<(), RelayError> {
		if self.currencies.contains(currency) {
			Ok(())
		} else {
			Err(RelayError::UnsupportedCurrency(currency.to_string()))
		}
	}

	fn parse_amount(amount: &str) -> Result<Decimal, RelayError> {
		Decimal::from_str(amount)
			.map_err(|e| RelayError::InvalidResponse(format!("Bad amount '{amount}': {e}")))
	}

	fn fresh_id(&self, prefix: &str) -> String {
		format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::Relaxed))
	}

	fn ledger(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), Decimal>> {
		self.balances.lock().unwrap_or_else(|e| e.into_inner())
	}
}

#[async_trait]
impl RelayInterface for MockRelay {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MockRelaySchema)
	}

	async fn bundler_address(&self, currency: &str) -> Result<Address, RelayError> {
		if self.fail_preflight {
			return Err(RelayError::EndpointInvalid("mock node offline".to_string()));
		}
		self.check_currency(currency)?;
		Ok(Address::new(format!("mock-bundler-{currency}")))
	}

	async fn ready(&self, currency: &str) -> Result<(), RelayError> {
		if self.fail_ready {
			return Err(RelayError::Network("mock ready failure".to_string()));
		}
		self.check_currency(currency)
	}

	async fn balance(&self, currency: &str, address: &Address) -> Result<String, RelayError> {
		self.check_currency(currency)?;
		let key = (currency.to_string(), address.to_string());
		let balance = self.ledger().get(&key).copied().unwrap_or(Decimal::ZERO);
		Ok(balance.to_string())
	}

	async fn price(&self, currency: &str, byte_length: u64) -> Result<String, RelayError> {
		self.check_currency(currency)?;
		let per_byte = self
			.price_per_byte
			.get(currency)
			.copied()
			.unwrap_or(Decimal::ZERO);
		Ok((per_byte * Decimal::from(byte_length)).to_string())
	}

	async fn upload(
		&self,
		currency: &str,
		data: Vec<u8>,
		_content_type: &str,
	) -> Result<UploadReceipt, RelayError> {
		self.check_currency(currency)?;
		if data.is_empty() {
			return Err(RelayError::OperationFailed {
				status: 400,
				message: "empty payload".to_string(),
			});
		}
		Ok(UploadReceipt {
			id: self.fresh_id("upload"),
			status: 200,
		})
	}

	async fn fund(
		&self,
		currency: &str,
		address: &Address,
		amount: &str,
	) -> Result<FundReceipt, RelayError> {
		self.check_currency(currency)?;
		let parsed = Self::parse_amount(amount)?;
		let key = (currency.to_string(), address.to_string());
		*self.ledger().entry(key).or_insert(Decimal::ZERO) += parsed;
		Ok(FundReceipt {
			target: Address::new(format!("mock-bundler-{currency}")),
			id: self.fresh_id("fund"),
		})
	}

	async fn withdraw(
		&self,
		currency: &str,
		address: &Address,
		amount: &str,
	) -> Result<WithdrawReceipt, RelayError> {
		self.check_currency(currency)?;
		let parsed = Self::parse_amount(amount)?;
		let key = (currency.to_string(), address.to_string());
		let mut ledger = self.ledger();
		let balance = ledger.entry(key).or_insert(Decimal::ZERO);
		if *balance < parsed {
			return Err(RelayError::OperationFailed {
				status: 402,
				message: format!("balance {balance} is below withdrawal {parsed}"),
			});
		}
		*balance -= parsed;
		Ok(WithdrawReceipt {
			tx_id: self.fresh_id("withdraw"),
		})
	}
}

/// Configuration schema for the mock relay backend.
pub struct MockRelaySchema;

impl ConfigSchema for MockRelaySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![
				Field::new("currencies", FieldType::Array(Box::new(FieldType::String))),
				Field::new("fail_preflight", FieldType::Boolean),
				Field::new("fail_ready", FieldType::Boolean),
			],
		);
		schema.validate(config)?;

		// price_per_byte is a free-form table of decimal strings.
		if let Some(prices) = config.get("price_per_byte") {
			let table = prices
				.as_table()
				.ok_or_else(|| ValidationError::TypeMismatch {
					field: "price_per_byte".to_string(),
					expected: "table".to_string(),
					actual: prices.type_str().to_string(),
				})?;
			for (currency, price) in table {
				let price_str =
					price
						.as_str()
						.ok_or_else(|| ValidationError::TypeMismatch {
							field: format!("price_per_byte.{currency}"),
							expected: "string".to_string(),
							actual: price.type_str().to_string(),
						})?;
				Decimal::from_str(price_str).map_err(|e| ValidationError::InvalidValue {
					field: format!("price_per_byte.{currency}"),
					message: format!("not a decimal: {e}"),
				})?;
			}
		}

		Ok(())
	}
}

/// Registry for the mock relay backend.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "mock";
	type Factory = RelayFactory;

	fn factory() -> Self::Factory {
		create_mock_relay
	}
}

impl RelayRegistry for Registry {}

/// Factory function for creating MockRelay instances.
///
/// The endpoint is accepted for signature parity with real backends but the
/// mock never dials it.
pub fn create_mock_relay(
	_endpoint: &str,
	config: &toml::Value,
) -> Result<Box<dyn RelayInterface>, RelayError> {
	Ok(Box::new(MockRelay::new(config)?))
}
