//! Connection coordinator implementation.
//!
//! Mediates the currency -> provider -> connection -> relay-session
//! lifecycle so only valid combinations are connectable, and guarantees that
//! switching any upstream selection resets all downstream state. External
//! calls (wallet connect, relay handshake, balance, price, upload, fund,
//! withdraw) are suspend points: at most one call of each kind may be in
//! flight, and completions that arrive after the session has moved on are
//! discarded rather than committed.

use crate::session::{Connection, PendingFile, RelaySession};
use crate::state::SessionState;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, warn};
use uploader_relay::{RelayError, RelayInterface};
use uploader_types::{
	Address, ChainOptions, CurrenciesConfig, FundReceipt, ProviderKind, UploadReceipt,
	WithdrawReceipt,
};
use uploader_wallet::{WalletError, WalletService};

/// Minimum length of a usable relay endpoint URL.
const MIN_ENDPOINT_LENGTH: usize = 8;

/// Builds a relay backend for a given endpoint.
///
/// Injected at construction so the coordinator does not care which relay
/// implementation serves the session.
pub type RelayBuilder =
	Box<dyn Fn(&str) -> Result<Box<dyn RelayInterface>, RelayError> + Send + Sync>;

/// The kinds of external operations subject to single-flight discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
	Connect,
	ConnectRelay,
	Balance,
	Price,
	Upload,
	Fund,
	Withdraw,
}

impl fmt::Display for OpKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			OpKind::Connect => "connect",
			OpKind::ConnectRelay => "connect_relay",
			OpKind::Balance => "balance",
			OpKind::Price => "price",
			OpKind::Upload => "upload",
			OpKind::Fund => "fund",
			OpKind::Withdraw => "withdraw",
		};
		f.write_str(name)
	}
}

/// Errors that can occur during coordinator operations.
///
/// All of these are recoverable: the coordinator stays at its last valid
/// state and the caller may re-trigger the operation.
#[derive(Debug, Error)]
pub enum CoordinatorError {
	#[error("Unknown currency: {0}")]
	UnknownCurrency(String),
	#[error("No currency selected")]
	NoCurrencySelected,
	#[error("No provider selected")]
	NoProviderSelected,
	#[error("Provider {provider} is not compatible with currency {currency}")]
	IncompatibleProvider {
		currency: String,
		provider: ProviderKind,
	},
	#[error("No wallet connection")]
	NotConnected,
	#[error("No relay session")]
	NoRelaySession,
	#[error("No file selected")]
	NoFileSelected,
	#[error("Invalid amount: {0}")]
	InvalidAmount(String),
	#[error("A {0} operation is already in flight")]
	OperationInFlight(OpKind),
	#[error("Invalid state transition from {from} to {to}")]
	InvalidTransition {
		from: SessionState,
		to: SessionState,
	},
	#[error("Operation superseded by a session change")]
	Superseded,
	#[error("Wallet error: {0}")]
	Wallet(#[from] WalletError),
	#[error("Relay error: {0}")]
	Relay(#[from] RelayError),
}

/// Result of a [`Coordinator::connect`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
	/// A wallet connection was established.
	Connected { address: Address },
	/// A connection already existed, so the call disconnected instead.
	Disconnected,
	/// The session changed while the wallet call was in flight; its result
	/// was discarded.
	Superseded,
}

/// Mutable session state, guarded by the coordinator's mutex.
struct Inner {
	state: SessionState,
	currency: Option<String>,
	provider: Option<ProviderKind>,
	connection: Option<Connection>,
	relay_session: Option<RelaySession>,
	relay_client: Option<Arc<dyn RelayInterface>>,
	balance: Option<String>,
	price: Option<String>,
	file: Option<PendingFile>,
	in_flight: HashSet<OpKind>,
	/// Bumped whenever downstream state is cleared. An in-flight operation
	/// that observes a different epoch on completion discards its result.
	epoch: u64,
}

impl Inner {
	fn new() -> Self {
		Self {
			state: SessionState::Idle,
			currency: None,
			provider: None,
			connection: None,
			relay_session: None,
			relay_client: None,
			balance: None,
			price: None,
			file: None,
			in_flight: HashSet::new(),
			epoch: 0,
		}
	}

	/// Clears the connection and everything layered on it.
	fn clear_downstream(&mut self) {
		self.epoch += 1;
		self.connection = None;
		self.relay_session = None;
		self.relay_client = None;
		self.balance = None;
		self.price = None;
		self.file = None;
	}

	fn transition(&mut self, to: SessionState) -> Result<(), CoordinatorError> {
		if !SessionState::is_valid_transition(self.state, to) {
			return Err(CoordinatorError::InvalidTransition {
				from: self.state,
				to,
			});
		}
		debug!(from = %self.state, to = %to, "session transition");
		self.state = to;
		Ok(())
	}

	/// Marks an operation as in flight, rejecting re-entrant calls.
	fn begin(&mut self, op: OpKind) -> Result<(), CoordinatorError> {
		if !self.in_flight.insert(op) {
			return Err(CoordinatorError::OperationInFlight(op));
		}
		Ok(())
	}

	/// Structural invariants, checked after every mutation in debug builds.
	fn check(&self) {
		debug_assert!(
			self.relay_session.is_none() || self.connection.is_some(),
			"relay session without a connection"
		);
		debug_assert_eq!(self.relay_session.is_some(), self.relay_client.is_some());
		debug_assert_eq!(
			matches!(
				self.state,
				SessionState::Connected | SessionState::RelayConnected
			),
			self.connection.is_some()
		);
		debug_assert_eq!(
			self.state == SessionState::RelayConnected,
			self.relay_session.is_some()
		);
		debug_assert!(
			self.file.is_none() || self.relay_session.is_some(),
			"staged file without a relay session"
		);
	}
}

/// Clears the in-flight marker when an operation completes or is dropped.
struct Flight<'a> {
	inner: &'a Mutex<Inner>,
	op: OpKind,
}

impl Drop for Flight<'_> {
	fn drop(&mut self) {
		let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
		inner.in_flight.remove(&self.op);
	}
}

/// Mediates currency, provider, connection, and relay session state.
///
/// All methods take `&self`; the coordinator is safe to share behind an
/// `Arc` across tasks. The internal mutex is never held across an await.
pub struct Coordinator {
	currencies: CurrenciesConfig,
	wallets: WalletService,
	relay_builder: RelayBuilder,
	endpoint: String,
	inner: Mutex<Inner>,
}

impl fmt::Debug for Coordinator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Coordinator")
			.field("endpoint", &self.endpoint)
			.finish_non_exhaustive()
	}
}

impl Coordinator {
	/// Creates a new Coordinator.
	///
	/// `endpoint` is the configured relay endpoint; `connect` requires it to
	/// be nontrivial and `connect_relay` uses it when no override is given.
	pub fn new(
		currencies: CurrenciesConfig,
		wallets: WalletService,
		relay_builder: RelayBuilder,
		endpoint: impl Into<String>,
	) -> Self {
		Self {
			currencies,
			wallets,
			relay_builder,
			endpoint: endpoint.into(),
			inner: Mutex::new(Inner::new()),
		}
	}

	fn lock(&self) -> MutexGuard<'_, Inner> {
		self.inner.lock().unwrap_or_else(|e| e.into_inner())
	}

	/// The configured relay endpoint.
	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}

	/// Sets the active currency.
	///
	/// Clears any existing connection, relay session, balance, price, and
	/// staged file, and resets the provider selection.
	pub fn select_currency(&self, id: &str) -> Result<(), CoordinatorError> {
		if !self.currencies.contains_key(id) {
			return Err(CoordinatorError::UnknownCurrency(id.to_string()));
		}

		let mut inner = self.lock();
		inner.clear_downstream();
		inner.provider = None;
		inner.currency = Some(id.to_string());
		inner.transition(SessionState::CurrencySelected)?;
		inner.check();
		Ok(())
	}

	/// The providers compatible with the active currency.
	pub fn available_providers(&self) -> Result<Vec<ProviderKind>, CoordinatorError> {
		let inner = self.lock();
		let currency = inner
			.currency
			.as_deref()
			.ok_or(CoordinatorError::NoCurrencySelected)?;
		// select_currency validated membership, so the entry exists
		self.currencies
			.get(currency)
			.map(|c| c.providers.clone())
			.ok_or_else(|| CoordinatorError::UnknownCurrency(currency.to_string()))
	}

	/// Selects a provider for the active currency.
	///
	/// Rejected unless the provider is in the currency's compatible set.
	/// Selecting a provider while connected drops the connection.
	pub fn select_provider(&self, provider: ProviderKind) -> Result<(), CoordinatorError> {
		let mut inner = self.lock();
		let currency = inner
			.currency
			.clone()
			.ok_or(CoordinatorError::NoCurrencySelected)?;
		let currency_config = self
			.currencies
			.get(&currency)
			.ok_or_else(|| CoordinatorError::UnknownCurrency(currency.clone()))?;
		if !currency_config.supports(provider) {
			return Err(CoordinatorError::IncompatibleProvider { currency, provider });
		}

		inner.clear_downstream();
		inner.provider = Some(provider);
		inner.transition(SessionState::ProviderSelected)?;
		inner.check();
		Ok(())
	}

	/// Connects the selected provider, or disconnects if already connected.
	///
	/// Toggle semantics: a second `connect` while a connection is live tears
	/// it down instead. On failure no partial connection is kept and the
	/// session stays at `ProviderSelected`.
	pub async fn connect(&self) -> Result<ConnectOutcome, CoordinatorError> {
		// The guard must go out of scope before any await, so the toggle
		// decision is taken in its own critical section and acted on after.
		enum Step {
			Toggle(Option<ProviderKind>),
			Establish {
				provider: ProviderKind,
				chain: Option<ChainOptions>,
				epoch: u64,
			},
		}

		let step = {
			let mut inner = self.lock();
			if inner.connection.is_some() {
				let provider = inner.provider;
				inner.clear_downstream();
				inner.transition(SessionState::ProviderSelected)?;
				inner.check();
				Step::Toggle(provider)
			} else {
				let currency = inner
					.currency
					.clone()
					.ok_or(CoordinatorError::NoCurrencySelected)?;
				let provider = inner.provider.ok_or(CoordinatorError::NoProviderSelected)?;
				if self.endpoint.len() <= MIN_ENDPOINT_LENGTH {
					return Err(CoordinatorError::Relay(RelayError::EndpointInvalid(
						format!("endpoint '{}' is too short", self.endpoint),
					)));
				}
				let chain = self
					.currencies
					.get(&currency)
					.and_then(|c| c.chain.clone());
				inner.begin(OpKind::Connect)?;
				Step::Establish {
					provider,
					chain,
					epoch: inner.epoch,
				}
			}
		};
		let (provider, chain, epoch) = match step {
			Step::Toggle(provider) => {
				if let Some(provider) = provider {
					self.disconnect_wallet(provider).await;
				}
				return Ok(ConnectOutcome::Disconnected);
			},
			Step::Establish {
				provider,
				chain,
				epoch,
			} => (provider, chain, epoch),
		};
		let _flight = Flight {
			inner: &self.inner,
			op: OpKind::Connect,
		};

		let result = self.wallets.connect(provider, chain.as_ref()).await;

		let mut inner = self.lock();
		if inner.epoch != epoch {
			debug!(%provider, "wallet connect completed after session change, discarding");
			return Ok(ConnectOutcome::Superseded);
		}
		let wallet_connection = result?;
		let address = wallet_connection.address.clone();
		// currency cannot have changed without bumping the epoch
		let currency = inner
			.currency
			.clone()
			.ok_or(CoordinatorError::NoCurrencySelected)?;
		inner.connection = Some(Connection {
			currency,
			provider,
			address: address.clone(),
			chain_id: wallet_connection.chain_id,
		});
		inner.transition(SessionState::Connected)?;
		inner.check();
		Ok(ConnectOutcome::Connected { address })
	}

	/// Establishes a relay session on top of the live connection.
	///
	/// Runs a pre-flight capability check (the node must be reachable and
	/// recognize the active currency) before full session establishment. If
	/// either step fails, no session is kept.
	pub async fn connect_relay(&self, endpoint: &str) -> Result<RelaySession, CoordinatorError> {
		let (currency, address, epoch) = {
			let mut inner = self.lock();
			let connection = inner
				.connection
				.as_ref()
				.ok_or(CoordinatorError::NotConnected)?;
			if endpoint.len() <= MIN_ENDPOINT_LENGTH {
				return Err(CoordinatorError::Relay(RelayError::EndpointInvalid(
					format!("endpoint '{endpoint}' is too short"),
				)));
			}
			let currency = connection.currency.clone();
			let address = connection.address.clone();
			inner.begin(OpKind::ConnectRelay)?;
			(currency, address, inner.epoch)
		};
		let _flight = Flight {
			inner: &self.inner,
			op: OpKind::ConnectRelay,
		};

		let relay = (self.relay_builder)(endpoint)?;
		let bundler_address = relay.bundler_address(&currency).await?;
		relay.ready(&currency).await?;

		let mut inner = self.lock();
		if inner.epoch != epoch {
			debug!(endpoint, "relay session ready after session change, discarding");
			return Err(CoordinatorError::Superseded);
		}
		// Transition first so nothing is committed if it is rejected. A
		// repeat call replaces the live session with the new endpoint's.
		inner.transition(SessionState::RelayConnected)?;
		let session = RelaySession {
			endpoint: endpoint.to_string(),
			address,
			bundler_address,
		};
		inner.relay_session = Some(session.clone());
		inner.relay_client = Some(Arc::from(relay));
		inner.check();
		Ok(session)
	}

	/// Clears the connection, relay session, and all derived state.
	///
	/// Currency and provider selections are retained.
	pub async fn disconnect(&self) -> Result<(), CoordinatorError> {
		let provider = {
			let mut inner = self.lock();
			let provider = inner.connection.as_ref().map(|c| c.provider);
			inner.clear_downstream();
			let target = if inner.provider.is_some() {
				SessionState::ProviderSelected
			} else if inner.currency.is_some() {
				SessionState::CurrencySelected
			} else {
				SessionState::Idle
			};
			if inner.state != target {
				inner.transition(target)?;
			}
			inner.check();
			provider
		};
		if let Some(provider) = provider {
			self.disconnect_wallet(provider).await;
		}
		Ok(())
	}

	/// Best-effort provider-side teardown. The local session is already
	/// cleared, so failures are only logged.
	async fn disconnect_wallet(&self, provider: ProviderKind) {
		if let Err(e) = self.wallets.disconnect(provider).await {
			warn!(%provider, error = %e, "wallet disconnect failed");
		}
	}

	/// Fetches the relay-side balance for the connected account.
	pub async fn fetch_balance(&self) -> Result<String, CoordinatorError> {
		let (relay, currency, address, epoch) = self.relay_op_context(OpKind::Balance)?;
		let _flight = Flight {
			inner: &self.inner,
			op: OpKind::Balance,
		};

		let amount = relay.balance(&currency, &address).await?;

		let mut inner = self.lock();
		if inner.epoch != epoch {
			return Err(CoordinatorError::Superseded);
		}
		inner.balance = Some(amount.clone());
		Ok(amount)
	}

	/// Stages a file for pricing and upload. Requires a live relay session;
	/// replaces any staged file and invalidates a previously quoted price.
	pub fn select_file(
		&self,
		name: impl Into<String>,
		content_type: impl Into<String>,
		bytes: Vec<u8>,
	) -> Result<(), CoordinatorError> {
		let mut inner = self.lock();
		if inner.relay_session.is_none() {
			return Err(CoordinatorError::NoRelaySession);
		}
		inner.price = None;
		inner.file = Some(PendingFile {
			name: name.into(),
			content_type: content_type.into(),
			bytes,
		});
		inner.check();
		Ok(())
	}

	/// Quotes the upload price for the staged file.
	pub async fn quote_price(&self) -> Result<String, CoordinatorError> {
		let (relay, currency, _, epoch) = self.relay_op_context(OpKind::Price)?;
		let _flight = Flight {
			inner: &self.inner,
			op: OpKind::Price,
		};
		let byte_length = {
			let inner = self.lock();
			inner
				.file
				.as_ref()
				.map(PendingFile::byte_length)
				.ok_or(CoordinatorError::NoFileSelected)?
		};

		let price = relay.price(&currency, byte_length).await?;

		let mut inner = self.lock();
		if inner.epoch != epoch {
			return Err(CoordinatorError::Superseded);
		}
		inner.price = Some(price.clone());
		Ok(price)
	}

	/// Uploads the staged file through the relay session.
	pub async fn upload(&self) -> Result<UploadReceipt, CoordinatorError> {
		let (relay, currency, _, epoch) = self.relay_op_context(OpKind::Upload)?;
		let _flight = Flight {
			inner: &self.inner,
			op: OpKind::Upload,
		};
		let (bytes, content_type) = {
			let inner = self.lock();
			let file = inner.file.as_ref().ok_or(CoordinatorError::NoFileSelected)?;
			(file.bytes.clone(), file.content_type.clone())
		};

		let receipt = relay.upload(&currency, bytes, &content_type).await?;
		if !receipt.is_success() {
			return Err(CoordinatorError::Relay(RelayError::OperationFailed {
				status: receipt.status,
				message: "upload was not accepted".to_string(),
			}));
		}

		let inner = self.lock();
		if inner.epoch != epoch {
			return Err(CoordinatorError::Superseded);
		}
		Ok(receipt)
	}

	/// Funds the relay-side balance from the connected account.
	pub async fn fund(&self, amount: &str) -> Result<FundReceipt, CoordinatorError> {
		let amount = validate_amount(amount)?;
		let (relay, currency, address, epoch) = self.relay_op_context(OpKind::Fund)?;
		let _flight = Flight {
			inner: &self.inner,
			op: OpKind::Fund,
		};

		let receipt = relay.fund(&currency, &address, &amount).await?;

		let mut inner = self.lock();
		if inner.epoch != epoch {
			return Err(CoordinatorError::Superseded);
		}
		// Cached balance is stale after a fund
		inner.balance = None;
		Ok(receipt)
	}

	/// Withdraws from the relay-side balance back to the connected account.
	pub async fn withdraw(&self, amount: &str) -> Result<WithdrawReceipt, CoordinatorError> {
		let amount = validate_amount(amount)?;
		let (relay, currency, address, epoch) = self.relay_op_context(OpKind::Withdraw)?;
		let _flight = Flight {
			inner: &self.inner,
			op: OpKind::Withdraw,
		};

		let receipt = relay.withdraw(&currency, &address, &amount).await?;

		let mut inner = self.lock();
		if inner.epoch != epoch {
			return Err(CoordinatorError::Superseded);
		}
		inner.balance = None;
		Ok(receipt)
	}

	/// Captures everything a relay-backed operation needs and marks it in
	/// flight, in one critical section.
	fn relay_op_context(
		&self,
		op: OpKind,
	) -> Result<(Arc<dyn RelayInterface>, String, Address, u64), CoordinatorError> {
		let mut inner = self.lock();
		let relay = inner
			.relay_client
			.clone()
			.ok_or(CoordinatorError::NoRelaySession)?;
		let connection = inner
			.connection
			.as_ref()
			.ok_or(CoordinatorError::NotConnected)?;
		let currency = connection.currency.clone();
		let address = connection.address.clone();
		inner.begin(op)?;
		Ok((relay, currency, address, inner.epoch))
	}

	// Accessors

	/// The current lifecycle state.
	pub fn state(&self) -> SessionState {
		self.lock().state
	}

	/// The active currency, if one is selected.
	pub fn selected_currency(&self) -> Option<String> {
		self.lock().currency.clone()
	}

	/// The selected provider, if one is selected.
	pub fn selected_provider(&self) -> Option<ProviderKind> {
		self.lock().provider
	}

	/// The live connection, if one exists.
	pub fn connection(&self) -> Option<Connection> {
		self.lock().connection.clone()
	}

	/// The relay session, if one exists.
	pub fn relay_session(&self) -> Option<RelaySession> {
		self.lock().relay_session.clone()
	}

	/// The last fetched balance, if any.
	pub fn balance(&self) -> Option<String> {
		self.lock().balance.clone()
	}

	/// The last quoted price, if any.
	pub fn price(&self) -> Option<String> {
		self.lock().price.clone()
	}

	/// The staged file, if any.
	pub fn pending_file(&self) -> Option<PendingFile> {
		self.lock().file.clone()
	}
}

/// Validates a user-supplied amount: a positive decimal.
fn validate_amount(amount: &str) -> Result<String, CoordinatorError> {
	let parsed = Decimal::from_str(amount)
		.map_err(|_| CoordinatorError::InvalidAmount(amount.to_string()))?;
	if parsed <= Decimal::ZERO {
		return Err(CoordinatorError::InvalidAmount(amount.to_string()));
	}
	Ok(parsed.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use std::collections::HashMap;
	use std::time::Duration;
	use uploader_relay::implementations::mock::create_mock_relay;
	use uploader_relay::MockRelayInterface;
	use uploader_types::{default_currencies, ConfigSchema, ValidationError};
	use uploader_wallet::{MockWalletInterface, WalletConnection, WalletInterface};

	struct NoopSchema;

	impl ConfigSchema for NoopSchema {
		fn validate(&self, _config: &toml::Value) -> Result<(), ValidationError> {
			Ok(())
		}
	}

	/// What a test wallet does when asked to connect.
	enum WalletBehavior {
		Succeed { address: &'static str },
		RejectChainSwitch,
		RejectUser,
		SucceedSlowly { address: &'static str, delay_ms: u64 },
	}

	struct TestWallet {
		kind: ProviderKind,
		behavior: WalletBehavior,
	}

	#[async_trait]
	impl WalletInterface for TestWallet {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(NoopSchema)
		}

		fn kind(&self) -> ProviderKind {
			self.kind
		}

		async fn connect(
			&self,
			chain: Option<&ChainOptions>,
		) -> Result<WalletConnection, WalletError> {
			let chain_id = chain.map(|c| c.chain_id);
			match &self.behavior {
				WalletBehavior::Succeed { address } => Ok(WalletConnection {
					address: Address::new(*address),
					chain_id,
				}),
				WalletBehavior::RejectChainSwitch => Err(WalletError::ChainSwitchFailed {
					chain_id: chain_id.unwrap_or(0),
					reason: "wallet refused switch and add".to_string(),
				}),
				WalletBehavior::RejectUser => Err(WalletError::UserRejected),
				WalletBehavior::SucceedSlowly { address, delay_ms } => {
					tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
					Ok(WalletConnection {
						address: Address::new(*address),
						chain_id,
					})
				},
			}
		}

		async fn disconnect(&self) -> Result<(), WalletError> {
			Ok(())
		}
	}

	fn wallet_service(kind: ProviderKind, behavior: WalletBehavior) -> WalletService {
		let mut implementations: HashMap<ProviderKind, Box<dyn WalletInterface>> = HashMap::new();
		implementations.insert(kind, Box::new(TestWallet { kind, behavior }));
		WalletService::new(implementations)
	}

	fn mock_relay_builder(relay_config: &str) -> RelayBuilder {
		let config: toml::Value = toml::from_str(relay_config).unwrap();
		Box::new(move |endpoint| create_mock_relay(endpoint, &config))
	}

	fn coordinator(kind: ProviderKind, behavior: WalletBehavior) -> Coordinator {
		Coordinator::new(
			default_currencies(),
			wallet_service(kind, behavior),
			mock_relay_builder(""),
			"https://node1.bundlr.network",
		)
	}

	async fn connected_coordinator() -> Coordinator {
		let coordinator = coordinator(
			ProviderKind::Injected,
			WalletBehavior::Succeed { address: "0xabc" },
		);
		coordinator.select_currency("matic").unwrap();
		coordinator.select_provider(ProviderKind::Injected).unwrap();
		coordinator.connect().await.unwrap();
		coordinator
	}

	#[test]
	fn test_offered_providers_match_currency_table() {
		let coordinator = coordinator(
			ProviderKind::Injected,
			WalletBehavior::Succeed { address: "0xabc" },
		);

		assert!(matches!(
			coordinator.available_providers(),
			Err(CoordinatorError::NoCurrencySelected)
		));

		coordinator.select_currency("matic").unwrap();
		assert_eq!(
			coordinator.available_providers().unwrap(),
			vec![ProviderKind::Injected, ProviderKind::WalletConnect]
		);

		coordinator.select_currency("solana").unwrap();
		assert_eq!(
			coordinator.available_providers().unwrap(),
			vec![ProviderKind::Phantom]
		);
	}

	#[test]
	fn test_unknown_currency_rejected() {
		let coordinator = coordinator(
			ProviderKind::Injected,
			WalletBehavior::Succeed { address: "0xabc" },
		);
		assert!(matches!(
			coordinator.select_currency("doge"),
			Err(CoordinatorError::UnknownCurrency(_))
		));
		assert_eq!(coordinator.state(), SessionState::Idle);
	}

	#[test]
	fn test_incompatible_provider_rejected() {
		let coordinator = coordinator(
			ProviderKind::Phantom,
			WalletBehavior::Succeed { address: "solpk" },
		);
		coordinator.select_currency("matic").unwrap();

		let err = coordinator.select_provider(ProviderKind::Phantom).unwrap_err();
		assert!(matches!(err, CoordinatorError::IncompatibleProvider { .. }));
		assert_eq!(coordinator.state(), SessionState::CurrencySelected);
		assert_eq!(coordinator.selected_provider(), None);
	}

	#[tokio::test]
	async fn test_connect_yields_address_and_chain() {
		let coordinator = connected_coordinator().await;

		assert_eq!(coordinator.state(), SessionState::Connected);
		let connection = coordinator.connection().unwrap();
		assert_eq!(connection.address.as_str(), "0xabc");
		assert_eq!(connection.chain_id, Some(137));
		assert_eq!(connection.provider, ProviderKind::Injected);
	}

	#[tokio::test]
	async fn test_connect_without_provider_rejected() {
		let coordinator = coordinator(
			ProviderKind::Injected,
			WalletBehavior::Succeed { address: "0xabc" },
		);
		assert!(matches!(
			coordinator.connect().await,
			Err(CoordinatorError::NoCurrencySelected)
		));

		coordinator.select_currency("matic").unwrap();
		assert!(matches!(
			coordinator.connect().await,
			Err(CoordinatorError::NoProviderSelected)
		));
	}

	#[tokio::test]
	async fn test_connect_toggle_disconnects() {
		let coordinator = connected_coordinator().await;

		let outcome = coordinator.connect().await.unwrap();
		assert_eq!(outcome, ConnectOutcome::Disconnected);
		assert_eq!(coordinator.state(), SessionState::ProviderSelected);
		assert!(coordinator.connection().is_none());
		assert!(coordinator.relay_session().is_none());
		// Selections are retained across the toggle
		assert_eq!(coordinator.selected_currency().as_deref(), Some("matic"));
		assert_eq!(
			coordinator.selected_provider(),
			Some(ProviderKind::Injected)
		);
	}

	#[tokio::test]
	async fn test_failed_chain_negotiation_leaves_disconnected() {
		let coordinator = coordinator(ProviderKind::Injected, WalletBehavior::RejectChainSwitch);
		coordinator.select_currency("matic").unwrap();
		coordinator.select_provider(ProviderKind::Injected).unwrap();

		let err = coordinator.connect().await.unwrap_err();
		assert!(matches!(
			err,
			CoordinatorError::Wallet(WalletError::ChainSwitchFailed { chain_id: 137, .. })
		));
		assert_eq!(coordinator.state(), SessionState::ProviderSelected);
		assert!(coordinator.connection().is_none());
	}

	#[tokio::test]
	async fn test_user_rejection_is_not_fatal() {
		let coordinator = coordinator(ProviderKind::Injected, WalletBehavior::RejectUser);
		coordinator.select_currency("matic").unwrap();
		coordinator.select_provider(ProviderKind::Injected).unwrap();

		let err = coordinator.connect().await.unwrap_err();
		assert!(matches!(
			err,
			CoordinatorError::Wallet(WalletError::UserRejected)
		));

		// The user can immediately re-trigger the action
		assert_eq!(coordinator.state(), SessionState::ProviderSelected);
	}

	#[tokio::test]
	async fn test_relay_session_lifecycle() {
		let coordinator = connected_coordinator().await;

		let session = coordinator
			.connect_relay("https://node1.bundlr.network")
			.await
			.unwrap();
		assert_eq!(coordinator.state(), SessionState::RelayConnected);
		assert_eq!(session.address.as_str(), "0xabc");
		assert_eq!(session.bundler_address.as_str(), "mock-bundler-matic");
	}

	#[tokio::test]
	async fn test_relay_requires_connection() {
		let coordinator = coordinator(
			ProviderKind::Injected,
			WalletBehavior::Succeed { address: "0xabc" },
		);
		let err = coordinator
			.connect_relay("https://node1.bundlr.network")
			.await
			.unwrap_err();
		assert!(matches!(err, CoordinatorError::NotConnected));
	}

	#[tokio::test]
	async fn test_short_relay_endpoint_rejected() {
		let coordinator = connected_coordinator().await;
		let err = coordinator.connect_relay("http://").await.unwrap_err();
		assert!(matches!(
			err,
			CoordinatorError::Relay(RelayError::EndpointInvalid(_))
		));
		assert!(coordinator.relay_session().is_none());
	}

	#[tokio::test]
	async fn test_failed_preflight_leaves_no_session() {
		let coordinator = Coordinator::new(
			default_currencies(),
			wallet_service(
				ProviderKind::Injected,
				WalletBehavior::Succeed { address: "0xabc" },
			),
			mock_relay_builder("fail_preflight = true"),
			"https://node1.bundlr.network",
		);
		coordinator.select_currency("matic").unwrap();
		coordinator.select_provider(ProviderKind::Injected).unwrap();
		coordinator.connect().await.unwrap();

		let err = coordinator
			.connect_relay("https://node1.bundlr.network")
			.await
			.unwrap_err();
		assert!(matches!(
			err,
			CoordinatorError::Relay(RelayError::EndpointInvalid(_))
		));
		assert_eq!(coordinator.state(), SessionState::Connected);
		assert!(coordinator.relay_session().is_none());
	}

	#[tokio::test]
	async fn test_failed_ready_is_an_error() {
		let coordinator = Coordinator::new(
			default_currencies(),
			wallet_service(
				ProviderKind::Injected,
				WalletBehavior::Succeed { address: "0xabc" },
			),
			mock_relay_builder("fail_ready = true"),
			"https://node1.bundlr.network",
		);
		coordinator.select_currency("matic").unwrap();
		coordinator.select_provider(ProviderKind::Injected).unwrap();
		coordinator.connect().await.unwrap();

		let err = coordinator
			.connect_relay("https://node1.bundlr.network")
			.await
			.unwrap_err();
		assert!(matches!(
			err,
			CoordinatorError::Relay(RelayError::Network(_))
		));
		assert!(coordinator.relay_session().is_none());
	}

	#[tokio::test]
	async fn test_currency_switch_clears_everything() {
		let coordinator = connected_coordinator().await;
		coordinator
			.connect_relay("https://node1.bundlr.network")
			.await
			.unwrap();
		coordinator.fetch_balance().await.unwrap();
		coordinator.select_file("a.png", "image/png", vec![1, 2, 3]).unwrap();
		coordinator.quote_price().await.unwrap();

		coordinator.select_currency("arbitrum").unwrap();

		assert_eq!(coordinator.state(), SessionState::CurrencySelected);
		assert!(coordinator.connection().is_none());
		assert!(coordinator.relay_session().is_none());
		assert!(coordinator.balance().is_none());
		assert!(coordinator.price().is_none());
		assert!(coordinator.pending_file().is_none());
		assert_eq!(coordinator.selected_provider(), None);
	}

	#[tokio::test]
	async fn test_disconnect_destroys_relay_session() {
		let coordinator = connected_coordinator().await;
		coordinator
			.connect_relay("https://node1.bundlr.network")
			.await
			.unwrap();

		coordinator.disconnect().await.unwrap();

		assert_eq!(coordinator.state(), SessionState::ProviderSelected);
		assert!(coordinator.connection().is_none());
		assert!(coordinator.relay_session().is_none());
	}

	#[tokio::test]
	async fn test_price_matches_byte_length() {
		let coordinator = connected_coordinator().await;
		coordinator
			.connect_relay("https://node1.bundlr.network")
			.await
			.unwrap();
		coordinator
			.select_file("ten.bin", "application/octet-stream", vec![0u8; 10])
			.unwrap();

		// Mock relay prices at 10 atomic units per byte
		let price = coordinator.quote_price().await.unwrap();
		assert_eq!(price, "100");
		assert_eq!(coordinator.price().as_deref(), Some("100"));
	}

	#[tokio::test]
	async fn test_fund_withdraw_and_balance() {
		let coordinator = connected_coordinator().await;
		coordinator
			.connect_relay("https://node1.bundlr.network")
			.await
			.unwrap();

		coordinator.fund("1000").await.unwrap();
		// Fund invalidates the cached balance until refetched
		assert!(coordinator.balance().is_none());
		assert_eq!(coordinator.fetch_balance().await.unwrap(), "1000");

		coordinator.withdraw("400").await.unwrap();
		assert_eq!(coordinator.fetch_balance().await.unwrap(), "600");
	}

	#[tokio::test]
	async fn test_bad_amounts_rejected() {
		let coordinator = connected_coordinator().await;
		coordinator
			.connect_relay("https://node1.bundlr.network")
			.await
			.unwrap();

		for amount in ["", "abc", "-5", "0"] {
			assert!(matches!(
				coordinator.fund(amount).await,
				Err(CoordinatorError::InvalidAmount(_))
			));
			assert!(matches!(
				coordinator.withdraw(amount).await,
				Err(CoordinatorError::InvalidAmount(_))
			));
		}
	}

	#[tokio::test]
	async fn test_upload_returns_receipt() {
		let coordinator = connected_coordinator().await;
		coordinator
			.connect_relay("https://node1.bundlr.network")
			.await
			.unwrap();
		coordinator
			.select_file("a.png", "image/png", vec![1, 2, 3])
			.unwrap();

		let receipt = coordinator.upload().await.unwrap();
		assert!(receipt.is_success());
		assert!(receipt.gateway_url().starts_with("https://arweave.net/"));
	}

	#[tokio::test]
	async fn test_upload_without_file_rejected() {
		let coordinator = connected_coordinator().await;
		coordinator
			.connect_relay("https://node1.bundlr.network")
			.await
			.unwrap();
		assert!(matches!(
			coordinator.upload().await,
			Err(CoordinatorError::NoFileSelected)
		));
	}

	#[tokio::test]
	async fn test_short_connect_endpoint_rejected() {
		let coordinator = Coordinator::new(
			default_currencies(),
			wallet_service(
				ProviderKind::Injected,
				WalletBehavior::Succeed { address: "0xabc" },
			),
			mock_relay_builder(""),
			"http://",
		);
		coordinator.select_currency("matic").unwrap();
		coordinator.select_provider(ProviderKind::Injected).unwrap();

		let err = coordinator.connect().await.unwrap_err();
		assert!(matches!(
			err,
			CoordinatorError::Relay(RelayError::EndpointInvalid(_))
		));
		assert_eq!(coordinator.state(), SessionState::ProviderSelected);
		assert!(coordinator.connection().is_none());
	}

	#[tokio::test]
	async fn test_reconnect_relay_replaces_session() {
		let coordinator = connected_coordinator().await;
		coordinator
			.connect_relay("https://node1.bundlr.network")
			.await
			.unwrap();

		let session = coordinator
			.connect_relay("https://node2.bundlr.network")
			.await
			.unwrap();

		assert_eq!(session.endpoint, "https://node2.bundlr.network");
		assert_eq!(coordinator.state(), SessionState::RelayConnected);
		assert_eq!(
			coordinator.relay_session().unwrap().endpoint,
			"https://node2.bundlr.network"
		);
	}

	#[tokio::test]
	async fn test_select_file_requires_relay_session() {
		let coordinator = connected_coordinator().await;

		let err = coordinator
			.select_file("a.png", "image/png", vec![1, 2, 3])
			.unwrap_err();
		assert!(matches!(err, CoordinatorError::NoRelaySession));
		assert!(coordinator.pending_file().is_none());
	}

	#[tokio::test]
	async fn test_rejected_upload_status_is_an_error() {
		let builder: RelayBuilder = Box::new(|_| {
			let mut relay = MockRelayInterface::new();
			relay
				.expect_bundler_address()
				.returning(|_| Box::pin(async { Ok(Address::new("node-recv")) }));
			relay
				.expect_ready()
				.returning(|_| Box::pin(async { Ok(()) }));
			relay.expect_upload().returning(|_, _, _| {
				Box::pin(async {
					Ok(UploadReceipt {
						id: "tx1".to_string(),
						status: 500,
					})
				})
			});
			Ok(Box::new(relay))
		});
		let coordinator = Coordinator::new(
			default_currencies(),
			wallet_service(
				ProviderKind::Injected,
				WalletBehavior::Succeed { address: "0xabc" },
			),
			builder,
			"https://node1.bundlr.network",
		);
		coordinator.select_currency("matic").unwrap();
		coordinator.select_provider(ProviderKind::Injected).unwrap();
		coordinator.connect().await.unwrap();
		coordinator
			.connect_relay("https://node1.bundlr.network")
			.await
			.unwrap();
		coordinator
			.select_file("a.png", "image/png", vec![1, 2, 3])
			.unwrap();

		let err = coordinator.upload().await.unwrap_err();
		assert!(matches!(
			err,
			CoordinatorError::Relay(RelayError::OperationFailed { status: 500, .. })
		));
	}

	#[tokio::test]
	async fn test_wallet_backend_failure_surfaces() {
		let mut wallet = MockWalletInterface::new();
		wallet
			.expect_connect()
			.returning(|_| {
				Box::pin(async { Err(WalletError::Connection("wallet offline".to_string())) })
			});
		let mut implementations: HashMap<ProviderKind, Box<dyn WalletInterface>> = HashMap::new();
		implementations.insert(ProviderKind::Injected, Box::new(wallet));
		let coordinator = Coordinator::new(
			default_currencies(),
			WalletService::new(implementations),
			mock_relay_builder(""),
			"https://node1.bundlr.network",
		);
		coordinator.select_currency("matic").unwrap();
		coordinator.select_provider(ProviderKind::Injected).unwrap();

		let err = coordinator.connect().await.unwrap_err();
		assert!(matches!(
			err,
			CoordinatorError::Wallet(WalletError::Connection(_))
		));
		assert_eq!(coordinator.state(), SessionState::ProviderSelected);
	}

	#[tokio::test]
	async fn test_reentrant_connect_rejected() {
		let coordinator = Arc::new(Coordinator::new(
			default_currencies(),
			wallet_service(
				ProviderKind::Injected,
				WalletBehavior::SucceedSlowly {
					address: "0xabc",
					delay_ms: 200,
				},
			),
			mock_relay_builder(""),
			"https://node1.bundlr.network",
		));
		coordinator.select_currency("matic").unwrap();
		coordinator.select_provider(ProviderKind::Injected).unwrap();

		let background = {
			let coordinator = coordinator.clone();
			tokio::spawn(async move { coordinator.connect().await })
		};
		// Let the background connect reach its suspend point
		tokio::time::sleep(Duration::from_millis(10)).await;

		let err = coordinator.connect().await.unwrap_err();
		assert!(matches!(
			err,
			CoordinatorError::OperationInFlight(OpKind::Connect)
		));

		let outcome = background.await.unwrap().unwrap();
		assert!(matches!(outcome, ConnectOutcome::Connected { .. }));
	}

	#[tokio::test]
	async fn test_stale_connect_completion_discarded() {
		let coordinator = Arc::new(Coordinator::new(
			default_currencies(),
			wallet_service(
				ProviderKind::Injected,
				WalletBehavior::SucceedSlowly {
					address: "0xabc",
					delay_ms: 200,
				},
			),
			mock_relay_builder(""),
			"https://node1.bundlr.network",
		));
		coordinator.select_currency("matic").unwrap();
		coordinator.select_provider(ProviderKind::Injected).unwrap();

		let background = {
			let coordinator = coordinator.clone();
			tokio::spawn(async move { coordinator.connect().await })
		};
		tokio::time::sleep(Duration::from_millis(10)).await;

		// The user moves on while the wallet call is still in flight
		coordinator.select_currency("bnb").unwrap();

		let outcome = background.await.unwrap().unwrap();
		assert_eq!(outcome, ConnectOutcome::Superseded);
		assert_eq!(coordinator.state(), SessionState::CurrencySelected);
		assert!(coordinator.connection().is_none());
	}

	#[test]
	fn test_validate_amount() {
		assert_eq!(validate_amount("1.5").unwrap(), "1.5");
		assert!(validate_amount("0").is_err());
		assert!(validate_amount("-1").is_err());
		assert!(validate_amount("ten").is_err());
	}
}
