//! Session state machine implementation.
//!
//! Manages session state transitions with validation, ensuring a session
//! moves through its lifecycle in order: Idle -> CurrencySelected ->
//! ProviderSelected -> Connected -> RelayConnected. Selecting a currency
//! drops back to CurrencySelected from anywhere, disconnecting drops back
//! to ProviderSelected, and re-connecting the relay stays in
//! RelayConnected while the session is replaced.

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// The lifecycle state of a coordinator session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
	/// Nothing selected yet.
	Idle,
	/// A currency is active but no provider has been chosen.
	CurrencySelected,
	/// A currency and a compatible provider are chosen.
	ProviderSelected,
	/// A wallet connection is live.
	Connected,
	/// A relay session is layered on the wallet connection.
	RelayConnected,
}

impl SessionState {
	/// Checks if a state transition is valid.
	pub fn is_valid_transition(from: SessionState, to: SessionState) -> bool {
		// Static transition table - each state maps to allowed next states
		static TRANSITIONS: Lazy<HashMap<SessionState, HashSet<SessionState>>> = Lazy::new(|| {
			let mut m = HashMap::new();
			m.insert(
				SessionState::Idle,
				HashSet::from([SessionState::CurrencySelected]),
			);
			m.insert(
				SessionState::CurrencySelected,
				HashSet::from([
					SessionState::CurrencySelected,
					SessionState::ProviderSelected,
				]),
			);
			m.insert(
				SessionState::ProviderSelected,
				HashSet::from([
					SessionState::CurrencySelected,
					SessionState::ProviderSelected,
					SessionState::Connected,
				]),
			);
			m.insert(
				SessionState::Connected,
				HashSet::from([
					SessionState::CurrencySelected,
					SessionState::ProviderSelected,
					SessionState::RelayConnected,
				]),
			);
			m.insert(
				SessionState::RelayConnected,
				HashSet::from([
					SessionState::CurrencySelected,
					SessionState::ProviderSelected,
					SessionState::RelayConnected,
				]),
			);
			m
		});

		TRANSITIONS.get(&from).is_some_and(|set| set.contains(&to))
	}
}

impl fmt::Display for SessionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			SessionState::Idle => "idle",
			SessionState::CurrencySelected => "currency_selected",
			SessionState::ProviderSelected => "provider_selected",
			SessionState::Connected => "connected",
			SessionState::RelayConnected => "relay_connected",
		};
		f.write_str(name)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_forward_transitions() {
		assert!(SessionState::is_valid_transition(
			SessionState::Idle,
			SessionState::CurrencySelected
		));
		assert!(SessionState::is_valid_transition(
			SessionState::CurrencySelected,
			SessionState::ProviderSelected
		));
		assert!(SessionState::is_valid_transition(
			SessionState::ProviderSelected,
			SessionState::Connected
		));
		assert!(SessionState::is_valid_transition(
			SessionState::Connected,
			SessionState::RelayConnected
		));
		// Re-establishing the relay session replaces it in place.
		assert!(SessionState::is_valid_transition(
			SessionState::RelayConnected,
			SessionState::RelayConnected
		));
	}

	#[test]
	fn test_no_state_skipping() {
		assert!(!SessionState::is_valid_transition(
			SessionState::Idle,
			SessionState::Connected
		));
		assert!(!SessionState::is_valid_transition(
			SessionState::CurrencySelected,
			SessionState::Connected
		));
		assert!(!SessionState::is_valid_transition(
			SessionState::ProviderSelected,
			SessionState::RelayConnected
		));
	}

	#[test]
	fn test_currency_reselect_from_anywhere_but_idle() {
		for from in [
			SessionState::CurrencySelected,
			SessionState::ProviderSelected,
			SessionState::Connected,
			SessionState::RelayConnected,
		] {
			assert!(SessionState::is_valid_transition(
				from,
				SessionState::CurrencySelected
			));
		}
	}

	#[test]
	fn test_disconnect_returns_to_provider_selected() {
		assert!(SessionState::is_valid_transition(
			SessionState::Connected,
			SessionState::ProviderSelected
		));
		assert!(SessionState::is_valid_transition(
			SessionState::RelayConnected,
			SessionState::ProviderSelected
		));
		// No path back to Idle once a currency has been chosen.
		assert!(!SessionState::is_valid_transition(
			SessionState::Connected,
			SessionState::Idle
		));
	}
}
