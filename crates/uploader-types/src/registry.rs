//! Registry trait for self-registering implementations.
//!
//! Wallet and relay backends register themselves under a stable name so they
//! can be selected from configuration tables without the selecting code
//! knowing the concrete type.

/// A named implementation together with the factory that constructs it.
///
/// Each backend crate defines a unit struct implementing this trait; the
/// crate's `get_all_implementations` function collects the `(NAME, factory)`
/// pairs for configuration-driven construction.
pub trait ImplementationRegistry {
	/// Stable name used to select this implementation in configuration.
	const NAME: &'static str;

	/// The factory function type producing the implementation.
	type Factory;

	/// Returns the factory for this implementation.
	fn factory() -> Self::Factory;
}
