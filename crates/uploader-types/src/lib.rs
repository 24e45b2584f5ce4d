//! Common types module for the bundle uploader system.
//!
//! This module defines the core data types and structures shared by the
//! wallet, relay, and coordinator crates. It provides a centralized location
//! for shared types to ensure consistency across all components.

/// Account address representation.
pub mod address;
/// Currency and chain configuration types.
pub mod currency;
/// Receipt types returned by relay operations.
pub mod receipts;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

pub use address::Address;
pub use currency::{
	default_currencies, ChainOptions, CurrenciesConfig, CurrencyConfig, ProviderKind,
};
pub use receipts::{FundReceipt, UploadReceipt, WithdrawReceipt};
pub use registry::ImplementationRegistry;
pub use validation::{ConfigSchema, Field, FieldType, Schema, ValidationError};
