//! Core coordination logic for the uploader service.
//!
//! This module owns the session lifecycle: which currency is active, which
//! wallet provider serves it, the live wallet connection, and the relay
//! session layered on top. All state moves through the
//! [`coordinator::Coordinator`], which enforces the lifecycle ordering and
//! keeps downstream state consistent when an upstream selection changes.

pub mod coordinator;
pub mod session;
pub mod state;

pub use coordinator::{ConnectOutcome, Coordinator, CoordinatorError, OpKind, RelayBuilder};
pub use session::{Connection, PendingFile, RelaySession};
pub use state::SessionState;
