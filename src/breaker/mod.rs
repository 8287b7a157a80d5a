//! Circuit breaking: the shared state store (C1) and the breaker state
//! machine built on top of it (C4).
//!
//! - [`state_store`] - the `StateStore` trait and its in-memory implementation.
//! - [`circuit_breaker`] - the Closed/Open/HalfOpen state machine.
//!
//! The actix-web wiring lives in [`crate::pipeline`], which admits through a
//! [`CircuitBreaker`] and enforces its timeout directly rather than through a
//! standalone middleware, since a request may need to run through several
//! breakers (one per matching group) in one pass.

pub mod circuit_breaker;
pub mod state_store;

pub use circuit_breaker::{Admission, BreakerState, CircuitBreaker, NotifyHook};
pub use state_store::{InMemoryStateStore, StateStore, StateStoreError, StoredValue};
