//! Runtime events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Runtime` (registration, hooks, barrier), unit tasks (lifecycle),
//!   the interrupt listener (escalation), `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the subscriber listener spawned by `Runtime::run`, which fans out to
//!   `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
