//! Runtime core: units of work, lifecycle and interrupts.
//!
//! The public API from this module is [`Runtime`] (built through [`RuntimeBuilder`]),
//! the typed [`TaskHandle`], [`Config`] and the [`Escalation`] machine.
//!
//! Internal modules:
//! - [`unit`]: type-erased storage for one unit of work;
//! - [`runner`]: executes one unit with start delay, panic capture and event publishing;
//! - [`runtime`]: registration, the completion barrier, hooks and the console coordinator;
//! - [`shutdown`]: cross-platform interrupt listeners.

mod builder;
mod config;
mod escalation;
mod handle;
mod runner;
mod runtime;
mod shutdown;
mod unit;

pub use builder::RuntimeBuilder;
pub use config::Config;
pub use escalation::{Escalation, EscalationState, EscalationStep};
pub use handle::TaskHandle;
pub use runtime::Runtime;
pub use unit::UnitStatus;
