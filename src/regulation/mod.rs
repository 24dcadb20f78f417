//! Named concurrency regulation.
//!
//! - [`Regulators`] immutable per-run table of named permit queues.
//! - [`regulated`], [`parallelize`], [`launch_and_wait`] fan-out helpers that consult the
//!   table attached to a [`Context`](crate::Context).

mod combinators;
mod registry;

pub use combinators::{Job, launch_and_wait, parallelize, regulated};
pub use registry::Regulators;
