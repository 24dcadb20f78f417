//! # Event subscribers for the taskgate runtime.
//!
//! Observers plug into the runtime through the [`Subscribe`] trait. The runtime
//! fans events out to them through a [`SubscriberSet`]; each subscriber gets its own
//! bounded queue and worker, so a slow or panicking observer never blocks units of work.
//!
//! ```text
//! Runtime / unit tasks ── publish(Event) ──► Bus ──► listener ──► SubscriberSet::emit
//!                                                                  ┌────────┼────────┐
//!                                                                  ▼        ▼        ▼
//!                                                              LogWriter  Metrics  Custom
//! ```

mod subscriber;
mod subscriber_set;

#[cfg(feature = "logging")]
mod log;

pub use subscriber::Subscribe;
pub use subscriber_set::SubscriberSet;

pub(crate) use subscriber_set::panic_message;

#[cfg(feature = "logging")]
pub use log::LogWriter;
