//! # Runtime events emitted by the task runtime and its subscribers.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Registration events**: a unit was accepted or rejected
//! - **Unit lifecycle events**: starting, finished, failed
//! - **Interrupt events**: escalation steps driven by OS signals
//! - **Runtime events**: hook failures, completion barrier reached, subscriber health
//!
//! The [`Event`] struct carries metadata such as timestamps, unit id, reasons and delays.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use taskgate::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::UnitFailed)
//!     .with_task("upload-3")
//!     .with_reason("bucket not found");
//!
//! assert_eq!(ev.kind, EventKind::UnitFailed);
//! assert_eq!(ev.task.as_deref(), Some("upload-3"));
//! assert_eq!(ev.reason.as_deref(), Some("bucket not found"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `task`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `task`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Registration events ===
    /// Unit accepted by the runtime.
    ///
    /// Sets:
    /// - `task`: unit id
    UnitRegistered,

    /// Registration refused (duplicate id, or shutdown already begun).
    ///
    /// Sets:
    /// - `task`: unit id
    /// - `reason`: `"duplicate_id"` or `"shutting_down"`
    UnitRejected,

    // === Unit lifecycle events ===
    /// Unit is about to invoke its work function.
    ///
    /// Sets:
    /// - `task`: unit id
    /// - `delay_ms`: start delay that was idled first (if any)
    UnitStarting,

    /// Work function returned `Ok`.
    ///
    /// Sets:
    /// - `task`: unit id
    UnitFinished,

    /// Work function returned an error (or panicked).
    ///
    /// Sets:
    /// - `task`: unit id
    /// - `reason`: error message
    UnitFailed,

    // === Interrupt escalation ===
    /// An interrupt (OS signal or [`Runtime::interrupt`](crate::Runtime::interrupt)) arrived.
    InterruptReceived,

    /// First interrupt: shared context cancelled.
    CancelRequested,

    /// Second interrupt: warning written, nothing else happens.
    ///
    /// Sets:
    /// - `reason`: comma separated ids of units still running
    EscalationWarned,

    /// Third interrupt: the process is about to exit without shutdown hooks.
    ForceExit,

    // === Runtime events ===
    /// Startup hook failed; units are still started and awaited.
    ///
    /// Sets:
    /// - `reason`: error message
    StartupFailed,

    /// Shutdown hook failed.
    ///
    /// Sets:
    /// - `reason`: error message
    ShutdownFailed,

    /// Completion barrier reached: every registered unit has returned.
    AllUnitsDone,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,

    /// Start delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Id of the unit of work, if applicable.
    pub task: Option<Arc<str>>,
    /// Event classification.
    pub kind: EventKind,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            kind,
            at: SystemTime::now(),
            delay_ms: None,
            reason: None,
            task: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a unit id.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }
}
