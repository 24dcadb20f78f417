//! # LogWriter: simple event printer
//!
//! A minimal subscriber that prints incoming [`Event`]s to stderr, one line each.
//! Use it for debugging or demos.
//!
//! ## Example output
//! ```text
//! [registered] task="upload-1"
//! [starting] task="upload-1" delay_ms=Some(50)
//! [failed] task="upload-1" err="bucket not found"
//! [interrupt]
//! [cancel-requested]
//! [escalation-warned] running="upload-2,upload-3"
//! [all-units-done]
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::UnitRegistered => eprintln!("[registered] task={task:?}"),
            EventKind::UnitRejected => eprintln!("[rejected] task={task:?} reason={reason}"),
            EventKind::UnitStarting => {
                eprintln!("[starting] task={task:?} delay_ms={:?}", e.delay_ms)
            }
            EventKind::UnitFinished => eprintln!("[finished] task={task:?}"),
            EventKind::UnitFailed => eprintln!("[failed] task={task:?} err={reason:?}"),
            EventKind::InterruptReceived => eprintln!("[interrupt]"),
            EventKind::CancelRequested => eprintln!("[cancel-requested]"),
            EventKind::EscalationWarned => eprintln!("[escalation-warned] running={reason:?}"),
            EventKind::ForceExit => eprintln!("[force-exit]"),
            EventKind::StartupFailed => eprintln!("[startup-failed] err={reason:?}"),
            EventKind::ShutdownFailed => eprintln!("[shutdown-failed] err={reason:?}"),
            EventKind::AllUnitsDone => eprintln!("[all-units-done]"),
            EventKind::SubscriberOverflow => {
                eprintln!("[subscriber-overflow] subscriber={task} reason={reason}")
            }
            EventKind::SubscriberPanicked => {
                eprintln!("[subscriber-panicked] subscriber={task} info={reason}")
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
