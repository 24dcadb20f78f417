//! # Typed handle to a unit of work.
//!
//! Returned by [`Runtime::register`](crate::Runtime::register) and passed to the work
//! function itself. Besides input/output/error access it is the unit's only door to the
//! console: every interactive call is forwarded to the runtime's I/O coordinator.

use std::fmt;
use std::sync::Arc;

use crate::console::{ConsoleWriter, Stream};
use crate::core::unit::{UnitCell, UnitStatus};
use crate::error::TaskError;

/// Handle to one registered unit of work with input type `I` and output type `O`.
pub struct TaskHandle<I, O> {
    cell: Arc<UnitCell<I, O>>,
}

impl<I, O> Clone for TaskHandle<I, O> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<I, O> fmt::Debug for TaskHandle<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.cell.id)
            .field("status", &self.cell.status())
            .finish()
    }
}

impl<I, O> TaskHandle<I, O> {
    pub(crate) fn from_cell(cell: Arc<UnitCell<I, O>>) -> Self {
        Self { cell }
    }

    /// Unit id (unique within its runtime).
    pub fn id(&self) -> &str {
        &self.cell.id
    }

    /// Current lifecycle status.
    pub fn status(&self) -> UnitStatus {
        self.cell.status()
    }

    /// `true` once the work function has returned.
    pub fn is_done(&self) -> bool {
        self.status() == UnitStatus::Done
    }

    /// Replaces the input. Only affects a unit that has not started yet.
    pub fn set_input(&self, input: I) {
        self.cell.set_input(input);
    }

    /// Error returned by the work function, if any.
    pub fn error(&self) -> Option<TaskError> {
        self.cell.error()
    }

    /// Prompts for a secret on the real console without echo and waits for the answer.
    ///
    /// Other units keep running; their output is held back until the prompt completes.
    /// An empty `prompt` is replaced by `"<id> secret"`.
    pub async fn secret(&self, prompt: impl Into<String>) -> Result<String, TaskError> {
        self.cell.io.secret(&self.cell.id, prompt.into()).await
    }

    /// Queues raw bytes for `stream`.
    pub fn write(&self, stream: Stream, bytes: impl Into<Vec<u8>>) {
        self.cell.io.write(stream, bytes.into());
    }

    /// Queues formatted text for `stream`, written as one piece.
    ///
    /// ```rust,ignore
    /// handle.print(Stream::Out, format_args!("{} objects copied\n", n));
    /// ```
    pub fn print(&self, stream: Stream, text: impl fmt::Display) {
        self.cell.io.write(stream, text.to_string().into_bytes());
    }

    /// `std::io::Write` sink for `stream`.
    pub fn writer(&self, stream: Stream) -> ConsoleWriter {
        ConsoleWriter::new(self.cell.io.clone(), stream)
    }
}

impl<I: Clone, O> TaskHandle<I, O> {
    /// Current input.
    pub fn input(&self) -> I {
        self.cell.input()
    }
}

impl<I, O: Clone> TaskHandle<I, O> {
    /// Output of the work function; `None` until it returned `Ok`.
    pub fn output(&self) -> Option<O> {
        self.cell.output()
    }
}
