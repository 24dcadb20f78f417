//! # Console access for concurrently running units of work.
//!
//! Units never touch the real streams. Every interactive call becomes an [`IoRequest`]
//! sent to a single coordinator that owns the [`Console`] and serializes all writes and
//! prompts:
//!
//! ```text
//!  unit 1 ── print/write ──┐
//!  unit 2 ── secret ───────┼──► [unbounded queue] ──► coordinator thread ──► Console
//!  unit N ── writer() ─────┘         (FIFO)             (spawn_blocking)     ├─ stdout
//!             ▲                                                             ├─ stderr
//!             └──────────────── oneshot reply (secrets only) ◄──────────────┴─ tty (no echo)
//! ```
//!
//! ## Rules
//! - Each request is written whole; requests never interleave with each other.
//! - Order is total per stream; there is no ordering between `Out` and `Err` at the device.
//! - Writes are fire-and-forget; a secret prompt blocks only the asking unit.

mod buffer;
mod coordinator;
mod terminal;

use std::io;

pub use buffer::BufferConsole;
pub use coordinator::ConsoleWriter;
pub use terminal::TerminalConsole;

pub(crate) use coordinator::{IoClient, IoInbox, serve};

/// Output stream selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stream {
    /// Standard output.
    Out,
    /// Standard error.
    Err,
}

/// The real console owned by the coordinator.
///
/// All methods are called from one dedicated blocking thread, so implementations may block.
pub trait Console: Send + 'static {
    /// Writes all of `bytes` to `stream`.
    fn write(&mut self, stream: Stream, bytes: &[u8]) -> io::Result<()>;

    /// Flushes `stream`. Called after every write request.
    fn flush(&mut self, _stream: Stream) -> io::Result<()> {
        Ok(())
    }

    /// Shows `prompt` and reads one line without echoing it.
    fn read_secret(&mut self, prompt: &str) -> io::Result<String>;
}
