//! # taskgate
//!
//! **Taskgate** is a concurrency-control runtime for tools that run many independent
//! units of work at once, such as sync jobs over thousands of storage objects.
//!
//! It provides three building blocks:
//! - a [`Runtime`] that owns units of work, shares one cancellable [`Context`] between
//!   them, serializes their console I/O and escalates repeated OS interrupts;
//! - regulated fan-out combinators ([`regulated`], [`parallelize`], [`launch_and_wait`])
//!   bounded by named permits from a [`Regulators`] registry carried in the context;
//! - admission-control queues ([`Reducer`]) bounding concurrently running labeled
//!   operations, in a statistical ([`StatisticalReducer`]) and an exact
//!   ([`ScheduledReducer`]) flavour.
//!
//! ## Architecture
//! ```text
//!      register(id, f)        register(id, f)        register(id, f)
//!            │                      │                      │
//!            ▼                      ▼                      ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Runtime                                                          │
//! │  - Context (CancellationToken + Regulators + parallel flag)       │
//! │  - TaskTracker (completion barrier)                               │
//! │  - Escalation (Normal → Cancelling → Escalated → ForceExit)       │
//! │  - Bus (broadcast events) ──► SubscriberSet                       │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!   ┌──────────┐       ┌──────────┐       ┌──────────┐
//!   │  unit 1  │       │  unit 2  │       │  unit N  │   work(ctx, handle, input)
//!   └──┬───┬───┘       └──┬───┬───┘       └──┬───┬───┘
//!      │   │ regulated / parallelize / reducer.launch
//!      │   └──────────────► Regulators (one Semaphore per name)
//!      │
//!      └─ print / write / secret ──► console coordinator ──► stdout / stderr / tty
//! ```
//!
//! ## Features
//! | Area              | Description                                                       | Key types / functions                        |
//! |-------------------|-------------------------------------------------------------------|----------------------------------------------|
//! | **Runtime**       | Register, run and inspect units of work.                          | [`Runtime`], [`RuntimeBuilder`], [`TaskHandle`] |
//! | **Context**       | Cancellation, regulators and the parallelism switch.              | [`Context`]                                  |
//! | **Regulation**    | Named, capacity-bounded fan-out.                                  | [`Regulators`], [`regulated`], [`parallelize`], [`launch_and_wait`] |
//! | **Reducers**      | Bound concurrently running labeled operations.                    | [`Reducer`], [`ReducerKind`]                 |
//! | **Console**       | Serialized interactive I/O.                                       | [`Console`], [`TerminalConsole`], [`BufferConsole`] |
//! | **Subscriber API**| Hook into runtime events (logging, metrics, custom subscribers).  | [`Subscribe`], [`Event`]                     |
//! | **Errors**        | Typed errors for units, the runtime and reducers.                 | [`TaskError`], [`RuntimeError`], [`ReducerError`] |
//! | **Configuration** | Centralize runtime settings.                                      | [`Config`]                                   |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use taskgate::{Config, Context, Runtime, Stream, TaskError, TaskHandle, parallelize};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config { handle_signals: false, ..Config::default() };
//!     let rt = Runtime::builder(cfg)
//!         .with_context(Context::new().with_capacities([("head", 4)]))
//!         .build();
//!
//!     let h = rt
//!         .register("stat", |ctx: Context, h: TaskHandle<Vec<u64>, u64>, sizes| async move {
//!             let doubled = parallelize(&ctx, "head", |_ctx, n: u64| async move {
//!                 tokio::time::sleep(Duration::from_millis(10)).await;
//!                 n * 2
//!             }, sizes).await;
//!             h.print(Stream::Out, format_args!("{} objects\n", doubled.len()));
//!             Ok::<_, TaskError>(doubled.iter().sum::<u64>())
//!         })
//!         .expect("fresh id");
//!     h.set_input(vec![1, 2, 3]);
//!
//!     rt.run().await?;
//!     assert_eq!(h.output(), Some(12));
//!     Ok(())
//! }
//! ```

mod console;
mod context;
mod core;
mod error;
mod events;
pub mod reducer;
mod regulation;
mod subscribers;

// ---- Public re-exports ----

pub use console::{BufferConsole, Console, ConsoleWriter, Stream, TerminalConsole};
pub use context::Context;
pub use core::{
    Config, Escalation, EscalationState, EscalationStep, Runtime, RuntimeBuilder, TaskHandle,
    UnitStatus,
};
pub use error::{ReducerError, RuntimeError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use reducer::{Reducer, ReducerKind, ScheduledReducer, StatisticalReducer, Work};
pub use regulation::{Job, Regulators, launch_and_wait, parallelize, regulated};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
