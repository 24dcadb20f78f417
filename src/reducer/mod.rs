//! # Reducer: admission control for labeled operations.
//!
//! A reducer bounds how many labeled operations execute at once, independently of the
//! named [`Regulators`](crate::Regulators). Two strategies share the [`Reducer`] contract:
//!
//! | Strategy                 | Bound       | Bookkeeping                                  |
//! |--------------------------|-------------|----------------------------------------------|
//! | [`StatisticalReducer`]   | soft        | one mutex; sleeps `mean × queue position`    |
//! | [`ScheduledReducer`]     | exact       | one scheduler task owning all decisions      |
//!
//! ## Contract
//! - `launch(label, work)`: wait for admission, run `work`, return its error. If the reducer
//!   is (or becomes) closed before `work` starts, `work` is dropped unpolled and
//!   [`ReducerError::Aborted`] is returned.
//! - `close()`: terminal. Waiting calls are released with `Aborted`, running calls finish,
//!   and `close` returns once every outstanding `launch` has returned.
//! - `set_debug_sink(writer)`: one line per admission decision.
//!
//! ## Example
//! ```rust
//! use futures::FutureExt;
//! use taskgate::reducer::{self, ReducerKind};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let reducer = reducer::new(4, ReducerKind::Scheduled);
//! let res = reducer.launch("put:a.txt", async { Ok(()) }.boxed()).await;
//! assert!(res.is_ok());
//! reducer.close().await.unwrap();
//! # }
//! ```

mod scheduled;
mod statistical;
mod tracking;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::error::{ReducerError, TaskError};

pub use scheduled::ScheduledReducer;
pub use statistical::StatisticalReducer;

/// Work admitted by a reducer. Nothing runs until the reducer polls it.
pub type Work<'a> = BoxFuture<'a, Result<(), TaskError>>;

/// Admission-control queue contract shared by both strategies.
#[async_trait]
pub trait Reducer: Send + Sync {
    /// Waits for admission, then runs `work`.
    async fn launch<'a>(&'a self, label: &'a str, work: Work<'a>) -> Result<(), ReducerError>;

    /// Closes the reducer and waits for every outstanding `launch` to return.
    ///
    /// Returns [`ReducerError::AlreadyClosed`] (after waiting) on the second and later calls.
    async fn close(&self) -> Result<(), ReducerError>;

    /// Installs a writer receiving one trace line per admission decision.
    fn set_debug_sink(&self, sink: Box<dyn Write + Send>);

    /// Maximum number of concurrently running operations.
    fn limit(&self) -> usize;
}

/// Constructs a reducer of the given `kind`; shorthand for [`ReducerKind::build`].
pub fn new(limit: usize, kind: ReducerKind) -> Arc<dyn Reducer> {
    kind.build(limit)
}

/// Strategy selector for [`new`] and [`ReducerKind::build`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReducerKind {
    /// [`StatisticalReducer`]: estimated sleeps, capped at `max_wait`; soft bound.
    Statistical {
        /// Longest single estimated sleep.
        max_wait: Duration,
    },
    /// [`ScheduledReducer`]: exact bound enforced by a scheduler task.
    Scheduled,
}

impl ReducerKind {
    /// Constructs the selected reducer. `limit` is clamped to at least 1.
    ///
    /// [`ReducerKind::Scheduled`] spawns its scheduler, so it must be built inside a
    /// tokio runtime.
    pub fn build(self, limit: usize) -> Arc<dyn Reducer> {
        match self {
            ReducerKind::Statistical { max_wait } => {
                Arc::new(StatisticalReducer::new(limit, max_wait))
            }
            ReducerKind::Scheduled => Arc::new(ScheduledReducer::new(limit)),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::io::{self, Write};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use futures::FutureExt;

    use super::Work;

    /// Writer appending into a shared buffer.
    #[derive(Clone, Default)]
    pub struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        pub fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Live concurrency gauge with a high-water mark.
    #[derive(Clone, Default)]
    pub struct Gauge {
        pub active: Arc<AtomicUsize>,
        pub peak: Arc<AtomicUsize>,
    }

    impl Gauge {
        pub fn peak(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }

        pub fn current(&self) -> usize {
            self.active.load(Ordering::SeqCst)
        }

        /// Work that occupies a slot for `ms` while being counted.
        pub fn sleeper(&self, ms: u64) -> Work<'static> {
            let gauge = self.clone();
            async move {
                let now = gauge.active.fetch_add(1, Ordering::SeqCst) + 1;
                gauge.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(ms)).await;
                gauge.active.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
            .boxed()
        }
    }
}
