//! # Statistical-wait reducer (soft bound).
//!
//! Approximates backpressure from observed durations instead of counting slots:
//!
//! ```text
//! launch(label, work)
//!   ├─► closed? ─► Aborted
//!   ├─► seq = next; ahead = outstanding entries (all have a lower seq)
//!   ├─► position = (ahead + 1) - limit            (0 when within the limit)
//!   ├─► sleep(min(mean_duration × position, max_wait))   ◄── close() interrupts
//!   ├─► closed? ─► Aborted
//!   └─► run work (unconditionally) ─► record duration ─► Ok/Err
//! ```
//!
//! ## Rules
//! - Admission after the estimated sleep is **not** re-validated against live state, so
//!   bursts can run more than `limit` operations at once.
//! - The mean over an empty history is zero: the first burst is not throttled at all.
//! - Only the last [`HISTORY`] durations contribute to the mean.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::tracking::{DebugSink, Outstanding};
use super::{Reducer, Work};
use crate::error::ReducerError;

/// Number of recent durations kept for the running mean.
pub const HISTORY: usize = 16;

/// Reducer that sleeps an estimated queueing delay once, then admits.
pub struct StatisticalReducer {
    limit: usize,
    max_wait: Duration,
    state: Mutex<State>,
    closing: CancellationToken,
    outstanding: Outstanding,
    sink: DebugSink,
}

#[derive(Default)]
struct State {
    next_seq: u64,
    closed: bool,
    entries: BTreeMap<u64, Entry>,
    history: VecDeque<Duration>,
    total: Duration,
}

struct Entry {
    label: String,
    started: Option<Instant>,
}

impl State {
    fn mean(&self) -> Duration {
        match self.history.len() {
            0 => Duration::ZERO,
            n => self.total / n as u32,
        }
    }

    fn record(&mut self, took: Duration) {
        self.history.push_back(took);
        self.total += took;
        if self.history.len() > HISTORY {
            if let Some(old) = self.history.pop_front() {
                self.total -= old;
            }
        }
    }

    fn estimate(&self, position: usize, max_wait: Duration) -> Duration {
        let position = u32::try_from(position).unwrap_or(u32::MAX);
        self.mean().saturating_mul(position).min(max_wait)
    }

    fn running(&self) -> usize {
        self.entries.values().filter(|e| e.started.is_some()).count()
    }
}

impl StatisticalReducer {
    /// Creates a reducer admitting roughly `limit` (min 1) operations at a time, sleeping at
    /// most `max_wait` per call.
    pub fn new(limit: usize, max_wait: Duration) -> Self {
        Self {
            limit: limit.max(1),
            max_wait,
            state: Mutex::new(State::default()),
            closing: CancellationToken::new(),
            outstanding: Outstanding::new(),
            sink: DebugSink::default(),
        }
    }

    /// Current mean of recorded durations.
    pub fn mean_duration(&self) -> Duration {
        self.lock().mean()
    }

    /// Number of admitted operations currently executing.
    pub fn running(&self) -> usize {
        self.lock().running()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueues the caller and returns its sequence id and estimated sleep.
    fn enqueue(&self, label: &str) -> Result<(u64, Duration), ReducerError> {
        let mut st = self.lock();
        if st.closed {
            return Err(ReducerError::Aborted);
        }
        let seq = st.next_seq;
        st.next_seq += 1;

        let ahead = st.entries.len();
        st.entries.insert(
            seq,
            Entry {
                label: label.to_string(),
                started: None,
            },
        );
        let position = (ahead + 1).saturating_sub(self.limit);
        Ok((seq, st.estimate(position, self.max_wait)))
    }

    /// Marks the entry as running unless the reducer was closed meanwhile.
    fn admit(&self, seq: u64) -> Result<Instant, ReducerError> {
        let mut st = self.lock();
        if st.closed {
            return Err(ReducerError::Aborted);
        }
        let now = Instant::now();
        if let Some(entry) = st.entries.get_mut(&seq) {
            entry.started = Some(now);
        }
        Ok(now)
    }
}

/// Removes the queue entry however `launch` exits; records the duration if it ran.
struct EntryGuard<'a> {
    reducer: &'a StatisticalReducer,
    seq: u64,
}

impl Drop for EntryGuard<'_> {
    fn drop(&mut self) {
        let mut st = self.reducer.lock();
        if let Some(Entry {
            started: Some(started),
            ..
        }) = st.entries.remove(&self.seq)
        {
            st.record(started.elapsed());
        }
    }
}

#[async_trait]
impl Reducer for StatisticalReducer {
    async fn launch<'a>(&'a self, label: &'a str, work: Work<'a>) -> Result<(), ReducerError> {
        let _outstanding = self.outstanding.enter();

        let (seq, wait) = match self.enqueue(label) {
            Ok(v) => v,
            Err(e) => {
                self.sink.trace(format_args!("abort label={label} reason=closed"));
                return Err(e);
            }
        };
        let _entry = EntryGuard { reducer: self, seq };

        if !wait.is_zero() {
            self.sink
                .trace(format_args!("queue label={label} seq={seq} wait={wait:?}"));
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.closing.cancelled() => {}
            }
        }

        if let Err(e) = self.admit(seq) {
            self.sink
                .trace(format_args!("abort label={label} seq={seq} reason=closed"));
            return Err(e);
        }
        self.sink.trace(format_args!("admit label={label} seq={seq}"));

        let res = work.await;
        self.sink
            .trace(format_args!("done label={label} seq={seq} ok={}", res.is_ok()));
        res.map_err(ReducerError::from)
    }

    async fn close(&self) -> Result<(), ReducerError> {
        let already = std::mem::replace(&mut self.lock().closed, true);
        self.closing.cancel();
        self.outstanding.drained().await;

        if already {
            Err(ReducerError::AlreadyClosed)
        } else {
            Ok(())
        }
    }

    fn set_debug_sink(&self, sink: Box<dyn std::io::Write + Send>) {
        self.sink.set(sink);
    }

    fn limit(&self) -> usize {
        self.limit
    }
}

impl std::fmt::Debug for StatisticalReducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.lock();
        let queued: Vec<&str> = st
            .entries
            .values()
            .filter(|e| e.started.is_none())
            .map(|e| e.label.as_str())
            .collect();
        f.debug_struct("StatisticalReducer")
            .field("limit", &self.limit)
            .field("max_wait", &self.max_wait)
            .field("closed", &st.closed)
            .field("mean", &st.mean())
            .field("queued", &queued)
            .finish()
    }
}
