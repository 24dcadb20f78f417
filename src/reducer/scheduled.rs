//! # Scheduler-task reducer (exact bound).
//!
//! One scheduler task owns every admission decision. `launch` calls talk to it over an
//! unbounded channel; a granted call receives a [`Slot`] whose drop reports completion.
//!
//! ## State machine
//! ```text
//!                 request (active+1 == limit)
//!   ┌───────────┐ ───────────────────────────► ┌──────────┐
//!   │ Available │                               │ Queuing  │ request ─► queue
//!   └───────────┘ ◄─────────────────────────── └──────────┘
//!        │          done (queue empty)               │
//!        │ close                                     │ close: deny queue
//!        ▼                                           ▼
//!   ┌───────────────┐   done (active == 0)     ┌─────────────┐
//!   │ AvailableDone │ ───────────┐  ┌───────── │ QueuingDone │
//!   └───────────────┘            ▼  ▼          └─────────────┘
//!      (draining: requests      ┌────────────┐
//!       are denied)             │ Terminated │
//!                               └────────────┘
//! ```
//!
//! ## Rules
//! - A request is granted only while `active < limit`; the bound is exact.
//! - Queued requests are served front-first but fairness is not guaranteed across the
//!   channel (arrival order depends on task scheduling).
//! - A slot whose `launch` future was dropped still reports completion.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::tracking::{DebugSink, Outstanding};
use super::{Reducer, Work};
use crate::error::ReducerError;

/// Reducer whose bound is enforced by a dedicated scheduler task.
pub struct ScheduledReducer {
    limit: usize,
    tx: mpsc::UnboundedSender<Message>,
    closed: AtomicBool,
    next_seq: AtomicU64,
    outstanding: Outstanding,
    scheduler: Mutex<Option<JoinHandle<()>>>,
    sink: Arc<DebugSink>,
}

enum Message {
    Request(Pending),
    Done { seq: u64 },
    Close,
}

struct Pending {
    seq: u64,
    label: String,
    reply: oneshot::Sender<Slot>,
}

/// Admission token; dropping it frees the slot.
struct Slot {
    seq: u64,
    tx: mpsc::UnboundedSender<Message>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        let _ = self.tx.send(Message::Done { seq: self.seq });
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Available,
    Queuing,
    AvailableDone,
    QueuingDone,
    Terminated,
}

struct Scheduler {
    limit: usize,
    active: usize,
    phase: Phase,
    queue: VecDeque<Pending>,
    rx: mpsc::UnboundedReceiver<Message>,
    tx: mpsc::UnboundedSender<Message>,
    sink: Arc<DebugSink>,
}

impl Scheduler {
    async fn run(mut self) {
        while self.phase != Phase::Terminated {
            let Some(msg) = self.rx.recv().await else {
                break;
            };
            self.phase = self.step(msg);
        }
        self.sink.trace(format_args!("terminated"));
    }

    fn step(&mut self, msg: Message) -> Phase {
        use Phase::*;

        match (self.phase, msg) {
            (Terminated, _) => Terminated,

            (Available, Message::Request(p)) => {
                self.grant(p);
                self.open_phase()
            }
            (Queuing, Message::Request(p)) => {
                self.sink.trace(format_args!(
                    "queue label={} seq={} depth={}",
                    p.label,
                    p.seq,
                    self.queue.len() + 1
                ));
                self.queue.push_back(p);
                Queuing
            }
            (Available | Queuing, Message::Done { seq }) => {
                self.release(seq);
                while self.active < self.limit {
                    let Some(next) = self.queue.pop_front() else {
                        break;
                    };
                    self.grant(next);
                }
                self.open_phase()
            }
            (Available | Queuing, Message::Close) => {
                for p in self.queue.drain(..) {
                    self.sink
                        .trace(format_args!("abort label={} seq={}", p.label, p.seq));
                }
                self.draining_phase()
            }

            (AvailableDone | QueuingDone, Message::Request(p)) => {
                self.sink
                    .trace(format_args!("abort label={} seq={}", p.label, p.seq));
                self.phase
            }
            (AvailableDone | QueuingDone, Message::Done { seq }) => {
                self.release(seq);
                self.draining_phase()
            }
            (AvailableDone | QueuingDone, Message::Close) => self.phase,
        }
    }

    fn grant(&mut self, p: Pending) {
        self.active += 1;
        self.sink.trace(format_args!(
            "admit label={} seq={} active={}",
            p.label, p.seq, self.active
        ));
        let slot = Slot {
            seq: p.seq,
            tx: self.tx.clone(),
        };
        // A refused slot is dropped here and comes back as `Done`.
        let _ = p.reply.send(slot);
    }

    fn release(&mut self, seq: u64) {
        self.active = self.active.saturating_sub(1);
        self.sink
            .trace(format_args!("done seq={seq} active={}", self.active));
    }

    fn open_phase(&self) -> Phase {
        if self.active < self.limit {
            Phase::Available
        } else {
            Phase::Queuing
        }
    }

    fn draining_phase(&self) -> Phase {
        match self.active {
            0 => Phase::Terminated,
            n if n >= self.limit => Phase::QueuingDone,
            _ => Phase::AvailableDone,
        }
    }
}

impl ScheduledReducer {
    /// Creates the reducer and spawns its scheduler; `limit` is clamped to at least 1.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Arc::new(DebugSink::default());

        let scheduler = Scheduler {
            limit,
            active: 0,
            phase: Phase::Available,
            queue: VecDeque::new(),
            rx,
            tx: tx.clone(),
            sink: Arc::clone(&sink),
        };
        let handle = tokio::spawn(scheduler.run());

        Self {
            limit,
            tx,
            closed: AtomicBool::new(false),
            next_seq: AtomicU64::new(0),
            outstanding: Outstanding::new(),
            scheduler: Mutex::new(Some(handle)),
            sink,
        }
    }

    fn abort(&self, label: &str, seq: Option<u64>) -> ReducerError {
        match seq {
            Some(seq) => self
                .sink
                .trace(format_args!("abort label={label} seq={seq} reason=closed")),
            None => self
                .sink
                .trace(format_args!("abort label={label} reason=closed")),
        }
        ReducerError::Aborted
    }
}

impl Drop for ScheduledReducer {
    fn drop(&mut self) {
        // Lets the scheduler drain and exit when the reducer was never closed.
        let _ = self.tx.send(Message::Close);
    }
}

#[async_trait]
impl Reducer for ScheduledReducer {
    async fn launch<'a>(&'a self, label: &'a str, work: Work<'a>) -> Result<(), ReducerError> {
        let _outstanding = self.outstanding.enter();
        if self.closed.load(Ordering::Acquire) {
            return Err(self.abort(label, None));
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let (reply, granted) = oneshot::channel();
        let request = Message::Request(Pending {
            seq,
            label: label.to_string(),
            reply,
        });
        if self.tx.send(request).is_err() {
            return Err(self.abort(label, Some(seq)));
        }

        let Ok(slot) = granted.await else {
            return Err(self.abort(label, Some(seq)));
        };
        if self.closed.load(Ordering::Acquire) {
            drop(slot);
            return Err(self.abort(label, Some(seq)));
        }

        let res = work.await;
        drop(slot);
        res.map_err(ReducerError::from)
    }

    async fn close(&self) -> Result<(), ReducerError> {
        let already = self.closed.swap(true, Ordering::AcqRel);
        let _ = self.tx.send(Message::Close);
        self.outstanding.drained().await;

        let scheduler = self
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = scheduler {
            let _ = handle.await;
        }

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
