//! # Runtime: owns units of work, the shared context and the console coordinator.
//!
//! The [`Runtime`] keeps every registered unit, a shared cancellable [`Context`],
//! the interrupt [`Escalation`] machine and a completion barrier ([`TaskTracker`])
//! counting all started units.
//!
//! ## Key responsibilities
//! - register units (typed work functions) before or during a run
//! - start each unit in its own tokio task, after the optional start delay
//! - serialize all interactive I/O through one coordinator thread
//! - turn OS interrupts into cancel → warn → force exit
//! - wait for **every** unit (even ones ignoring cancellation) before shutdown
//!
//! ## Run sequence
//! ```text
//! run()
//!   ├─► SubscriberSet + event forwarder      (if subscribers were given)
//!   ├─► spawn_blocking(console coordinator)
//!   ├─► interrupt listener                   (if cfg.handle_signals)
//!   ├─► startup hook(runtime)                ── Err ─► StartupFailed (units still run)
//!   ├─► phase = Running; spawn every registered unit
//!   │        register() while Running ──► spawned immediately
//!   ├─► barrier: tracker.close(); tracker.wait()
//!   ├─► phase = ShuttingDown (register() now rejected); wait stragglers
//!   ├─► AllUnitsDone; stop interrupt listener; stop coordinator (drains queued output)
//!   ├─► a unit panicked? ──► resume_unwind (shutdown hook skipped)
//!   ├─► shutdown hook(runtime)               ── Err ─► ShutdownFailed
//!   └─► first error of startup/shutdown
//! ```
//!
//! ## Interrupts
//! ```text
//! interrupt #1 ─► CancelRequested; ctx.cancel()       (advisory)
//! interrupt #2 ─► EscalationWarned; warning on Err    (lists pending units)
//! interrupt #3 ─► ForceExit; process::exit(code)      (hooks skipped)
//! ```
//!
//! ## Example
//! ```rust
//! use taskgate::{Config, Context, Runtime, TaskError, TaskHandle};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config { handle_signals: false, ..Config::default() };
//!     let rt = Runtime::new(cfg);
//!
//!     let h = rt
//!         .register("double", |_ctx: Context, _h: TaskHandle<u32, u32>, n: u32| async move {
//!             Ok::<_, TaskError>(n * 2)
//!         })
//!         .expect("fresh id");
//!     h.set_input(21);
//!
//!     rt.run().await?;
//!     assert_eq!(h.output(), Some(42));
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::panic;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::builder::RuntimeBuilder;
use super::config::Config;
use super::escalation::{Escalation, EscalationState, EscalationStep};
use super::handle::TaskHandle;
use super::shutdown::Interrupts;
use super::unit::{PanicPayload, Unit, UnitCell, UnitStatus, WorkFn};
use crate::console::{Console, IoClient, IoInbox, Stream, serve};
use crate::context::Context;
use crate::error::{RuntimeError, TaskError};
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Startup or shutdown hook.
pub(crate) type Hook =
    Box<dyn FnOnce(Arc<Runtime>) -> BoxFuture<'static, Result<(), TaskError>> + Send>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
    ShuttingDown,
}

struct RuntimeState {
    phase: Phase,
    order: Vec<Arc<str>>,
    units: HashMap<Arc<str>, Arc<dyn Unit>>,
    start_delay: Option<Duration>,
}

/// Everything `run` consumes. Taken by the first call.
pub(crate) struct RunParts {
    pub(crate) console: Box<dyn Console>,
    pub(crate) inbox: IoInbox,
    pub(crate) subscribers: Vec<Arc<dyn Subscribe>>,
    pub(crate) events: Option<broadcast::Receiver<Event>>,
    pub(crate) on_startup: Option<Hook>,
    pub(crate) on_shutdown: Option<Hook>,
}

/// Coordinates units of work sharing one context and one console.
pub struct Runtime {
    cfg: Config,
    ctx: Context,
    bus: Bus,
    io: IoClient,
    tracker: TaskTracker,
    state: Mutex<RuntimeState>,
    escalation: Mutex<Escalation>,
    next_id: AtomicU64,
    panicked: Arc<Mutex<Option<PanicPayload>>>,
    parts: Mutex<Option<RunParts>>,
}

impl Runtime {
    /// Starts building a runtime with `cfg`.
    pub fn builder(cfg: Config) -> RuntimeBuilder {
        RuntimeBuilder::new(cfg)
    }

    /// Builds a runtime on the process console with a fresh context and no hooks.
    pub fn new(cfg: Config) -> Arc<Self> {
        RuntimeBuilder::new(cfg).build()
    }

    pub(crate) fn new_internal(
        cfg: Config,
        ctx: Context,
        bus: Bus,
        io: IoClient,
        parts: RunParts,
    ) -> Self {
        let start_delay = cfg.start_delay();
        Self {
            cfg,
            ctx,
            bus,
            io,
            tracker: TaskTracker::new(),
            state: Mutex::new(RuntimeState {
                phase: Phase::Idle,
                order: Vec::new(),
                units: HashMap::new(),
                start_delay,
            }),
            escalation: Mutex::new(Escalation::new()),
            next_id: AtomicU64::new(1),
            panicked: Arc::new(Mutex::new(None)),
            parts: Mutex::new(Some(parts)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RuntimeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a unit of work and returns its handle.
    ///
    /// An empty `id` is replaced by `task-<n>`. Returns `None` (and publishes
    /// [`EventKind::UnitRejected`]) if the id is taken or shutdown has begun.
    /// While the runtime is running the unit starts immediately, after the start delay.
    ///
    /// The unit's input starts as `I::default()`; set it through the handle before the
    /// unit starts.
    pub fn register<I, O, F, Fut>(&self, id: impl Into<String>, f: F) -> Option<TaskHandle<I, O>>
    where
        I: Clone + Default + Send + 'static,
        O: Send + 'static,
        F: FnOnce(Context, TaskHandle<I, O>, I) -> Fut + Send + 'static,
        Fut: Future<Output = Result<O, TaskError>> + Send + 'static,
    {
        let mut id = id.into();
        let mut st = self.lock();

        if id.is_empty() {
            id = loop {
                let candidate = format!("task-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
                if !st.units.contains_key(candidate.as_str()) {
                    break candidate;
                }
            };
        }

        let rejected = if st.phase == Phase::ShuttingDown {
            Some("runtime shutting down")
        } else if st.units.contains_key(id.as_str()) {
            Some("duplicate id")
        } else {
            None
        };
        if let Some(reason) = rejected {
            drop(st);
            self.bus.publish(
                Event::new(EventKind::UnitRejected)
                    .with_task(id)
                    .with_reason(reason),
            );
            return None;
        }

        let id: Arc<str> = Arc::from(id);
        let work: WorkFn<I, O> = Box::new(move |ctx, handle, input| f(ctx, handle, input).boxed());
        let cell = Arc::new(UnitCell::new(Arc::clone(&id), work, self.io.clone()));
        let unit: Arc<dyn Unit> = cell.clone();

        st.order.push(Arc::clone(&id));
        st.units.insert(Arc::clone(&id), Arc::clone(&unit));
        if st.phase == Phase::Running {
            self.spawn_unit(unit, st.start_delay);
        }
        drop(st);

        self.bus
            .publish(Event::new(EventKind::UnitRegistered).with_task(id));
        Some(TaskHandle::from_cell(cell))
    }

    /// Typed handle of unit `id`; `None` if unknown or if `I`/`O` do not match.
    pub fn handle<I, O>(&self, id: &str) -> Option<TaskHandle<I, O>>
    where
        I: Send + 'static,
        O: Send + 'static,
    {
        let unit = self.lock().units.get(id).cloned()?;
        let cell = unit.into_any().downcast::<UnitCell<I, O>>().ok()?;
        Some(TaskHandle::from_cell(cell))
    }

    /// Unit ids in registration order.
    pub fn ids(&self) -> Vec<String> {
        self.lock().order.iter().map(|id| id.to_string()).collect()
    }

    /// Ids of units whose work function has not returned yet, in registration order.
    pub fn pending(&self) -> Vec<String> {
        let st = self.lock();
        st.order
            .iter()
            .filter(|id| {
                st.units
                    .get(*id)
                    .is_some_and(|u| u.status() != UnitStatus::Done)
            })
            .map(|id| id.to_string())
            .collect()
    }

    /// Every unit started from now on idles for `delay` before its work function runs.
    ///
    /// `Duration::ZERO` disables the delay.
    pub fn set_start_delay(&self, delay: Duration) {
        self.lock().start_delay = (!delay.is_zero()).then_some(delay);
    }

    /// Shared execution context handed to every unit.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Token cancelling the shared context.
    pub fn cancel_token(&self) -> CancellationToken {
        self.ctx.token().clone()
    }

    /// Current escalation state.
    pub fn escalation_state(&self) -> EscalationState {
        self.escalation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state()
    }

    /// Feeds one interrupt into the escalation machine, as if an OS interrupt arrived.
    ///
    /// The third call terminates the process with [`Config::force_exit_code`].
    pub fn interrupt(&self) {
        let step = self
            .escalation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .advance();
        self.bus.publish(Event::new(EventKind::InterruptReceived));

        match step {
            EscalationStep::Cancel => {
                self.bus.publish(Event::new(EventKind::CancelRequested));
                self.ctx.cancel();
            }
            EscalationStep::Warn => {
                let pending = self.pending().join(", ");
                self.io.write(
                    Stream::Err,
                    format!(
                        "interrupted again; still waiting for: {pending}; interrupt once more to exit immediately\n"
                    )
                    .into_bytes(),
                );
                self.bus
                    .publish(Event::new(EventKind::EscalationWarned).with_reason(pending));
            }
            EscalationStep::ForceExit => {
                self.bus.publish(Event::new(EventKind::ForceExit));
                std::process::exit(self.cfg.force_exit_code);
            }
        }
    }

    /// Runs every registered unit to completion.
    ///
    /// Returns the first error of the startup and shutdown hooks. Unit errors are not
    /// aggregated; read them from the handles. If a work function panicked, the panic is
    /// resumed here once every unit has returned and the shutdown hook is skipped.
    ///
    /// Only the first call runs anything; later calls return `Ok(())` at once.
    pub async fn run(self: &Arc<Self>) -> Result<(), RuntimeError> {
        let parts = self
            .parts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(RunParts {
            console,
            inbox,
            subscribers,
            events,
            on_startup,
            on_shutdown,
        }) = parts
        else {
            return Ok(());
        };

        let forwarder = events.map(|rx| self.forward_events(subscribers, rx));
        let coordinator = tokio::task::spawn_blocking(move || serve(console, inbox));
        let listener = self.listen_interrupts();

        let mut first_err = None;
        if let Some(hook) = on_startup {
            if let Err(e) = hook(Arc::clone(self)).await {
                self.bus
                    .publish(Event::new(EventKind::StartupFailed).with_reason(e.to_string()));
                first_err = Some(RuntimeError::Startup { source: e });
            }
        }

        self.start_registered();
        self.tracker.close();
        self.tracker.wait().await;
        self.lock().phase = Phase::ShuttingDown;
        self.tracker.wait().await;
        self.bus.publish(Event::new(EventKind::AllUnitsDone));

        if let Some(h) = listener {
            h.abort();
        }
        self.io.stop();
        let _ = coordinator.await;

        let panicked = self
            .panicked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(payload) = panicked {
            Self::finish_events(forwarder).await;
            panic::resume_unwind(payload);
        }

        if let Some(hook) = on_shutdown {
            if let Err(e) = hook(Arc::clone(self)).await {
                self.bus
                    .publish(Event::new(EventKind::ShutdownFailed).with_reason(e.to_string()));
                if first_err.is_none() {
                    first_err = Some(RuntimeError::Shutdown { source: e });
                }
            }
        }
        Self::finish_events(forwarder).await;

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Marks the runtime running and spawns every unit registered so far.
    fn start_registered(&self) {
        let (units, delay) = {
            let mut st = self.lock();
            st.phase = Phase::Running;
            let units: Vec<_> = st
                .order
                .iter()
                .filter_map(|id| st.units.get(id).cloned())
                .collect();
            (units, st.start_delay)
        };
        for unit in units {
            self.spawn_unit(unit, delay);
        }
    }

    /// Spawns `unit` on the completion barrier; a panic is parked for `run`.
    fn spawn_unit(&self, unit: Arc<dyn Unit>, delay: Option<Duration>) {
        let ctx = self.ctx.clone();
        let bus = self.bus.clone();
        let panicked = Arc::clone(&self.panicked);

        self.tracker.spawn(async move {
            if let Err(payload) = unit.run(ctx, delay, bus).await {
                let mut slot = panicked.lock().unwrap_or_else(PoisonError::into_inner);
                if slot.is_none() {
                    *slot = Some(payload);
                }
            }
        });
    }

    /// Installs the interrupt listener if configured.
    fn listen_interrupts(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if !self.cfg.handle_signals {
            return None;
        }
        let mut interrupts = match Interrupts::listen() {
            Ok(i) => i,
            Err(e) => {
                self.bus.publish(
                    Event::new(EventKind::StartupFailed)
                        .with_reason(format!("interrupt listener: {e}")),
                );
                return None;
            }
        };

        let rt = Arc::clone(self);
        Some(tokio::spawn(async move {
            while interrupts.recv().await.is_some() {
                rt.interrupt();
            }
        }))
    }

    /// Forwards bus events to the subscriber set until `stop` fires, then drains.
    fn forward_events(
        &self,
        subscribers: Vec<Arc<dyn Subscribe>>,
        mut rx: broadcast::Receiver<Event>,
    ) -> Forwarder {
        let set = SubscriberSet::new(subscribers, self.bus.clone());
        let stop = CancellationToken::new();
        let token = stop.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    ev = rx.recv() => match ev {
                        Ok(ev) => set.emit(&ev),
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => return set,
                    },
                    () = token.cancelled() => break,
                }
            }
            loop {
                match rx.try_recv() {
                    Ok(ev) => set.emit(&ev),
                    Err(TryRecvError::Lagged(_)) => continue,
                    Err(_) => return set,
                }
            }
        });
        Forwarder { stop, task }
    }

    async fn finish_events(forwarder: Option<Forwarder>) {
        let Some(Forwarder { stop, task }) = forwarder else {
            return;
        };
        stop.cancel();
        if let Ok(set) = task.await {
            set.shutdown().await;
        }
    }
}

struct Forwarder {
    stop: CancellationToken,
    task: JoinHandle<SubscriberSet>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::BufferConsole;
    use async_trait::async_trait;
    use std::io::Write;
    use std::sync::atomic::AtomicBool;
    use std::time::Instant;
    use tokio::time::sleep;

    fn quiet() -> Config {
        Config {
            handle_signals: false,
            ..Config::default()
        }
    }

    fn runtime(console: &BufferConsole) -> Arc<Runtime> {
        Runtime::builder(quiet())
            .with_console(console.clone())
            .build()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn run_waits_for_units_that_ignore_cancellation() {
        let console = BufferConsole::new();
        let rt = runtime(&console);
        let finished = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&finished);
        let h = rt
            .register("stubborn", move |ctx: Context, _h: TaskHandle<(), ()>, ()| async move {
                ctx.cancelled().await;
                sleep(Duration::from_millis(500)).await;
                flag.store(true, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();

        let trigger = Arc::clone(&rt);
        tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            trigger.interrupt();
        });

        let started = Instant::now();
        rt.run().await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(500));
        assert!(finished.load(Ordering::SeqCst));
        assert!(h.is_done());
        assert_eq!(rt.escalation_state(), EscalationState::Cancelling);
    }

    #[tokio::test]
    async fn registration_rules() {
        let console = BufferConsole::new();
        let rt = runtime(&console);
        let noop = |_: Context, _: TaskHandle<(), ()>, ()| async { Ok::<_, TaskError>(()) };

        let a = rt.register("", noop).unwrap();
        let b = rt.register("", noop).unwrap();
        assert_eq!(a.id(), "task-1");
        assert_eq!(b.id(), "task-2");

        assert!(rt.register("task-3", noop).is_some());
        assert!(rt.register("task-3", noop).is_none());
        let c = rt.register("", noop).unwrap();
        assert_eq!(c.id(), "task-4");

        assert_eq!(rt.ids(), vec!["task-1", "task-2", "task-3", "task-4"]);
        assert_eq!(rt.pending().len(), 4);

        rt.run().await.unwrap();
        assert!(rt.pending().is_empty());
        assert!(rt.register("late", noop).is_none());
        assert!(!rt.ids().contains(&"late".to_string()));
    }

    #[tokio::test]
    async fn units_registered_while_running_are_awaited() {
        let console = BufferConsole::new();
        let rt = runtime(&console);
        let child_ran = Arc::new(AtomicBool::new(false));

        let inner = Arc::clone(&rt);
        let flag = Arc::clone(&child_ran);
        rt.register("parent", move |_: Context, _: TaskHandle<(), ()>, ()| async move {
            let child = inner
                .register("child", move |_: Context, _: TaskHandle<(), ()>, ()| async move {
                    sleep(Duration::from_millis(100)).await;
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                })
                .ok_or_else(|| TaskError::fail("child rejected"))?;
            assert_eq!(child.id(), "child");
            Ok::<_, TaskError>(())
        })
        .unwrap();

        rt.run().await.unwrap();
        assert!(child_ran.load(Ordering::SeqCst));
        assert_eq!(rt.ids(), vec!["parent", "child"]);
    }

    #[tokio::test]
    async fn hooks_run_around_units() {
        let console = BufferConsole::new();
        let rt = Runtime::builder(quiet())
            .with_console(console.clone())
            .on_startup(|rt: Arc<Runtime>| async move {
                let h = rt
                    .register("from-startup", |_: Context, _: TaskHandle<u32, u32>, n: u32| async move {
                        Ok(n + 1)
                    })
                    .ok_or_else(|| TaskError::fail("rejected"))?;
                h.set_input(41);
                Ok::<_, TaskError>(())
            })
            .on_shutdown(|rt: Arc<Runtime>| async move {
                let h = rt
                    .handle::<u32, u32>("from-startup")
                    .ok_or_else(|| TaskError::fail("missing"))?;
                let seen: Result<(), TaskError> = match h.output() {
                    Some(42) => Err(TaskError::fail("saw 42")),
                    other => Err(TaskError::fail(format!("unexpected {other:?}"))),
                };
                seen
            })
            .build();

        let err = rt.run().await.unwrap_err();
        assert!(matches!(err, RuntimeError::Shutdown { .. }));
        assert_eq!(err.to_string(), "shutdown hook failed: execution failed: saw 42");
    }

    #[tokio::test]
    async fn startup_error_wins_and_units_still_run() {
        let console = BufferConsole::new();
        let rt = Runtime::builder(quiet())
            .with_console(console.clone())
            .on_startup(|_| async { Err(TaskError::fail("no config")) })
            .on_shutdown(|_| async { Err(TaskError::fail("also broken")) })
            .build();
        let h = rt
            .register("u", |_: Context, _: TaskHandle<(), u8>, ()| async { Ok(7) })
            .unwrap();

        let err = rt.run().await.unwrap_err();
        assert_eq!(err.as_label(), "runtime_startup");
        assert_eq!(h.output(), Some(7));
    }

    #[tokio::test]
    async fn unit_errors_stay_on_their_handles() {
        let console = BufferConsole::new();
        let rt = runtime(&console);
        let bad = rt
            .register("bad", |_: Context, _: TaskHandle<(), ()>, ()| async {
                Err(TaskError::fail("disk full"))
            })
            .unwrap();
        let good = rt
            .register("good", |_: Context, _: TaskHandle<(), ()>, ()| async { Ok(()) })
            .unwrap();

        rt.run().await.unwrap();
        assert_eq!(bad.error(), Some(TaskError::fail("disk full")));
        assert_eq!(bad.output(), None);
        assert_eq!(good.error(), None);
        assert_eq!(good.output(), Some(()));
    }

    #[tokio::test]
    async fn start_delay_defers_every_unit() {
        let console = BufferConsole::new();
        let rt = runtime(&console);
        rt.set_start_delay(Duration::from_millis(100));
        rt.register("u", |_: Context, _: TaskHandle<(), ()>, ()| async { Ok(()) })
            .unwrap();

        let started = Instant::now();
        rt.run().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn console_writes_never_interleave() {
        let console = BufferConsole::new();
        let rt = runtime(&console);

        for u in 0..8 {
            rt.register(format!("w{u}"), move |_: Context, h: TaskHandle<(), ()>, ()| async move {
                for line in 0..50 {
                    h.print(Stream::Out, format_args!("unit {u} line {line:02} ok\n"));
                    if line % 10 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
                let mut w = h.writer(Stream::Err);
                writeln!(w, "unit {u} done")?;
                h.write(Stream::Err, b"".to_vec());
                Ok::<_, TaskError>(())
            })
            .unwrap();
        }

        rt.run().await.unwrap();

        let out = console.out();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 400);
        assert!(
            lines
                .iter()
                .all(|l| l.starts_with("unit ") && l.ends_with(" ok"))
        );
        assert_eq!(console.err().lines().count(), 8);
    }

    #[tokio::test]
    async fn secrets_are_answered_by_the_coordinator() {
        let console = BufferConsole::with_secrets(["hunter2"]);
        let rt = runtime(&console);
        let h = rt
            .register("login", |_: Context, h: TaskHandle<(), String>, ()| async move {
                h.secret("password for s3").await
            })
            .unwrap();
        let missing = rt
            .register("second", |_: Context, h: TaskHandle<(), String>, ()| async move {
                sleep(Duration::from_millis(20)).await;
                h.secret("").await
            })
            .unwrap();

        rt.run().await.unwrap();
        assert_eq!(h.output().as_deref(), Some("hunter2"));
        assert_eq!(missing.error().map(|e| e.as_label()), Some("task_io"));
        assert_eq!(console.prompts(), vec!["password for s3", "second secret"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn second_interrupt_warns_about_pending_units() {
        let console = BufferConsole::new();
        let rt = runtime(&console);
        rt.register("slow-sync", |ctx: Context, _: TaskHandle<(), ()>, ()| async move {
            ctx.cancelled().await;
            sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .unwrap();

        let trigger = Arc::clone(&rt);
        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            trigger.interrupt();
            trigger.interrupt();
        });

        rt.run().await.unwrap();
        assert_eq!(rt.escalation_state(), EscalationState::Escalated);
        let err = console.err();
        assert!(err.contains("slow-sync"), "{err}");
        assert!(err.contains("interrupt once more"));
    }

    #[tokio::test]
    async fn typed_lookup() {
        let console = BufferConsole::new();
        let rt = runtime(&console);
        rt.register("a", |_: Context, _: TaskHandle<u32, String>, n: u32| async move {
            Ok(n.to_string())
        })
        .unwrap();

        let h = rt.handle::<u32, String>("a").unwrap();
        h.set_input(5);
        assert_eq!(h.input(), 5);
        assert!(rt.handle::<String, String>("a").is_none());
        assert!(rt.handle::<u32, String>("b").is_none());

        rt.run().await.unwrap();
        assert_eq!(h.output().as_deref(), Some("5"));
    }

    #[tokio::test]
    #[should_panic(expected = "work exploded")]
    async fn work_panics_are_resumed_after_the_barrier() {
        let console = BufferConsole::new();
        let rt = runtime(&console);
        rt.register("boom", |_: Context, _: TaskHandle<(), ()>, ()| async {
            let explode = true;
            if explode {
                panic!("work exploded");
            }
            Ok(())
        })
        .unwrap();
        rt.register("calm", |_: Context, _: TaskHandle<(), ()>, ()| async {
            sleep(Duration::from_millis(50)).await;
            Ok(())
        })
        .unwrap();

        let _ = rt.run().await;
    }

    struct Recorder(Arc<Mutex<Vec<EventKind>>>);

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, ev: &Event) {
            self.0.lock().unwrap().push(ev.kind);
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    #[tokio::test]
    async fn lifecycle_events_reach_subscribers() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let console = BufferConsole::new();
        let rt = Runtime::builder(quiet())
            .with_console(console.clone())
            .with_subscribers(vec![Arc::new(Recorder(Arc::clone(&seen)))])
            .build();

        rt.register("ok", |_: Context, _: TaskHandle<(), ()>, ()| async { Ok(()) })
            .unwrap();
        let dup = rt.register("ok", |_: Context, _: TaskHandle<(), ()>, ()| async { Ok(()) });
        assert!(dup.is_none());
        rt.register("bad", |_: Context, _: TaskHandle<(), ()>, ()| async {
            Err(TaskError::Canceled)
        })
        .unwrap();
        rt.run().await.unwrap();

        let seen = seen.lock().unwrap().clone();
        let count = |k: EventKind| seen.iter().filter(|&&e| e == k).count();
        assert_eq!(count(EventKind::UnitRegistered), 2);
        assert_eq!(count(EventKind::UnitRejected), 1);
        assert_eq!(count(EventKind::UnitStarting), 2);
        assert_eq!(count(EventKind::UnitFinished), 1);
        assert_eq!(count(EventKind::UnitFailed), 1);
        assert_eq!(seen.last(), Some(&EventKind::AllUnitsDone));
    }

    #[tokio::test]
    async fn second_run_is_a_no_op() {
        let console = BufferConsole::new();
        let rt = runtime(&console);
        rt.register("once", |_: Context, h: TaskHandle<(), ()>, ()| async move {
            h.print(Stream::Out, "ran\n");
            Ok(())
        })
        .unwrap();

        rt.run().await.unwrap();
        rt.run().await.unwrap();
        assert_eq!(console.out(), "ran\n");
    }
}
