//! # Units of work.
//!
//! A [`UnitCell`] stores one unit's identity, work function, input, output and error.
//! The runtime keeps cells of different `I`/`O` types side by side behind the object-safe
//! [`Unit`] trait and recovers the typed cell through `Any` when a handle is requested.

use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::context::Context;
use crate::core::handle::TaskHandle;
use crate::core::runner;
use crate::console::IoClient;
use crate::error::TaskError;
use crate::events::Bus;

/// Panic payload carried from a unit back to `Runtime::run`.
pub(crate) type PanicPayload = Box<dyn Any + Send + 'static>;

/// Boxed work function of a unit.
pub(crate) type WorkFn<I, O> = Box<
    dyn FnOnce(Context, TaskHandle<I, O>, I) -> BoxFuture<'static, Result<O, TaskError>> + Send,
>;

/// Lifecycle of a unit of work.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitStatus {
    /// Registered; the runtime has not started it yet.
    Registered,
    /// Started; idling for the start delay.
    Delayed,
    /// Work function running.
    Running,
    /// Work function returned (or panicked).
    Done,
}

/// Type-erased view of a unit used by the runtime.
pub(crate) trait Unit: Send + Sync + 'static {
    fn id(&self) -> &str;

    fn status(&self) -> UnitStatus;

    /// Idles for `delay`, runs the work function once and stores its result.
    fn run(
        self: Arc<Self>,
        ctx: Context,
        delay: Option<Duration>,
        bus: Bus,
    ) -> BoxFuture<'static, Result<(), PanicPayload>>;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Storage for one unit of work.
pub(crate) struct UnitCell<I, O> {
    pub(crate) id: Arc<str>,
    pub(crate) io: IoClient,
    work: Mutex<Option<WorkFn<I, O>>>,
    state: Mutex<UnitState<I, O>>,
}

struct UnitState<I, O> {
    input: I,
    output: Option<O>,
    error: Option<TaskError>,
    status: UnitStatus,
}

impl<I: Default, O> UnitCell<I, O> {
    pub(crate) fn new(id: Arc<str>, work: WorkFn<I, O>, io: IoClient) -> Self {
        Self {
            id,
            io,
            work: Mutex::new(Some(work)),
            state: Mutex::new(UnitState {
                input: I::default(),
                output: None,
                error: None,
                status: UnitStatus::Registered,
            }),
        }
    }
}

impl<I, O> UnitCell<I, O> {
    fn lock(&self) -> MutexGuard<'_, UnitState<I, O>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes the work function; `None` if the unit already ran.
    pub(crate) fn take_work(&self) -> Option<WorkFn<I, O>> {
        self.work
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub(crate) fn status(&self) -> UnitStatus {
        self.lock().status
    }

    pub(crate) fn set_status(&self, status: UnitStatus) {
        self.lock().status = status;
    }

    pub(crate) fn set_input(&self, input: I) {
        self.lock().input = input;
    }

    pub(crate) fn finish(&self, output: Option<O>, error: Option<TaskError>) {
        let mut st = self.lock();
        st.output = output;
        st.error = error;
        st.status = UnitStatus::Done;
    }

    pub(crate) fn error(&self) -> Option<TaskError> {
        self.lock().error.clone()
    }
}

impl<I: Clone, O> UnitCell<I, O> {
    pub(crate) fn input(&self) -> I {
        self.lock().input.clone()
    }
}

impl<I, O: Clone> UnitCell<I, O> {
    pub(crate) fn output(&self) -> Option<O> {
        self.lock().output.clone()
    }
}

impl<I, O> Unit for UnitCell<I, O>
where
    I: Clone + Send + 'static,
    O: Send + 'static,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> UnitStatus {
        UnitCell::status(self)
    }

    fn run(
        self: Arc<Self>,
        ctx: Context,
        delay: Option<Duration>,
        bus: Bus,
    ) -> BoxFuture<'static, Result<(), PanicPayload>> {
        runner::run_unit(self, ctx, delay, bus).boxed()
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
