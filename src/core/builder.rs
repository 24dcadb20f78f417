use std::sync::Arc;

use futures::FutureExt;

use super::config::Config;
use super::runtime::{Hook, RunParts, Runtime};
use crate::console::{Console, IoClient, TerminalConsole};
use crate::context::Context;
use crate::error::TaskError;
use crate::events::Bus;
use crate::subscribers::Subscribe;

/// Builder for a [`Runtime`] with optional context, console, subscribers and hooks.
pub struct RuntimeBuilder {
    cfg: Config,
    ctx: Option<Context>,
    console: Option<Box<dyn Console>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    on_startup: Option<Hook>,
    on_shutdown: Option<Hook>,
}

impl RuntimeBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            ctx: None,
            console: None,
            subscribers: Vec::new(),
            on_startup: None,
            on_shutdown: None,
        }
    }

    /// Shares `ctx` with every unit instead of a fresh [`Context`].
    ///
    /// Attach the regulation registry here; interrupts cancel this context.
    pub fn with_context(mut self, ctx: Context) -> Self {
        self.ctx = Some(ctx);
        self
    }

    /// Replaces the process console ([`TerminalConsole`]).
    pub fn with_console(mut self, console: impl Console) -> Self {
        self.console = Some(Box::new(console));
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (registration, unit lifecycle, interrupts)
    /// through dedicated workers with bounded queues. Events published before `run`
    /// are buffered up to [`Config::bus_capacity`].
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Runs `hook` at the start of `run`, before any unit starts.
    ///
    /// Units registered from the hook start together with the others.
    pub fn on_startup<F, Fut>(mut self, hook: F) -> Self
    where
        F: FnOnce(Arc<Runtime>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        self.on_startup = Some(Box::new(move |rt| hook(rt).boxed()));
        self
    }

    /// Runs `hook` after every unit has returned and the console coordinator stopped.
    pub fn on_shutdown<F, Fut>(mut self, hook: F) -> Self
    where
        F: FnOnce(Arc<Runtime>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        self.on_shutdown = Some(Box::new(move |rt| hook(rt).boxed()));
        self
    }

    /// Builds and returns the Runtime instance.
    ///
    /// Does not need a tokio runtime; workers and the coordinator start in `run`.
    pub fn build(self) -> Arc<Runtime> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let events = (!self.subscribers.is_empty()).then(|| bus.subscribe());
        let (io, inbox) = IoClient::channel();

        let parts = RunParts {
            console: self
                .console
                .unwrap_or_else(|| Box::new(TerminalConsole::new())),
            inbox,
            subscribers: self.subscribers,
            events,
            on_startup: self.on_startup,
            on_shutdown: self.on_shutdown,
        };
        let ctx = self.ctx.unwrap_or_default();

        Arc::new(Runtime::new_internal(self.cfg, ctx, bus, io, parts))
    }
}
