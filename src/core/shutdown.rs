//! # Cross-platform OS interrupt source.
//!
//! Unlike a one-shot shutdown wait, [`Interrupts`] keeps its listeners installed so that
//! every repeated interrupt is observed; the runtime counts them for escalation.
//!
//! ## Signals
//! **Unix platforms:**
//! - `SIGINT` (Ctrl-C in terminal)
//! - `SIGTERM` (default kill signal, used by systemd/Kubernetes)
//!
//! **Windows platforms:**
//! - `Ctrl-C` via [`tokio::signal::windows::ctrl_c`]

/// Persistent interrupt listeners.
#[cfg(unix)]
pub(crate) struct Interrupts {
    sigint: tokio::signal::unix::Signal,
    sigterm: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Interrupts {
    /// Installs the listeners. Fails if signal registration fails.
    pub(crate) fn listen() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
        })
    }

    /// Waits for the next interrupt; `None` once the signal driver is gone.
    pub(crate) async fn recv(&mut self) -> Option<()> {
        tokio::select! {
            r = self.sigint.recv()  => r,
            r = self.sigterm.recv() => r,
        }
    }
}

/// Persistent interrupt listeners.
#[cfg(not(unix))]
pub(crate) struct Interrupts {
    ctrl_c: tokio::signal::windows::CtrlC,
}

#[cfg(not(unix))]
impl Interrupts {
    /// Installs the listener. Fails if signal registration fails.
    pub(crate) fn listen() -> std::io::Result<Self> {
        Ok(Self {
            ctrl_c: tokio::signal::windows::ctrl_c()?,
        })
    }

    /// Waits for the next interrupt; `None` once the signal driver is gone.
    pub(crate) async fn recv(&mut self) -> Option<()> {
        self.ctrl_c.recv().await
    }
}
