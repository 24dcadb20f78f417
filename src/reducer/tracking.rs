//! Bookkeeping shared by both reducer strategies.

use std::fmt;
use std::io::Write;
use std::sync::{Mutex, PoisonError};

use tokio::sync::watch;

/// Optional trace writer.
#[derive(Default)]
pub(super) struct DebugSink {
    writer: Mutex<Option<Box<dyn Write + Send>>>,
}

impl DebugSink {
    pub(super) fn set(&self, sink: Box<dyn Write + Send>) {
        *self.writer.lock().unwrap_or_else(PoisonError::into_inner) = Some(sink);
    }

    /// Writes one line; trace failures are ignored.
    pub(super) fn trace(&self, args: fmt::Arguments<'_>) {
        let mut guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(w) = guard.as_mut() {
            let _ = writeln!(w, "{args}");
        }
    }
}

/// Counts `launch` calls that have not returned yet.
pub(super) struct Outstanding {
    tx: watch::Sender<usize>,
}

impl Outstanding {
    pub(super) fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx }
    }

    /// Counts the caller until the returned guard drops.
    pub(super) fn enter(&self) -> OutstandingGuard<'_> {
        self.tx.send_modify(|n| *n += 1);
        OutstandingGuard { tx: &self.tx }
    }

    /// Completes once no call is outstanding.
    pub(super) async fn drained(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

pub(super) struct OutstandingGuard<'a> {
    tx: &'a watch::Sender<usize>,
}

impl Drop for OutstandingGuard<'_> {
    fn drop(&mut self) {
        self.tx.send_modify(|n| *n = n.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn drained_waits_for_every_guard() {
        let outstanding = Outstanding::new();
        let a = outstanding.enter();
        let b = outstanding.enter();

        drop(a);
        let still_waiting =
            tokio::time::timeout(Duration::from_millis(20), outstanding.drained()).await;
        assert!(still_waiting.is_err());

        drop(b);
        outstanding.drained().await;
    }
}
