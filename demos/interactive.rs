//! # Example: interactive
//!
//! Several units share the terminal: one asks for a password while the others keep
//! printing progress. Press Ctrl-C to watch the escalation steps.
//!
//! Demonstrates how to:
//! - Prompt for a secret with [`TaskHandle::secret`] without corrupting other output.
//! - Write through [`TaskHandle::writer`] with `std::io::Write`.
//! - Observe runtime events with [`LogWriter`].
//! - Cooperate with cancellation through the shared [`Context`].
//!
//! ## Flow
//! ```text
//! Ctrl-C #1 ─► context cancelled; tickers wind down (slowly)
//! Ctrl-C #2 ─► warning naming the units still running
//! Ctrl-C #3 ─► process exits with status 130
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example interactive --features logging
//! ```

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use taskgate::{
    Config, Context, LogWriter, Runtime, Stream, Subscribe, TaskError, TaskHandle,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let rt = Runtime::builder(Config::default())
        .with_subscribers(subs)
        .on_shutdown(|rt: Arc<Runtime>| async move {
            let login = rt
                .handle::<(), usize>("login")
                .ok_or_else(|| TaskError::fail("login unit missing"))?;
            login.error().map_or(Ok::<_, TaskError>(()), Err)
        })
        .build();
    rt.set_start_delay(Duration::from_millis(200));

    rt.register("login", |_ctx: Context, h: TaskHandle<(), usize>, ()| async move {
        let password = h.secret("remote password").await?;
        h.print(Stream::Out, format_args!("[login] got {} characters\n", password.len()));
        Ok::<_, TaskError>(password.len())
    })
    .ok_or_else(|| anyhow::anyhow!("login rejected"))?;

    for n in 1..=2u64 {
        rt.register(format!("ticker-{n}"), move |ctx: Context, h: TaskHandle<(), ()>, ()| async move {
            let mut out = h.writer(Stream::Out);
            let mut tick = 0;
            while !ctx.is_cancelled() && tick < 20 {
                tick += 1;
                writeln!(out, "[ticker-{n}] tick {tick}")?;
                tokio::time::sleep(Duration::from_millis(500 * n)).await;
            }
            writeln!(out, "[ticker-{n}] winding down")?;
            tokio::time::sleep(Duration::from_secs(3)).await;
            Ok::<_, TaskError>(())
        })
        .ok_or_else(|| anyhow::anyhow!("ticker rejected"))?;
    }

    rt.run().await?;
    Ok(())
}
