//! # Example: fanout
//!
//! A pretend sync job that stats, uploads and deletes a batch of storage objects.
//!
//! Demonstrates how to:
//! - Attach a [`Regulators`] registry to the shared [`Context`].
//! - Fan out with [`parallelize`] (completion order) and [`launch_and_wait`] (input order).
//! - Throttle bursty uploads with an exact [`ReducerKind::Scheduled`] reducer.
//! - Read per-unit results and errors from [`TaskHandle`]s after `run`.
//!
//! ## Flow
//! ```text
//! Runtime::run()
//!   ├─► unit "stat"    ── parallelize("head", keys)        (≤ 4 HEAD calls at once)
//!   ├─► unit "upload"  ── reducer.launch("put:<key>", ..)  (≤ 2 PUT calls at once)
//!   └─► unit "cleanup" ── launch_and_wait([list, delete])  (slots in input order)
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example fanout
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use taskgate::reducer::{self, ReducerKind};
use taskgate::{
    Config, Context, Job, Runtime, Stream, TaskError, TaskHandle, launch_and_wait, parallelize,
};

fn keys(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("photos/{i:03}.jpg")).collect()
}

async fn head(key: String) -> (String, u64) {
    tokio::time::sleep(Duration::from_millis(40)).await;
    let size = key.len() as u64 * 1024;
    (key, size)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let ctx = Context::new().with_capacities([("head", 4), ("delete", 1)]);
    let rt = Runtime::builder(Config::default())
        .with_context(ctx)
        .build();

    let stat = rt
        .register("stat", |ctx: Context, h: TaskHandle<Vec<String>, u64>, keys| async move {
            let sizes = parallelize(&ctx, "head", |_ctx, key: String| head(key), keys).await;
            for (key, size) in &sizes {
                h.print(Stream::Out, format_args!("[stat] {key} {size}B\n"));
            }
            Ok::<_, TaskError>(sizes.iter().map(|(_, s)| s).sum::<u64>())
        })
        .ok_or_else(|| anyhow::anyhow!("stat rejected"))?;
    stat.set_input(keys(12));

    let upload = rt
        .register("upload", |_ctx: Context, h: TaskHandle<Vec<String>, usize>, keys| async move {
            let puts = reducer::new(2, ReducerKind::Scheduled);
            let mut launches = Vec::new();
            for key in keys {
                let puts = Arc::clone(&puts);
                let h = h.clone();
                launches.push(tokio::spawn(async move {
                    let label = format!("put:{key}");
                    let work = async {
                        tokio::time::sleep(Duration::from_millis(60)).await;
                        h.print(Stream::Out, format_args!("[upload] {key}\n"));
                        Ok(())
                    };
                    puts.launch(&label, work.boxed()).await
                }));
            }

            let mut uploaded = 0;
            for launch in launches {
                match launch.await {
                    Ok(Ok(())) => uploaded += 1,
                    Ok(Err(e)) => h.print(Stream::Err, format_args!("[upload] {e}\n")),
                    Err(e) => return Err(TaskError::fail(e)),
                }
            }
            puts.close().await.map_err(TaskError::fail)?;
            Ok::<_, TaskError>(uploaded)
        })
        .ok_or_else(|| anyhow::anyhow!("upload rejected"))?;
    upload.set_input(keys(6));

    let cleanup = rt
        .register("cleanup", |ctx: Context, _h: TaskHandle<(), Vec<String>>, ()| async move {
            let jobs = vec![
                Job::new("", |_ctx, prefix: &'static str| async move {
                    format!("listed {prefix}")
                }, "tmp/"),
                Job::new("delete", |_ctx, prefix| async move {
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    format!("deleted {prefix}")
                }, "tmp/old/"),
            ];
            let slots = launch_and_wait(&ctx, jobs).await;
            if ctx.is_cancelled() {
                return Err(TaskError::Canceled);
            }
            Ok::<_, TaskError>(slots.into_iter().flatten().collect::<Vec<_>>())
        })
        .ok_or_else(|| anyhow::anyhow!("cleanup rejected"))?;

    rt.run().await?;

    println!("total bytes: {:?}", stat.output());
    println!("uploaded:    {:?}", upload.output());
    match cleanup.error() {
        Some(e) => println!("cleanup:     {e}"),
        None => println!("cleanup:     {:?}", cleanup.output()),
    }
    Ok(())
}
