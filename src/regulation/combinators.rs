//! # Regulated fan-out combinators.
//!
//! Generic helpers that optionally take a named permit from the [`Regulators`](super::Regulators)
//! attached to a [`Context`] before running a function.
//!
//! ```text
//! regulated(ctx, "s3", f, x)
//!   ├─ capacity("s3") == 0 ──► f(ctx, x)
//!   └─ capacity("s3") >  0 ──► select { permit ─► f(ctx, x) ─► release,
//!                                       ctx.cancelled() ─► None }
//!
//! parallelize(ctx, "s3", f, [x1..xn])
//!   ├─ no registry / parallel off ─► f(x1); f(x2); ... (input order)
//!   └─ otherwise ─► JoinSet{ regulated(f, xi) } ─► join_next ... (completion order)
//!
//! launch_and_wait(ctx, [job1..jobn])
//!   └─ JoinSet{ (i, regulated(job_i)) } ─► slot[i] (input order)
//! ```
//!
//! ## Rules
//! - Waiters for a permit are not served in FIFO order.
//! - A permit is always returned, including when `f` panics.
//! - A panic inside a spawned call is re-raised in the caller.

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::task::{JoinError, JoinSet};

use crate::context::Context;

/// Runs `f(ctx, input)` under the permit queue registered as `name`.
///
/// Returns `None` only when the context is cancelled before a permit was obtained
/// (or the permit queue was closed). Unregulated names call `f` directly.
///
/// # Example
/// ```rust
/// use taskgate::{Context, regulated};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let ctx = Context::new().with_capacities([("s3", 4)]);
/// let len = regulated(&ctx, "s3", |_ctx, key: &str| async move { key.len() }, "a/b/c").await;
/// assert_eq!(len, Some(5));
/// # }
/// ```
pub async fn regulated<I, O, F, Fut>(ctx: &Context, name: &str, f: F, input: I) -> Option<O>
where
    F: FnOnce(Context, I) -> Fut,
    Fut: Future<Output = O>,
{
    let Some(permits) = ctx.regulators().and_then(|r| r.permits(name)).cloned() else {
        return Some(f(ctx.clone(), input).await);
    };

    let permit_future = permits.acquire_owned();
    tokio::pin!(permit_future);

    let _permit = tokio::select! {
        res = &mut permit_future => match res {
            Ok(permit) => permit,
            Err(_closed) => return None,
        },
        _ = ctx.cancelled() => return None,
    };

    Some(f(ctx.clone(), input).await)
}

/// Runs `f` once per input.
///
/// Without a registry on `ctx`, or with parallelism disabled, calls run one after another
/// and the output follows input order. Otherwise every call is spawned, regulated under
/// `name`, and outputs are returned **in completion order**; results that complete after
/// the context was cancelled are dropped.
pub async fn parallelize<I, O, F, Fut>(
    ctx: &Context,
    name: &str,
    f: F,
    inputs: impl IntoIterator<Item = I>,
) -> Vec<O>
where
    F: Fn(Context, I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = O> + Send + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    let inputs: Vec<I> = inputs.into_iter().collect();

    if ctx.regulators().is_none() || !ctx.is_parallel() {
        let mut out = Vec::with_capacity(inputs.len());
        for input in inputs {
            out.push(f(ctx.clone(), input).await);
        }
        return out;
    }

    let f = Arc::new(f);
    let name: Arc<str> = Arc::from(name);
    let mut set = JoinSet::new();
    for input in inputs {
        let ctx = ctx.clone();
        let f = Arc::clone(&f);
        let name = Arc::clone(&name);
        set.spawn(async move { regulated(&ctx, &name, move |c, i| (*f)(c, i), input).await });
    }

    let mut out = Vec::with_capacity(set.len());
    while let Some(joined) = set.join_next().await {
        match joined.map_err(reraise_panic) {
            Ok(Some(o)) if !ctx.is_cancelled() => out.push(o),
            _ => {}
        }
    }
    out
}

/// One `(name, function, input)` triple for [`launch_and_wait`].
pub struct Job<I, O> {
    name: String,
    f: Box<dyn FnOnce(Context, I) -> BoxFuture<'static, O> + Send>,
    input: I,
}

impl<I, O> Job<I, O> {
    /// Creates a job regulated under `name` (use `""` for no regulation).
    pub fn new<F, Fut>(name: impl Into<String>, f: F, input: I) -> Self
    where
        F: FnOnce(Context, I) -> Fut + Send + 'static,
        Fut: Future<Output = O> + Send + 'static,
    {
        Self {
            name: name.into(),
            f: Box::new(move |ctx, input| f(ctx, input).boxed()),
            input,
        }
    }

    /// Regulator name of this job.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Runs a fixed list of heterogeneous jobs concurrently and returns one slot per job,
/// **in input order**. A slot is `None` when its job was cancelled before obtaining a permit.
pub async fn launch_and_wait<I, O>(ctx: &Context, jobs: Vec<Job<I, O>>) -> Vec<Option<O>>
where
    I: Send + 'static,
    O: Send + 'static,
{
    let mut slots: Vec<Option<O>> = std::iter::repeat_with(|| None).take(jobs.len()).collect();

    let mut set = JoinSet::new();
    for (idx, job) in jobs.into_iter().enumerate() {
        let ctx = ctx.clone();
        set.spawn(async move {
            let Job { name, f, input } = job;
            (idx, regulated(&ctx, &name, f, input).await)
        });
    }

    while let Some(joined) = set.join_next().await {
        if let Ok((idx, out)) = joined.map_err(reraise_panic) {
            slots[idx] = out;
        }
    }
    slots
}

fn reraise_panic(err: JoinError) -> JoinError {
    if err.is_panic() {
        std::panic::resume_unwind(err.into_panic());
    }
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    async fn nap(_ctx: Context, ms: u64) -> u64 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        ms
    }

    #[tokio::test]
    async fn capacity_one_serializes_calls() {
        let ctx = Context::new().with_capacities([("b", 1)]);
        let started = Instant::now();

        let (a, b) = tokio::join!(
            regulated(&ctx, "b", nap, 100),
            regulated(&ctx, "b", nap, 100),
        );

        assert_eq!((a, b), (Some(100), Some(100)));
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn capacity_two_overlaps_two_of_three() {
        let ctx = Context::new().with_capacities([("c", 2)]);
        let started = Instant::now();

        let (a, b, c) = tokio::join!(
            regulated(&ctx, "c", nap, 100),
            regulated(&ctx, "c", nap, 100),
            regulated(&ctx, "c", nap, 100),
        );

        let elapsed = started.elapsed();
        assert!(a.is_some() && b.is_some() && c.is_some());
        assert!(elapsed >= Duration::from_millis(200), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(300), "{elapsed:?}");
    }

    #[tokio::test]
    async fn unregulated_names_run_immediately() {
        let ctx = Context::new().with_capacities([("b", 1)]);
        let started = Instant::now();

        let (a, b) = tokio::join!(
            regulated(&ctx, "", nap, 100),
            regulated(&ctx, "never-configured", nap, 100),
        );

        assert_eq!((a, b), (Some(100), Some(100)));
        assert!(started.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn cancellation_while_waiting_returns_none() {
        let ctx = Context::new().with_capacities([("b", 1)]);
        let holder = ctx.clone();
        let hold = tokio::spawn(async move { regulated(&holder, "b", nap, 300).await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let waiter = ctx.clone();
        let wait = tokio::spawn(async move { regulated(&waiter, "b", nap, 10).await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let started = Instant::now();
        ctx.cancel();
        assert_eq!(wait.await.unwrap(), None);
        assert!(started.elapsed() < Duration::from_millis(100));
        assert_eq!(hold.await.unwrap(), Some(300));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn regulated_calls_never_exceed_capacity() {
        let ctx = Context::new().with_capacities([("s3", 3)]);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (a, p) = (active.clone(), peak.clone());
        let out = parallelize(
            &ctx,
            "s3",
            move |_ctx, i: usize| {
                let (active, peak) = (a.clone(), p.clone());
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    i
                }
            },
            0..12,
        )
        .await;

        assert_eq!(out.len(), 12);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn sequential_parallelize_keeps_input_order() {
        let no_registry = Context::new();
        let disabled = Context::new()
            .with_capacities([("s3", 4)])
            .with_parallelism(false);

        for ctx in [no_registry, disabled] {
            let out = parallelize(&ctx, "s3", nap, [30, 10, 20]).await;
            assert_eq!(out, vec![30, 10, 20]);
        }
    }

    #[tokio::test]
    async fn parallel_parallelize_returns_completion_order() {
        let ctx = Context::new().with_capacities([("s3", 0)]);
        let inputs = [90, 10, 50];

        let out = parallelize(&ctx, "s3", nap, inputs).await;
        assert_eq!(out, vec![10, 50, 90]);

        let mut sequential = parallelize(&ctx.clone().with_parallelism(false), "s3", nap, inputs).await;
        let mut parallel = out;
        sequential.sort_unstable();
        parallel.sort_unstable();
        assert_eq!(sequential, parallel);
    }

    #[tokio::test]
    async fn parallelize_drops_results_after_cancellation() {
        let ctx = Context::new().with_capacities([("s3", 4)]);
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            canceller.cancel();
        });

        let out = parallelize(&ctx, "s3", nap, [10, 100, 100, 100]).await;
        assert_eq!(out, vec![10]);
    }

    #[tokio::test]
    async fn launch_and_wait_keeps_positions() {
        let ctx = Context::new().with_capacities([("slow", 1)]);
        let jobs = vec![
            Job::new("slow", |_ctx, ms: u64| async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                format!("slow-{ms}")
            }, 80),
            Job::new("", |_ctx, ms: u64| async move { format!("fast-{ms}") }, 1),
            Job::new("slow", |_ctx, ms: u64| async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                format!("slow-{ms}")
            }, 20),
        ];
        assert_eq!(jobs[0].name(), "slow");

        let out = launch_and_wait(&ctx, jobs).await;
        assert_eq!(
            out,
            vec![
                Some("slow-80".to_string()),
                Some("fast-1".to_string()),
                Some("slow-20".to_string()),
            ]
        );
    }

    #[tokio::test]
    #[should_panic(expected = "listing failed")]
    async fn panics_in_spawned_calls_reach_the_caller() {
        let ctx = Context::new().with_capacities([("s3", 2)]);
        let _ = parallelize(
            &ctx,
            "s3",
            |_ctx, i: u32| async move {
                if i == 1 {
                    panic!("listing failed");
                }
                i
            },
            0..3,
        )
        .await;
    }
}
