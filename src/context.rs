//! # Shared, cancellable execution context.
//!
//! A [`Context`] is what every unit of work, fan-out call and hook receives. It bundles:
//! - a [`CancellationToken`] (advisory cancellation; work must observe it),
//! - the optional [`Regulators`] table used by the regulated combinators,
//! - the `parallel` switch that lets [`parallelize`](crate::parallelize) fall back to
//!   sequential, order-preserving execution.
//!
//! Contexts are cheap to clone; clones share the token and the registry.
//!
//! ## Example
//! ```rust
//! use taskgate::Context;
//!
//! let ctx = Context::new().with_capacities([("s3", 8), ("local", 2)]);
//! assert_eq!(ctx.regulators().map(|r| r.capacity("s3")), Some(8));
//!
//! let child = ctx.child();
//! child.cancel();
//! assert!(child.is_cancelled());
//! assert!(!ctx.is_cancelled());
//! ```

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::regulation::Regulators;

/// Cancellable context carried through the runtime and the combinators.
#[derive(Clone, Debug)]
pub struct Context {
    token: CancellationToken,
    regulators: Option<Arc<Regulators>>,
    parallel: bool,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Creates a fresh, uncancelled context with no registry and parallelism enabled.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            regulators: None,
            parallel: true,
        }
    }

    /// Wraps an existing token (for embedding under a caller-owned cancellation tree).
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            ..Self::new()
        }
    }

    /// Attaches a regulation registry.
    pub fn with_regulators(mut self, regulators: Regulators) -> Self {
        self.regulators = Some(Arc::new(regulators));
        self
    }

    /// Builds a registry from a capacity table and attaches it.
    pub fn with_capacities<I, S>(self, table: I) -> Self
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        self.with_regulators(Regulators::new(table))
    }

    /// Enables or disables parallel fan-out for everything reached from this context.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Derives a child context: cancelled with the parent, but cancelling it leaves
    /// the parent untouched. Registry and parallel flag are shared.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            regulators: self.regulators.clone(),
            parallel: self.parallel,
        }
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns `true` once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when cancellation is requested.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Underlying cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Attached registry, if any.
    pub fn regulators(&self) -> Option<&Arc<Regulators>> {
        self.regulators.as_ref()
    }

    /// Whether fan-out may run in parallel.
    pub fn is_parallel(&self) -> bool {
        self.parallel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_cancellation_reaches_children() {
        let ctx = Context::new();
        let child = ctx.child();
        ctx.cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn child_shares_registry_and_parallel_flag() {
        let ctx = Context::new()
            .with_capacities([("b", 1)])
            .with_parallelism(false);
        let child = ctx.child();
        assert!(!child.is_parallel());
        assert_eq!(child.regulators().map(|r| r.capacity("b")), Some(1));
    }
}
