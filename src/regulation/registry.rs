//! # Regulation registry: named counting-permit queues.
//!
//! Built once from a capacity table and read-only afterwards. Each name with a capacity
//! above zero owns a [`Semaphore`] pre-loaded with that many permits; capacity `0` means
//! "unregulated". The empty name always exists and is unregulated.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;

/// Immutable mapping from regulator name to permit queue.
#[derive(Debug)]
pub struct Regulators {
    queues: HashMap<String, Regulator>,
}

#[derive(Debug)]
struct Regulator {
    capacity: usize,
    permits: Option<Arc<Semaphore>>,
}

impl Regulators {
    /// Builds the registry from `(name, capacity)` pairs. Later duplicates win.
    pub fn new<I, S>(table: I) -> Self
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        let mut queues: HashMap<String, Regulator> = table
            .into_iter()
            .map(|(name, capacity)| {
                let permits = (capacity > 0).then(|| Arc::new(Semaphore::new(capacity)));
                (name.into(), Regulator { capacity, permits })
            })
            .collect();

        queues.insert(
            String::new(),
            Regulator {
                capacity: 0,
                permits: None,
            },
        );
        Self { queues }
    }

    /// Configured capacity for `name`; unknown names report `0` (unregulated).
    pub fn capacity(&self, name: &str) -> usize {
        self.queues.get(name).map_or(0, |r| r.capacity)
    }

    /// Returns `true` if `name` was configured (the empty name always is).
    pub fn contains(&self, name: &str) -> bool {
        self.queues.contains_key(name)
    }

    /// Sorted list of configured names, including the empty one.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.queues.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Permit queue for `name`, or `None` when the name is unregulated.
    pub(crate) fn permits(&self, name: &str) -> Option<&Arc<Semaphore>> {
        self.queues.get(name).and_then(|r| r.permits.as_ref())
    }
}
