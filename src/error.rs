//! Error types used by the taskgate runtime, units of work and reducers.
//!
//! - [`TaskError`]: returned by a unit-of-work function or by reducer-admitted work.
//! - [`RuntimeError`]: synthesized by [`Runtime::run`](crate::Runtime::run) from its own hooks.
//! - [`ReducerError`]: returned by [`Reducer::launch`](crate::Reducer::launch) and
//!   [`Reducer::close`](crate::Reducer::close).
//!
//! All types provide `as_label` (stable snake_case) for logs.

use thiserror::Error;

/// # Errors produced by work functions.
///
/// Stored on the [`TaskHandle`](crate::TaskHandle) of the unit that produced it and never
/// retried or aggregated by the runtime.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Work failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Work observed cancellation of its context and gave up.
    #[error("context cancelled")]
    Canceled,

    /// Interactive I/O could not be completed (console gone or read failed).
    #[error("console i/o failed: {error}")]
    Io {
        /// The underlying error message.
        error: String,
    },
}

impl TaskError {
    /// Convenience constructor for [`TaskError::Fail`].
    ///
    /// # Example
    /// ```
    /// use taskgate::TaskError;
    ///
    /// let err = TaskError::fail("bucket not found");
    /// assert_eq!(err.to_string(), "execution failed: bucket not found");
    /// ```
    pub fn fail(error: impl std::fmt::Display) -> Self {
        TaskError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Canceled => "task_canceled",
            TaskError::Io { .. } => "task_io",
        }
    }
}

impl From<std::io::Error> for TaskError {
    fn from(err: std::io::Error) -> Self {
        TaskError::Io {
            error: err.to_string(),
        }
    }
}

/// # Errors produced by the runtime's own control flow.
///
/// Per-unit errors are not part of this type; inspect each handle after `run` returns.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The startup hook returned an error.
    #[error("startup hook failed: {source}")]
    Startup {
        /// Error returned by the hook.
        source: TaskError,
    },

    /// The shutdown hook returned an error.
    #[error("shutdown hook failed: {source}")]
    Shutdown {
        /// Error returned by the hook.
        source: TaskError,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use taskgate::{RuntimeError, TaskError};
    ///
    /// let err = RuntimeError::Startup { source: TaskError::Canceled };
    /// assert_eq!(err.as_label(), "runtime_startup");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Startup { .. } => "runtime_startup",
            RuntimeError::Shutdown { .. } => "runtime_shutdown",
        }
    }
}

/// # Errors produced by a [`Reducer`](crate::Reducer).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReducerError {
    /// The reducer was closed while the call was waiting for (or had just won) admission;
    /// the work was not executed.
    #[error("reducer closed; launch aborted")]
    Aborted,

    /// `close` was called on a reducer that was already closed.
    #[error("reducer already closed")]
    AlreadyClosed,

    /// The admitted work ran and returned an error.
    #[error(transparent)]
    Work(#[from] TaskError),
}

impl ReducerError {
    /// Returns `true` for [`ReducerError::Aborted`].
    ///
    /// # Example
    /// ```
    /// use taskgate::{ReducerError, TaskError};
    ///
    /// assert!(ReducerError::Aborted.is_aborted());
    /// assert!(!ReducerError::Work(TaskError::Canceled).is_aborted());
    /// ```
    pub fn is_aborted(&self) -> bool {
        matches!(self, ReducerError::Aborted)
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ReducerError::Aborted => "reducer_aborted",
            ReducerError::AlreadyClosed => "reducer_already_closed",
            ReducerError::Work(_) => "reducer_work_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_convert_to_task_io() {
        let err: TaskError = std::io::Error::other("tty gone").into();
        assert_eq!(err.as_label(), "task_io");
        assert!(err.to_string().contains("tty gone"));
    }

    #[test]
    fn work_errors_stay_distinguishable_from_aborts() {
        let err = ReducerError::from(TaskError::fail("boom"));
        assert!(!err.is_aborted());
        assert_eq!(err.to_string(), "execution failed: boom");
        assert_eq!(err.as_label(), "reducer_work_failed");
    }
}
