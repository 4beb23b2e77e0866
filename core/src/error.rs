use std::io;
use std::time::Duration;
use thiserror::Error;

/// A payload failed structural validation before any process was spawned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("missing required field '{field}'")]
    Missing { field: &'static str },
}

/// Failures of a single child process invocation.
///
/// A child that starts and exits non-zero is not an error; it comes back as
/// an [`ExecutionResult`](crate::runtime::ExecutionResult).
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("'{program}' did not finish within {after:?}")]
    Timeout { program: String, after: Duration },

    #[error("failed to collect output of '{program}': {source}")]
    Capture {
        program: String,
        #[source]
        source: io::Error,
    },
}
