//! Final handling of failed calls.
//!
//! Every error leaving a call passes through the [`ErrorReporter`]. In safe mode it is also
//! stored so it can be read back with [`Client::last_error`](crate::Client::last_error).

use crate::Error;
use std::sync::{Mutex, PoisonError};

/// Holds the last error of a client in safe mode.
#[derive(Debug, Default)]
pub(crate) struct ErrorReporter {
    last_error: Mutex<Option<Error>>,
}

impl ErrorReporter {
    /// Forgets the stored error. Called at the start of every call.
    pub(crate) fn clear(&self) {
        *self.slot() = None;
    }

    /// Logs the error, stores it when `safe` is set, and hands it back for propagation.
    pub(crate) fn report(&self, error: Error, safe: bool) -> Error {
        tracing::warn!(
            kind = ?error.kind(),
            code = ?error.code(),
            retryable = error.is_retryable(),
            safe = safe,
            "Call failed: {}",
            error
        );
        if safe {
            *self.slot() = Some(error.clone());
        }
        error
    }

    /// Returns the stored error, if any.
    pub(crate) fn last_error(&self) -> Option<Error> {
        self.slot().clone()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Error>> {
        self.last_error.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
