//! # Callback Guard
//!
//! Caller-supplied predicates and transforms are opaque to the engine. A
//! panic inside one must not unwind through the engine; it is caught here
//! and surfaced as `InternalCallbackFailure`, with no retry and no
//! substituted value.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::error::CoherenceError;
use crate::layer::Checkpoint;

/// Run a caller callback, converting a panic into `InternalCallbackFailure`.
pub fn guarded<T>(
    checkpoint: Checkpoint,
    callback: &str,
    f: impl FnOnce() -> T,
) -> Result<T, CoherenceError> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let message = panic_message(payload.as_ref());
        tracing::warn!(%checkpoint, callback, %message, "caller callback panicked");
        CoherenceError::InternalCallbackFailure {
            checkpoint,
            callback: callback.to_string(),
            message,
        }
    })
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_passes_through() {
        assert_eq!(guarded(Checkpoint::Transform, "t", || 7).unwrap(), 7);
    }

    #[test]
    fn panic_becomes_callback_failure() {
        let err = guarded(Checkpoint::OutputValidation, "wheels", || -> bool {
            panic!("boom")
        })
        .unwrap_err();
        match err {
            CoherenceError::InternalCallbackFailure {
                checkpoint,
                callback,
                message,
            } => {
                assert_eq!(checkpoint, Checkpoint::OutputValidation);
                assert_eq!(callback, "wheels");
                assert_eq!(message, "boom");
            }
            other => panic!("expected InternalCallbackFailure, got {other}"),
        }
    }

    #[test]
    fn formatted_panic_message() {
        let err = guarded(Checkpoint::Transform, "t", || -> u8 { panic!("code {}", 42) }).unwrap_err();
        assert!(err.to_string().contains("code 42"));
    }
}
