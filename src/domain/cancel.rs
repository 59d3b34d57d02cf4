//! Cooperative cancellation for long-running runs.
//!
//! A `CancelToken` carries an optional wall-clock deadline and a shared flag.
//! Pipeline stages poll `check` at loop boundaries; a tripped token surfaces
//! as a `Timeout` error naming the stage, and already-computed partial state
//! is dropped rather than returned.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use super::error::BacksimError;

#[derive(Debug, Clone)]
pub struct CancelToken {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// A token that never expires on its own; it can still be cancelled.
    pub fn none() -> Self {
        CancelToken {
            deadline: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A token that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        CancelToken {
            deadline: Some(Instant::now() + timeout),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Trip the token. All clones observe the cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::Relaxed) {
            return true;
        }
        match self.deadline {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }

    /// Error out of the current stage if the token has tripped.
    pub fn check(&self, stage: &str) -> Result<(), BacksimError> {
        if self.is_cancelled() {
            Err(BacksimError::Timeout {
                stage: stage.to_string(),
            })
        } else {
            Ok(())
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        CancelToken::none()
    }
}
