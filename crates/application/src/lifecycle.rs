//! Service lifecycle flag
//!
//! A single shared flag flips the moment shutdown begins. Every outbound
//! runtime call and every reconciliation tick checks it first, so nothing
//! new starts while in-flight work drains.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::ApplicationError;

/// Shared "shutting down" flag
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    /// Create a cleared flag
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the service as shutting down
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Clear the flag (used when the service is initialised again)
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Whether shutdown has begun
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Fail with `ShuttingDown` once shutdown has begun
    pub fn ensure_accepting(&self) -> Result<(), ApplicationError> {
        if self.is_shutting_down() {
            Err(ApplicationError::ShuttingDown)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    #[test]
    fn clones_share_state() {
        let flag = ShutdownFlag::new();
        let clone = flag.clone();
        assert_ok!(clone.ensure_accepting());

        flag.trigger();
        assert!(clone.is_shutting_down());
        assert!(matches!(
            clone.ensure_accepting(),
            Err(ApplicationError::ShuttingDown)
        ));

        clone.reset();
        assert!(!flag.is_shutting_down());
        assert_ok!(flag.ensure_accepting());
        flag.trigger();
        assert_err!(clone.ensure_accepting());
    }
}
