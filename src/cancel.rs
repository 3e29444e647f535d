//! Cooperative cancellation, observed between batches

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tracing::debug;

use crate::error::Result;

/// Cloneable flag shared between an interrupt source and the acquisition loop
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Route ctrl-c to this token instead of terminating the process.
    /// Can only be done once per process.
    pub fn cancel_on_interrupt(&self) -> Result<()> {
        let token = self.clone();
        ctrlc::set_handler(move || {
            debug!("Interrupt received");
            token.cancel();
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let token = CancellationToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }
}
