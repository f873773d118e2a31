use crate::domain::relay::Relay;
use crate::error::{AppError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Round-robin selection over the configured relays.
///
/// Rotation is positional only. A relay that keeps failing still receives its share.
#[derive(Debug)]
pub struct RelayPool {
    relays: Vec<Relay>,
    cursor: AtomicUsize,
}

impl RelayPool {
    #[must_use]
    pub const fn new(relays: Vec<Relay>) -> Self {
        Self { relays, cursor: AtomicUsize::new(0) }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.relays.is_empty()
    }

    /// Returns the next relay in rotation. The cursor advances on every call.
    ///
    /// # Errors
    /// Returns `AppError::NoRelayConfigured` if the pool is empty.
    pub fn next(&self) -> Result<&Relay> {
        if self.relays.is_empty() {
            return Err(AppError::NoRelayConfigured);
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.relays.len();
        Ok(&self.relays[index])
    }
}
