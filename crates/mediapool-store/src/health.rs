//! Failure latch shared by the write queue and the pool observers.

use std::sync::Arc;

use mediapool_core::{CatalogError, Result};
use parking_lot::Mutex;
use tracing::error;

/// Holds the first storage failure. Once set it never clears.
#[derive(Debug, Clone, Default)]
pub struct Health {
    failure: Arc<Mutex<Option<CatalogError>>>,
}

impl Health {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Err` with the latched failure, if any.
    pub fn check(&self) -> Result<()> {
        match &*self.failure.lock() {
            Some(failure) => Err(failure.clone()),
            None => Ok(()),
        }
    }

    /// Latch `failure` unless an earlier one is already held.
    /// Returns whether this call tripped the latch.
    pub fn trip(&self, failure: CatalogError) -> bool {
        let mut slot = self.failure.lock();
        if slot.is_some() {
            return false;
        }
        error!(error = %failure, "storage failure latched; further mutations are refused");
        *slot = Some(failure);
        true
    }

    pub fn failure(&self) -> Option<CatalogError> {
        self.failure.lock().clone()
    }

    pub fn is_healthy(&self) -> bool {
        self.failure.lock().is_none()
    }
}
