//! Process-scoped single-slot registry
//!
//! Some host callback contracts carry no per-call context: the Windows
//! `ServiceMain` entry receives only its argument vector, and Unix signal
//! disposition is process-wide. Hosts bound by such a contract keep the one
//! active dispatch in a `static DispatchSlot`, claimed before dispatch begins
//! and released once the lifecycle has unwound.

use crate::error::ServiceError;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

struct SlotEntry<T> {
    owner: String,
    value: Option<T>,
}

/// A single-slot table keyed by nothing
pub struct DispatchSlot<T> {
    entry: Mutex<Option<SlotEntry<T>>>,
}

impl<T> DispatchSlot<T> {
    pub const fn new() -> Self {
        Self {
            entry: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<SlotEntry<T>>> {
        self.entry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Occupy the slot for `owner`, storing `value` for the callback thunk
    ///
    /// A slot that is already occupied is never overwritten.
    pub fn claim(&self, owner: &str, value: T) -> Result<SlotGuard<'_, T>, ServiceError> {
        let mut entry = self.lock();
        if let Some(active) = entry.as_ref() {
            return Err(ServiceError::AlreadyRunning {
                active: active.owner.clone(),
            });
        }

        debug!(service = %owner, "Claimed dispatch slot");
        *entry = Some(SlotEntry {
            owner: owner.to_string(),
            value: Some(value),
        });

        Ok(SlotGuard { slot: self })
    }

    /// Hand the stored value out, at most once per claim
    pub fn take(&self) -> Option<T> {
        self.lock().as_mut().and_then(|entry| entry.value.take())
    }

    pub fn is_occupied(&self) -> bool {
        self.lock().is_some()
    }

    fn release(&self) {
        if let Some(entry) = self.lock().take() {
            debug!(service = %entry.owner, "Released dispatch slot");
        }
    }
}

impl<T> Default for DispatchSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps a `DispatchSlot` occupied until dropped
#[must_use = "the slot is released as soon as the guard is dropped"]
pub struct SlotGuard<'a, T> {
    slot: &'a DispatchSlot<T>,
}

impl<T> Drop for SlotGuard<'_, T> {
    fn drop(&mut self) {
        self.slot.release();
    }
}
