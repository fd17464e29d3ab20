//! Bounded-concurrency admission and structured fan-out.
//!
//! The [`AdmissionController`] owns the only cluster-wide shared resource of a
//! scan: a semaphore sized to the configured concurrency limit. A slot is
//! held for exactly the duration of one remote call, so however the scan
//! fans out (namespaces, mounts, engines, tree branches) the number of
//! outstanding calls never exceeds the limit, and a parent waiting on its
//! children never holds a slot they need.
//!
//! [`fan_out`] runs one Tokio task per unit of work and joins them all before
//! returning, yielding results in input order. A panicking unit is converted
//! into [`ScanError::InternalFault`] tagged with its index; its slot, if it
//! held one, is released by unwinding.

use std::any::Any;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use super::error::ScanError;

#[derive(Debug, Clone)]
pub struct AdmissionController {
    semaphore: Arc<Semaphore>,
    limit: usize,
    cancel: CancellationToken,
}

/// An acquired admission slot. Dropping it releases the slot.
#[derive(Debug)]
pub struct Slot {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionController {
    pub fn new(limit: NonZeroUsize, cancel: CancellationToken) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(limit.get())),
            limit: limit.get(),
            cancel,
        }
    }

    /// Wait for a free slot. Fails once the scan has been cancelled.
    pub async fn acquire(&self, path: &str) -> Result<Slot, ScanError> {
        let cancelled = || ScanError::Cancelled {
            path: path.to_string(),
        };

        if self.cancel.is_cancelled() {
            return Err(cancelled());
        }

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(cancelled()),
            permit = Arc::clone(&self.semaphore).acquire_owned() => {
                permit.map(|p| Slot { _permit: p }).map_err(|_| cancelled())
            }
        }
    }

    /// Configured number of slots.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Slots currently held.
    pub fn in_flight(&self) -> usize {
        self.limit - self.semaphore.available_permits()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Run `f` for every item on its own task and collect results by index.
pub async fn fan_out<I, T, F, Fut>(items: Vec<I>, f: F) -> Vec<Result<T, ScanError>>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(usize, I) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
{
    let handles: Vec<_> = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| tokio::spawn(f(index, item)))
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (index, handle) in handles.into_iter().enumerate() {
        results.push(handle.await.map_err(|err| internal_fault(index, err)));
    }
    results
}

fn internal_fault(index: usize, err: JoinError) -> ScanError {
    let message = if err.is_panic() {
        panic_message(err.into_panic())
    } else {
        "task aborted".to_string()
    };
    tracing::warn!(index, %message, "unit of work faulted");
    ScanError::InternalFault { index, message }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
