//! `RoleGate` — bounded admission for one role.
//!
//! A gate is a counting semaphore whose capacity equals the number of threads
//! of its role that one group needs. The available-slot counter is a single
//! atomic; blocked acquirers park on its address once a short spin fails.

use core::time::Duration;

#[cfg(not(loom))]
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
#[cfg(loom)]
use loom::sync::atomic::{AtomicBool, AtomicU32, Ordering};

#[cfg(not(loom))]
use crossbeam_utils::Backoff;
use crossbeam_utils::CachePadded;

use super::cancel::WaitOptions;
use super::wait::{wait_on_u32, wake_all_u32, wake_one_u32};
use crate::error::BondError;

/// Slice length used when a gate wait has neither deadline nor cancel token.
/// Closure is only observed between slices.
pub(crate) const DEFAULT_POLL: Duration = Duration::from_millis(10);

/// Per-role admission throttle.
///
/// At most `capacity` threads hold a slot at once. A slot is taken by
/// [`acquire`](Self::acquire) and handed back by [`release`](Self::release).
/// Releasing more than was acquired is a contract violation and panics.
///
/// Inside a [`RendezvousBarrier`](crate::RendezvousBarrier) the slot's
/// return point follows [`PermitRelease`](crate::PermitRelease): with the
/// default `AfterSink` a member holds its slot past release until its sink
/// returns, with `OnRelease` it hands the slot back as soon as it wakes.
#[derive(Debug)]
pub struct RoleGate {
    available: CachePadded<AtomicU32>,
    capacity: u32,
    closed: AtomicBool,
}

impl RoleGate {
    /// Creates an open gate with `capacity` free slots.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: u32) -> Self {
        assert!(capacity > 0, "role gate requires at least one slot");
        Self {
            available: CachePadded::new(AtomicU32::new(capacity)),
            capacity,
            closed: AtomicBool::new(false),
        }
    }

    /// Total number of slots.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of currently free slots.
    #[inline]
    pub fn available(&self) -> u32 {
        self.available.load(Ordering::Acquire)
    }

    /// Returns true once [`close`](Self::close) has been called.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Takes a slot without blocking. Returns false if none is free or the
    /// gate is closed.
    pub fn try_acquire(&self) -> bool {
        if self.is_closed() {
            return false;
        }
        self.available
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Blocks until a slot is free, then takes it.
    ///
    /// # Errors
    ///
    /// [`BondError::Cancelled`] if the gate is closed or the options' cancel
    /// token fires while waiting, [`BondError::TimedOut`] if their deadline
    /// passes.
    pub fn acquire(&self, opts: &WaitOptions<'_>) -> Result<(), BondError> {
        self.acquire_polling(opts, DEFAULT_POLL)
    }

    pub(crate) fn acquire_polling(
        &self,
        opts: &WaitOptions<'_>,
        poll: Duration,
    ) -> Result<(), BondError> {
        // loom explores every spin iteration, so only spin outside the model.
        #[cfg(not(loom))]
        let backoff = Backoff::new();
        loop {
            if self.is_closed() {
                return Err(BondError::Cancelled);
            }
            if self.try_acquire() {
                return Ok(());
            }

            #[cfg(not(loom))]
            {
                if !backoff.is_completed() {
                    backoff.snooze();
                    continue;
                }
            }

            opts.check()?;
            tracing::trace!(capacity = self.capacity, "role gate full, parking");
            // `close` may land between the closed check and the park; never
            // sleep longer than one poll slice so it is still observed.
            let slice = opts.slice(poll).map_or(poll, |left| left.min(poll));
            wait_on_u32(&self.available, 0, slice);
        }
    }

    /// Returns a slot and wakes one parked acquirer.
    ///
    /// # Panics
    ///
    /// Panics if every slot is already free, i.e. the gate was released more
    /// times than it was acquired.
    pub fn release(&self) {
        let capacity = self.capacity;
        let released = self
            .available
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < capacity).then_some(n + 1)
            });
        assert!(
            released.is_ok(),
            "role gate released more times than acquired (capacity {capacity})"
        );
        wake_one_u32(&self.available);
    }

    /// Closes the gate: parked and future acquirers fail with
    /// [`BondError::Cancelled`]. Slots already held can still be released.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        wake_all_u32(&self.available);
    }

    pub(crate) fn permit(&self) -> GatePermit<'_> {
        GatePermit { gate: self }
    }
}

/// A held gate slot, returned to its gate exactly once on drop.
#[must_use = "dropping a permit releases the slot immediately"]
pub(crate) struct GatePermit<'a> {
    gate: &'a RoleGate,
}

impl Drop for GatePermit<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}
