//! `Sink` — the work a thread performs once its group is released.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::role::Role;

/// Caller-supplied capability invoked after a successful arrival.
///
/// The barrier calls [`on_admitted`](Self::on_admitted) exactly once per
/// successful arrival, strictly after that arrival's group has been released,
/// and never for a cancelled, timed-out or shut-down arrival. Calls from
/// members of the same group are not ordered relative to each other.
pub trait Sink<R: Role> {
    /// Performs the admitted thread's externally visible work.
    fn on_admitted(&self, role: R);
}

impl<R: Role, F: Fn(R)> Sink<R> for F {
    #[inline]
    fn on_admitted(&self, role: R) {
        self(role);
    }
}

/// A sink that appends every admitted role to an internal log.
///
/// One recorder is usually shared by all worker threads; the log then shows
/// the order in which admitted threads performed their work.
#[derive(Debug)]
pub struct Recorder<R> {
    log: Mutex<Vec<R>>,
}

impl<R> Default for Recorder<R> {
    fn default() -> Self {
        Self {
            log: Mutex::new(Vec::new()),
        }
    }
}

impl<R: Role> Recorder<R> {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Vec<R>> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the log so far.
    pub fn snapshot(&self) -> Vec<R> {
        self.entries().clone()
    }

    /// Number of recorded admissions.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consumes the recorder, returning the log.
    pub fn into_inner(self) -> Vec<R> {
        let log = self.log.into_inner();
        log.unwrap_or_else(PoisonError::into_inner)
    }
}

impl<R: Role> Sink<R> for Recorder<R> {
    fn on_admitted(&self, role: R) {
        self.entries().push(role);
    }
}
