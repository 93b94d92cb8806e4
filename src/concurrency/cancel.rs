//! Cancellation tokens and per-arrival wait options.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::BondError;

/// A cloneable, thread-safe cancellation signal.
///
/// Every clone observes the same flag. Waiters poll it between wait slices,
/// so a cancelled arrival returns within one poll interval.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Returns true once [`cancel`](Self::cancel) has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// How long, and under which cancellation signal, an arrival may wait.
///
/// The default waits forever and can only be interrupted by shutdown.
#[derive(Debug, Clone, Copy, Default)]
pub struct WaitOptions<'a> {
    deadline: Option<Instant>,
    cancel: Option<&'a CancelToken>,
}

impl<'a> WaitOptions<'a> {
    /// Unbounded, uncancellable wait.
    pub const fn new() -> Self {
        Self {
            deadline: None,
            cancel: None,
        }
    }

    /// Gives up with [`BondError::TimedOut`] once `deadline` passes.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Gives up with [`BondError::TimedOut`] after `timeout` from now.
    ///
    /// A timeout too large to represent is treated as no deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Instant::now().checked_add(timeout);
        self
    }

    /// Gives up with [`BondError::Cancelled`] once `token` is cancelled.
    #[must_use]
    pub fn with_cancel(mut self, token: &'a CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fails if the token fired or the deadline passed. Cancellation wins
    /// when both hold.
    pub(crate) fn check(&self) -> Result<(), BondError> {
        if self.cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(BondError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(BondError::TimedOut),
            _ => Ok(()),
        }
    }

    /// Length of the next wait slice, or `None` when nothing but a wakeup
    /// can end the wait.
    pub(crate) fn slice(&self, poll: Duration) -> Option<Duration> {
        let now = Instant::now();
        let until_deadline = self.deadline.map(|d| d.saturating_duration_since(now));
        match (until_deadline, self.cancel.is_some()) {
            (Some(left), true) => Some(left.min(poll)),
            (Some(left), false) => Some(left),
            (None, true) => Some(poll),
            (None, false) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn check_reports_cancel_before_timeout() {
        let token = CancelToken::new();
        let opts = WaitOptions::new()
            .with_deadline(Instant::now())
            .with_cancel(&token);
        assert_eq!(opts.check(), Err(BondError::TimedOut));
        token.cancel();
        assert_eq!(opts.check(), Err(BondError::Cancelled));
    }

    #[test]
    fn unbounded_wait_has_no_slice() {
        let opts = WaitOptions::new();
        assert_eq!(opts.check(), Ok(()));
        assert_eq!(opts.slice(Duration::from_millis(10)), None);
    }

    #[test]
    fn slices_never_exceed_poll_when_cancellable() {
        let token = CancelToken::new();
        let poll = Duration::from_millis(10);
        let opts = WaitOptions::new()
            .with_timeout(Duration::from_secs(60))
            .with_cancel(&token);
        assert_eq!(opts.slice(poll), Some(poll));
        let opts = WaitOptions::new().with_cancel(&token);
        assert_eq!(opts.slice(poll), Some(poll));
        let opts = WaitOptions::new().with_timeout(Duration::from_millis(1));
        assert!(opts.slice(poll).unwrap() <= Duration::from_millis(1));
    }
}
