//! Barrier configuration, loadable from JSON.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::concurrency::rendezvous::RendezvousBarrier;
use crate::group_spec::GroupSpec;
use crate::role::Role;

/// When a released member hands its role-gate slot back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermitRelease {
    /// Keep the slot past release, until the member's sink returns.
    ///
    /// Gate capacity equals the role's required count, so the next group
    /// cannot complete before every member of the previous one has finished
    /// its sink: side effects of different groups never interleave.
    #[default]
    AfterSink,
    /// Return the slot as soon as the member observes its release, before the
    /// sink runs. Only group composition is guaranteed; sinks of consecutive
    /// groups may overlap.
    OnRelease,
}

/// Tunables for a [`RendezvousBarrier`].
///
/// Admission order among waiters of the same role is unspecified: gates
/// admit whichever waiter wins the slot, so no cross-role or intra-role FIFO
/// fairness is promised. An ordering policy would be added here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BarrierConfig {
    /// When members return their gate slot.
    pub permit_release: PermitRelease,
    /// Upper bound, in milliseconds, on how long a waiter sleeps before
    /// re-checking its cancel token, deadline and gate closure.
    pub poll_interval_ms: u64,
}

impl Default for BarrierConfig {
    fn default() -> Self {
        Self {
            permit_release: PermitRelease::AfterSink,
            poll_interval_ms: 10,
        }
    }
}

impl BarrierConfig {
    /// Sets [`permit_release`](Self::permit_release).
    #[must_use]
    pub fn with_permit_release(mut self, permit_release: PermitRelease) -> Self {
        self.permit_release = permit_release;
        self
    }

    /// Sets the poll interval; sub-millisecond values round up to 1 ms.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Poll interval as a `Duration`, never shorter than 1 ms.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// A group spec bundled with barrier tunables, e.g.
///
/// ```json
/// { "spec": { "H": 2, "O": 1 }, "barrier": { "permit_release": "on_release" } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    deny_unknown_fields,
    bound(serialize = "R: Serialize", deserialize = "R: Deserialize<'de>")
)]
pub struct BondingConfig<R: Role> {
    /// Required group composition.
    pub spec: GroupSpec<R>,
    /// Barrier tunables; defaults apply when omitted.
    #[serde(default)]
    pub barrier: BarrierConfig,
}

impl<R: Role> BondingConfig<R> {
    /// Wraps `spec` with default barrier tunables.
    pub fn new(spec: GroupSpec<R>) -> Self {
        Self {
            spec,
            barrier: BarrierConfig::default(),
        }
    }

    /// Builds a barrier from this configuration.
    pub fn build(&self) -> RendezvousBarrier<R> {
        RendezvousBarrier::with_config(self.spec.clone(), self.barrier.clone())
    }
}

impl<R> BondingConfig<R>
where
    R: Role + for<'de> Deserialize<'de>,
{
    /// Parses a configuration from JSON, validating the group spec.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error for malformed JSON, unknown fields or an
    /// invalid group spec.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
