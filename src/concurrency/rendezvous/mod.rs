//! `RendezvousBarrier` — admits threads only in complete, fixed-composition
//! groups.
//!
//! Each generation moves through three states:
//!
//! - **WAITING**: at least one role is below its required count. Arrivals
//!   register under the state lock and park on the condvar, tagged with the
//!   generation they joined.
//! - **COMPLETE**: the arrival that brings every role to its required count
//!   observes completion inside the same critical section that counted it.
//! - **RELEASED**: that arrival (the releaser) zeroes the counts, bumps the
//!   generation and wakes every parked thread before leaving the lock. Woken
//!   threads only leave if the generation moved past the one they joined.
//!
//! Shutdown can interrupt any generation; parked members roll back their
//! arrival and return [`BondError::Cancelled`].
//!
//! Two suspension points bound the pipeline: a member first takes a slot from
//! its role's [`RoleGate`] (capacity = required count, so at most one group's
//! worth of each role is ever in flight), then parks for its generation. Gate
//! slots are always taken before the state lock, and releasing a slot never
//! blocks, so the lock order cannot deadlock.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::cancel::WaitOptions;
use super::gate::{GatePermit, RoleGate};
use crate::config::{BarrierConfig, PermitRelease};
use crate::error::BondError;
use crate::group_spec::GroupSpec;
use crate::role::Role;
use crate::sink::Sink;


/// Outcome of a successful arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    releaser: bool,
}

impl Admission {
    /// Returns true for exactly one member of each released group: the one
    /// whose arrival completed it.
    #[must_use]
    pub fn is_releaser(&self) -> bool {
        self.releaser
    }
}

#[derive(Debug)]
struct BarrierState {
    /// Arrivals per role (indexed like the group spec) in the active generation.
    arrived: Vec<usize>,
    generation: u64,
    groups_released: u64,
    shut_down: bool,
}

/// Releases threads of distinct roles only in groups matching a
/// [`GroupSpec`].
///
/// A thread calls [`arrive`](Self::arrive) with its role and a [`Sink`]. The
/// call blocks until enough threads of every role have arrived to form one
/// complete group, then runs the sink exactly once and returns. Threads of a
/// group that never completes stay parked until they time out, are cancelled,
/// or the barrier is [`shutdown`](Self::shutdown).
///
/// ```
/// use bondgate::{GroupSpec, Recorder, RendezvousBarrier};
/// use std::thread;
///
/// let barrier = RendezvousBarrier::new(GroupSpec::new([('H', 2), ('O', 1)]).unwrap());
/// let water = Recorder::new();
///
/// thread::scope(|s| {
///     for role in "HOH".chars() {
///         let (barrier, water) = (&barrier, &water);
///         s.spawn(move || barrier.arrive(role, water).unwrap());
///     }
/// });
///
/// let mut molecule = water.into_inner();
/// molecule.sort_unstable();
/// assert_eq!(molecule, vec!['H', 'H', 'O']);
/// assert_eq!(barrier.groups_released(), 1);
/// ```
#[derive(Debug)]
pub struct RendezvousBarrier<R: Role> {
    spec: GroupSpec<R>,
    gates: Box<[RoleGate]>,
    state: Mutex<BarrierState>,
    released: Condvar,
    config: BarrierConfig,
}

impl<R: Role> RendezvousBarrier<R> {
    /// Creates a barrier with default tunables.
    pub fn new(spec: GroupSpec<R>) -> Self {
        Self::with_config(spec, BarrierConfig::default())
    }

    /// Creates a barrier with explicit tunables.
    pub fn with_config(spec: GroupSpec<R>, config: BarrierConfig) -> Self {
        let gates = spec
            .iter()
            .map(|(_, count)| {
                let capacity = u32::try_from(count).unwrap_or(u32::MAX);
                RoleGate::new(capacity)
            })
            .collect();
        let state = BarrierState {
            arrived: vec![0; spec.len()],
            generation: 0,
            groups_released: 0,
            shut_down: false,
        };
        Self {
            spec,
            gates,
            state: Mutex::new(state),
            released: Condvar::new(),
            config,
        }
    }

    /// The group composition this barrier enforces.
    #[inline]
    pub fn spec(&self) -> &GroupSpec<R> {
        &self.spec
    }

    /// The tunables this barrier was built with.
    #[inline]
    pub fn config(&self) -> &BarrierConfig {
        &self.config
    }

    /// Returns true once [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.lock_state().shut_down
    }

    /// Number of complete groups released so far.
    pub fn groups_released(&self) -> u64 {
        self.lock_state().groups_released
    }

    /// Threads of `role` counted in the generation currently forming; zero for
    /// unknown roles.
    pub fn waiting(&self, role: R) -> usize {
        self.spec
            .index_of(role)
            .map_or(0, |i| self.lock_state().arrived[i])
    }

    /// Blocks until this thread is part of a released group, then runs
    /// `sink` once.
    ///
    /// # Errors
    ///
    /// [`BondError::UnknownRole`] if `role` is not in the group spec,
    /// [`BondError::Cancelled`] if the barrier is or becomes shut down before
    /// this thread's group is released.
    pub fn arrive<S>(&self, role: R, sink: &S) -> Result<Admission, BondError>
    where
        S: Sink<R> + ?Sized,
    {
        self.arrive_with(role, sink, &WaitOptions::new())
    }

    /// Like [`arrive`](Self::arrive), but gives up with
    /// [`BondError::TimedOut`] after `timeout`.
    ///
    /// # Errors
    ///
    /// See [`arrive_with`](Self::arrive_with).
    pub fn arrive_timeout<S>(
        &self,
        role: R,
        sink: &S,
        timeout: Duration,
    ) -> Result<Admission, BondError>
    where
        S: Sink<R> + ?Sized,
    {
        self.arrive_with(role, sink, &WaitOptions::new().with_timeout(timeout))
    }

    /// Like [`arrive`](Self::arrive), but gives up with
    /// [`BondError::TimedOut`] once `deadline` passes.
    ///
    /// # Errors
    ///
    /// See [`arrive_with`](Self::arrive_with).
    pub fn arrive_until<S>(
        &self,
        role: R,
        sink: &S,
        deadline: Instant,
    ) -> Result<Admission, BondError>
    where
        S: Sink<R> + ?Sized,
    {
        self.arrive_with(role, sink, &WaitOptions::new().with_deadline(deadline))
    }

    /// Arrives as `role`, waiting under `opts`.
    ///
    /// The sink runs only after a successful release. On any error the
    /// arrival has been fully rolled back: it no longer counts towards the
    /// forming group and its gate slot has been returned.
    ///
    /// On success the gate slot goes back according to
    /// [`BarrierConfig::permit_release`]. Under the default
    /// [`PermitRelease::AfterSink`] it is held past release and returned only
    /// once `sink` returns; under [`PermitRelease::OnRelease`] it is returned
    /// before `sink` runs.
    ///
    /// # Errors
    ///
    /// - [`BondError::UnknownRole`]: `role` is not in the group spec.
    /// - [`BondError::Cancelled`]: shutdown, or the cancel token in `opts`
    ///   fired, before release.
    /// - [`BondError::TimedOut`]: the deadline in `opts` passed before release.
    pub fn arrive_with<S>(
        &self,
        role: R,
        sink: &S,
        opts: &WaitOptions<'_>,
    ) -> Result<Admission, BondError>
    where
        S: Sink<R> + ?Sized,
    {
        let index = self
            .spec
            .index_of(role)
            .ok_or_else(|| BondError::unknown_role(&role))?;
        if self.is_shut_down() {
            return Err(BondError::Cancelled);
        }

        let poll = self.config.poll_interval();
        let gate = &self.gates[index];
        gate.acquire_polling(opts, poll)?;
        let permit = gate.permit();

        let (releaser, permit) = self.join_generation(index, permit, opts, poll)?;

        match self.config.permit_release {
            PermitRelease::OnRelease => {
                drop(permit);
                sink.on_admitted(role);
            }
            PermitRelease::AfterSink => {
                sink.on_admitted(role);
                drop(permit);
            }
        }
        Ok(Admission { releaser })
    }

    /// Counts the arrival and waits for its generation to be released.
    ///
    /// Returns the permit on success so the caller decides when it goes back
    /// to the gate; on failure the permit is returned inside the critical
    /// section that rolled the arrival back.
    fn join_generation<'g>(
        &self,
        index: usize,
        permit: GatePermit<'g>,
        opts: &WaitOptions<'_>,
        poll: Duration,
    ) -> Result<(bool, GatePermit<'g>), BondError> {
        let role = self.spec.role_at(index);
        let mut state = self.lock_state();
        if state.shut_down {
            drop(permit);
            return Err(BondError::Cancelled);
        }

        let joined = state.generation;
        state.arrived[index] += 1;
        debug_assert!(
            state.arrived[index] <= self.spec.count_at(index),
            "role {role:?} over-arrived in generation {joined}"
        );
        tracing::trace!(
            ?role,
            generation = joined,
            arrived = state.arrived[index],
            "arrival counted"
        );

        if self.spec.is_complete(&state.arrived) {
            state.arrived.fill(0);
            state.generation = state.generation.wrapping_add(1);
            state.groups_released += 1;
            self.released.notify_all();
            tracing::debug!(?role, generation = joined, size = self.spec.size(), "group released");
            return Ok((true, permit));
        }

        loop {
            state = match opts.slice(poll) {
                Some(slice) => {
                    self.released
                        .wait_timeout(state, slice)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self
                    .released
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
            };

            if state.generation != joined {
                tracing::trace!(?role, generation = joined, "member released");
                return Ok((false, permit));
            }

            let interrupted = if state.shut_down {
                Err(BondError::Cancelled)
            } else {
                opts.check()
            };
            if let Err(err) = interrupted {
                state.arrived[index] -= 1;
                drop(permit);
                tracing::debug!(?role, generation = joined, error = %err, "arrival rolled back");
                return Err(err);
            }
        }
    }

    /// Shuts the barrier down.
    ///
    /// Every parked member of the forming generation rolls back and returns
    /// [`BondError::Cancelled`], threads blocked on a role gate are woken with
    /// the same error, and later arrivals fail immediately. Members of groups
    /// already released still run their sinks.
    ///
    /// # Errors
    ///
    /// [`BondError::Cancelled`] if the barrier was already shut down; the
    /// call then has no effect.
    pub fn shutdown(&self) -> Result<(), BondError> {
        let mut state = self.lock_state();
        if state.shut_down {
            return Err(BondError::Cancelled);
        }
        state.shut_down = true;
        let parked: usize = state.arrived.iter().sum();
        drop(state);

        self.released.notify_all();
        for gate in &*self.gates {
            gate.close();
        }
        tracing::debug!(parked, "barrier shut down");
        Ok(())
    }

    // Sinks never run under this lock, so a poisoned state is still
    // consistent and can be used as is.
    fn lock_state(&self) -> MutexGuard<'_, BarrierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
