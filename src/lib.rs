//! # `bondgate` - Fixed-Composition Group Rendezvous
//!
//! Threads of distinct *roles* do their externally visible work only in
//! complete groups: for example exactly two `H` threads and one `O` thread
//! per water molecule, with no partial group ever allowed through.
//!
//! ## Guarantees
//!
//! ### Group Atomicity
//! - **Exact composition**: a thread's [`Sink`] runs only if its arrival was
//!   part of a generation whose per-role counts equal the [`GroupSpec`].
//! - **Single release path**: completion is detected inside the one critical
//!   section that counts arrivals, by the arrival that completed the group.
//! - **No generation bleed**: the next generation's arrivals are counted only
//!   after the previous release has reset the counters, and parked threads
//!   leave only once the generation they joined has been released.
//!
//! ### Bounded Admission
//! - **Role gates**: each role has a [`RoleGate`] whose capacity equals its
//!   required count, so an abundant role cannot pile up behind a scarce one.
//! - **Non-overlapping groups**: with the default
//!   [`PermitRelease::AfterSink`], a group cannot complete until every member
//!   of the previous group has finished its sink.
//!
//! ### Cancellation
//! - **Deadlines and tokens**: [`WaitOptions`] bound both suspension points.
//! - **Rollback**: a cancelled or timed-out member withdraws its arrival and
//!   returns its gate slot under the barrier lock, so the remaining members
//!   can still complete with a fresh arrival.
//! - **Shutdown**: [`RendezvousBarrier::shutdown`] wakes everyone with
//!   [`BondError::Cancelled`].
//!
//! ## Example
//!
//! ```rust
//! use bondgate::{GroupSpec, Recorder, RendezvousBarrier};
//! use std::thread;
//!
//! let spec = GroupSpec::new([('H', 2), ('O', 1)]).unwrap();
//! let barrier = RendezvousBarrier::new(spec);
//! let log = Recorder::new();
//!
//! thread::scope(|s| {
//!     for role in "OOHHHH".chars() {
//!         let (barrier, log) = (&barrier, &log);
//!         s.spawn(move || barrier.arrive(role, log).unwrap());
//!     }
//! });
//!
//! assert_eq!(barrier.groups_released(), 2);
//! for molecule in log.snapshot().chunks(3) {
//!     assert_eq!(molecule.iter().filter(|&&r| r == 'H').count(), 2);
//! }
//! ```

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod concurrency;
pub mod config;
pub mod error;
pub mod group_spec;
pub mod role;
pub mod sink;

pub use concurrency::{Admission, CancelToken, RendezvousBarrier, RoleGate, WaitOptions};
pub use config::{BarrierConfig, BondingConfig, PermitRelease};
pub use error::{BondError, SpecError};
pub use group_spec::{GroupSpec, MAX_GROUP_SIZE};
pub use role::Role;
pub use sink::{Recorder, Sink};

// Gate capacities are `u32`; every valid spec must fit.
const _: () = assert!(MAX_GROUP_SIZE <= u32::MAX as usize);
