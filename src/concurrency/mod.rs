//! Blocking primitives behind the rendezvous barrier.
//!
//! Lock order is fixed: a thread takes its [`RoleGate`] slot before it
//! enters the barrier's state lock, and gate releases never block.

pub mod cancel;
pub mod gate;
pub mod rendezvous;
pub(crate) mod wait;

pub use cancel::{CancelToken, WaitOptions};
pub use gate::RoleGate;
pub use rendezvous::{Admission, RendezvousBarrier};
