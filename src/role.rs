//! Role tags.

use core::fmt::Debug;
use core::hash::Hash;

/// A tag identifying a thread's kind within a coordination group.
///
/// Any small, copyable, comparable tag qualifies: usually a fieldless enum,
/// or `char` when roles come from text such as `"OOHHHH"`.
pub trait Role: Copy + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> Role for T where T: Copy + Eq + Hash + Debug + Send + Sync + 'static {}
