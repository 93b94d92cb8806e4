//! Error types returned by group specs, gates and the rendezvous barrier.

use std::fmt;

/// Why a [`GroupSpec`](crate::GroupSpec) was rejected at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    /// The role mapping was empty.
    Empty,
    /// A role was given a required count of zero.
    ZeroCount {
        /// `Debug` rendering of the offending role.
        role: String,
    },
    /// The same role appeared more than once.
    DuplicateRole {
        /// `Debug` rendering of the offending role.
        role: String,
    },
    /// The total group size exceeds [`MAX_GROUP_SIZE`](crate::MAX_GROUP_SIZE).
    TooLarge {
        /// Requested total group size.
        size: usize,
        /// Largest accepted group size.
        max: usize,
    },
}

impl fmt::Display for SpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "group spec has no roles"),
            Self::ZeroCount { role } => write!(f, "role {role} requires a positive count"),
            Self::DuplicateRole { role } => write!(f, "role {role} listed more than once"),
            Self::TooLarge { size, max } => {
                write!(f, "group size {size} exceeds the maximum of {max}")
            }
        }
    }
}

impl std::error::Error for SpecError {}

/// Error returned by bonding operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BondError {
    /// The group spec failed validation.
    InvalidGroupSpec(SpecError),
    /// `arrive` was called with a role the group spec does not contain.
    UnknownRole(String),
    /// The barrier was shut down, the gate closed, or the caller's
    /// [`CancelToken`](crate::CancelToken) fired.
    Cancelled,
    /// The caller's deadline passed before its group was released.
    TimedOut,
}

impl BondError {
    pub(crate) fn unknown_role(role: &impl fmt::Debug) -> Self {
        Self::UnknownRole(format!("{role:?}"))
    }

    /// Returns true for the two errors a waiting arrival can end with.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Cancelled | Self::TimedOut)
    }
}

impl fmt::Display for BondError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidGroupSpec(reason) => write!(f, "invalid group spec: {reason}"),
            Self::UnknownRole(role) => write!(f, "role {role} is not part of the group spec"),
            Self::Cancelled => write!(f, "arrival cancelled"),
            Self::TimedOut => write!(f, "arrival timed out"),
        }
    }
}

impl std::error::Error for BondError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidGroupSpec(reason) => Some(reason),
            _ => None,
        }
    }
}

impl From<SpecError> for BondError {
    fn from(reason: SpecError) -> Self {
        Self::InvalidGroupSpec(reason)
    }
}
