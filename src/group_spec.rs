//! `GroupSpec` — the required composition of one releasable group.

use std::collections::HashMap;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{BondError, SpecError};
use crate::role::Role;

/// Largest total group size a [`GroupSpec`] accepts.
///
/// Gate capacities are stored as `u32`, and a group this large is already far
/// beyond any sensible rendezvous.
pub const MAX_GROUP_SIZE: usize = 1024;

/// Immutable mapping from role to the number of threads of that role a group
/// needs.
///
/// Roles keep the order they were supplied in; the barrier uses that order as
/// a dense index for its per-role counters and gates.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(
    try_from = "HashMap<R, usize>",
    bound(deserialize = "R: Deserialize<'de>")
)]
pub struct GroupSpec<R: Role> {
    roles: Vec<R>,
    counts: Vec<usize>,
    size: usize,
}

impl<R: Role> GroupSpec<R> {
    /// Builds a spec from `(role, count)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`BondError::InvalidGroupSpec`] if the mapping is empty, a
    /// count is zero, a role repeats, or the total exceeds
    /// [`MAX_GROUP_SIZE`].
    pub fn new(counts: impl IntoIterator<Item = (R, usize)>) -> Result<Self, BondError> {
        let mut roles = Vec::new();
        let mut required = Vec::new();
        let mut size = 0usize;

        for (role, count) in counts {
            if count == 0 {
                let role = format!("{role:?}");
                return Err(SpecError::ZeroCount { role }.into());
            }
            if roles.contains(&role) {
                let role = format!("{role:?}");
                return Err(SpecError::DuplicateRole { role }.into());
            }
            size = size.saturating_add(count);
            roles.push(role);
            required.push(count);
        }

        if roles.is_empty() {
            return Err(SpecError::Empty.into());
        }
        if size > MAX_GROUP_SIZE {
            return Err(SpecError::TooLarge {
                size,
                max: MAX_GROUP_SIZE,
            }
            .into());
        }

        Ok(Self {
            roles,
            counts: required,
            size,
        })
    }

    /// Number of threads of `role` one group needs; zero for unknown roles.
    #[inline]
    pub fn required_count(&self, role: R) -> usize {
        self.index_of(role).map_or(0, |i| self.counts[i])
    }

    /// Total number of threads in one group.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of distinct roles.
    #[inline]
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Always false: a spec has at least one role.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns true if `role` is part of this group spec.
    #[inline]
    pub fn contains(&self, role: R) -> bool {
        self.index_of(role).is_some()
    }

    /// Roles in declaration order.
    pub fn roles(&self) -> impl Iterator<Item = R> + '_ {
        self.roles.iter().copied()
    }

    /// `(role, required count)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (R, usize)> + '_ {
        self.roles.iter().copied().zip(self.counts.iter().copied())
    }

    // Role sets are tiny, so a scan beats hashing.
    pub(crate) fn index_of(&self, role: R) -> Option<usize> {
        self.roles.iter().position(|r| *r == role)
    }

    pub(crate) fn count_at(&self, index: usize) -> usize {
        self.counts[index]
    }

    pub(crate) fn role_at(&self, index: usize) -> R {
        self.roles[index]
    }

    /// Returns true if `arrived` (indexed like `roles`) is exactly one group.
    pub(crate) fn is_complete(&self, arrived: &[usize]) -> bool {
        arrived.len() == self.counts.len() && arrived.iter().zip(&self.counts).all(|(a, c)| a == c)
    }
}

impl<R: Role> TryFrom<HashMap<R, usize>> for GroupSpec<R> {
    type Error = BondError;

    fn try_from(counts: HashMap<R, usize>) -> Result<Self, Self::Error> {
        Self::new(counts)
    }
}

impl<R: Role + Serialize> Serialize for GroupSpec<R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.roles.len()))?;
        for (role, count) in self.iter() {
            map.serialize_entry(&role, &count)?;
        }
        map.end()
    }
}
