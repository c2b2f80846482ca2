//! Strongly-typed program handle.
//!
//! Thin `Copy` wrapper around a `u32` index into the
//! [`PermutationCache`](super::cache::PermutationCache) instance storage.

/// Handle to a cached [`ProgramInstance`](super::instance::ProgramInstance).
///
/// Returned by [`PermutationCache::get_or_create`](super::cache::PermutationCache::get_or_create).
/// Handles of destroyed instances are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub(crate) u32);

impl ProgramId {
    /// Raw index into the instance storage array.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}
