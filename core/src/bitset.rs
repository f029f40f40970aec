//! Dirty-region tracking.

use core::fmt;

use crate::group::Groups;

/// The set of property groups that are out of sync with the last render.
///
/// A view starts with every bit set. The change classifier ORs groups in as
/// the model changes, and the update loop clears them as partial updates
/// succeed. "Everything" is represented by the [`Groups::ALL`] sentinel
/// rather than by the union of currently known groups, so groups defined by
/// derived view types are covered as well.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct DirtySet {
    bits: Groups,
}

impl DirtySet {
    /// Creates a clean set.
    #[must_use]
    pub const fn new() -> Self {
        Self { bits: Groups::NONE }
    }

    /// Creates a fully dirty set.
    #[must_use]
    pub const fn all() -> Self {
        Self { bits: Groups::ALL }
    }

    /// Returns `true` when no bits are set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.bits.is_empty()
    }

    /// Returns the bits currently set.
    #[must_use]
    pub const fn get(self) -> Groups {
        self.bits
    }

    /// Returns `true` when the set is exactly `mask`.
    #[must_use]
    pub fn is(self, mask: Groups) -> bool {
        self.bits == mask
    }

    /// Sets the bits of `mask`.
    pub fn set(&mut self, mask: Groups) {
        self.bits |= mask;
    }

    /// Sets every bit.
    pub fn set_all(&mut self) {
        self.bits = Groups::ALL;
    }

    /// Clears the bits of `mask`.
    pub fn clear(&mut self, mask: Groups) {
        self.bits = self.bits.difference(mask);
    }

    /// Clears every bit.
    pub fn clear_all(&mut self) {
        self.bits = Groups::NONE;
    }

    /// Returns `true` when no bit outside `mask` is set.
    ///
    /// The empty set is a subset of every mask.
    #[must_use]
    pub fn is_subset_of(self, mask: Groups) -> bool {
        mask.contains(self.bits)
    }
}

impl From<Groups> for DirtySet {
    fn from(bits: Groups) -> Self {
        Self { bits }
    }
}

impl fmt::Debug for DirtySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DirtySet").field(&self.bits).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::DirtySet;
    use crate::group::Groups;

    #[test]
    fn starts_clean_or_full() {
        assert!(DirtySet::new().is_empty());
        assert!(DirtySet::all().is(Groups::ALL));
        assert!(!DirtySet::all().is_empty());
    }

    #[test]
    fn set_and_clear_masks() {
        let mut dirty = DirtySet::new();
        dirty.set(Groups::SIZE);
        dirty.set(Groups::SELECTION);
        assert!(dirty.is(Groups::SIZE | Groups::SELECTION));

        dirty.clear(Groups::SIZE);
        assert!(dirty.is(Groups::SELECTION));

        dirty.clear_all();
        assert!(dirty.is_empty());
    }

    #[test]
    fn set_all_covers_groups_defined_later() {
        let mut dirty = DirtySet::new();
        dirty.set_all();
        let custom = Groups::from_bits(1 << 12);
        assert!(dirty.get().contains(custom));

        dirty.clear(custom);
        assert!(!dirty.get().contains(custom));
        assert!(dirty.get().contains(Groups::SIZE));
    }

    #[test]
    fn subset_checks() {
        let mut dirty = DirtySet::new();
        assert!(dirty.is_subset_of(Groups::NONE));
        assert!(dirty.is_subset_of(Groups::SIZE));

        dirty.set(Groups::SIZE);
        assert!(dirty.is_subset_of(Groups::SIZE));
        assert!(dirty.is_subset_of(Groups::SIZE | Groups::SELECTION));
        assert!(!dirty.is_subset_of(Groups::SELECTION));

        dirty.set_all();
        assert!(dirty.is_subset_of(Groups::ALL));
        assert!(!dirty.is_subset_of(Groups::SIZE));
    }
}
