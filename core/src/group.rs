//! Property groups.
//!
//! A property group names a category of view state that can go stale
//! independently of the rest, such as the view's size or its selection.
//! Groups are single bits of a [`Groups`] mask, so any combination of them can
//! be described (and tested for coverage) with plain bitwise arithmetic.

use core::fmt;
use core::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

/// A combination of property groups, stored as a 32-bit mask.
///
/// [`Groups::ALL`] is the sentinel with every bit set. It is a superset of any
/// group, including groups that derived view types define later, and is the
/// coverage of a full render.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Groups(u32);

impl Groups {
    /// No groups.
    pub const NONE: Self = Self(0);
    /// Properties with no visual impact. Changing them marks nothing dirty.
    pub const IGNORED: Self = Self::NONE;
    /// Catch-all group for properties without a more specific mapping.
    pub const GENERAL: Self = Self(1);
    /// The view's dimensions.
    pub const SIZE: Self = Self(1 << 1);
    /// The view's selection state.
    pub const SELECTION: Self = Self(1 << 2);
    /// Every group, present and future.
    pub const ALL: Self = Self(!0);

    /// Number of bits taken by the built-in groups.
    pub(crate) const BUILTIN_BITS: u32 = 3;
    /// Number of bits available to named groups. The top bit is left out so
    /// that no named group can be confused with [`Groups::ALL`].
    pub(crate) const MAX_NAMED_BITS: u32 = 31;

    /// Creates a mask from raw bits.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns the raw bits of this mask.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns `true` when no group is included.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` when every group in `other` is also in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the groups present in either mask.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns the groups present in both masks.
    #[must_use]
    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Returns the groups of `self` that are not in `other`.
    #[must_use]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl BitOr for Groups {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for Groups {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

impl BitAnd for Groups {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        self.intersection(rhs)
    }
}

impl BitAndAssign for Groups {
    fn bitand_assign(&mut self, rhs: Self) {
        *self = self.intersection(rhs);
    }
}

impl Not for Groups {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0)
    }
}

impl fmt::Debug for Groups {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::ALL {
            return f.write_str("Groups(ALL)");
        }
        if self.is_empty() {
            return f.write_str("Groups(NONE)");
        }

        f.write_str("Groups(")?;
        let mut first = true;
        let mut rest = self.0;
        for (name, group) in [
            ("GENERAL", Self::GENERAL),
            ("SIZE", Self::SIZE),
            ("SELECTION", Self::SELECTION),
        ] {
            if self.contains(group) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
                rest &= !group.0;
            }
        }
        if rest != 0 {
            if !first {
                f.write_str(" | ")?;
            }
            write!(f, "{rest:#x}")?;
        }
        f.write_str(")")
    }
}
