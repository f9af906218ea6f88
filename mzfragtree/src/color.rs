use std::{
    fmt::Display,
    ops::{BitOr, BitOrAssign},
};

use serde::{Deserialize, Serialize};

/// A set of working colors, each color is a single bit in a 64 bit word. This means that at most
/// [`ColorSet::MAX_COLORS`] working colors can be used at the same time.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct ColorSet(u64);

impl ColorSet {
    /// The maximal number of distinct working colors
    pub const MAX_COLORS: usize = 64;
    /// The empty set
    pub const EMPTY: Self = Self(0);

    /// A set with only the given color.
    /// # Panics
    /// If the color is not below [`Self::MAX_COLORS`].
    pub const fn single(color: u8) -> Self {
        assert!((color as usize) < Self::MAX_COLORS);
        Self(1 << color)
    }

    /// A set with all colors below the given number.
    /// # Panics
    /// If the number is above [`Self::MAX_COLORS`].
    pub const fn first(number: usize) -> Self {
        assert!(number <= Self::MAX_COLORS);
        if number == Self::MAX_COLORS {
            Self(u64::MAX)
        } else {
            Self((1 << number) - 1)
        }
    }

    /// Build a set from the raw bits
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Get the raw bits
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Check if the given color is part of this set
    pub const fn contains(self, color: u8) -> bool {
        (color as usize) < Self::MAX_COLORS && self.0 & (1 << color) != 0
    }

    /// Check if both sets have no color in common
    pub const fn is_disjoint(self, other: Self) -> bool {
        self.0 & other.0 == 0
    }

    /// Check if all colors of this set are in the other set
    pub const fn is_subset(self, other: Self) -> bool {
        self.0 & !other.0 == 0
    }

    /// All colors in either set
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// All colors in this set that are not in the other set
    #[must_use]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// The number of colors in this set
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Check if this set is empty
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterate over all colors in this set in ascending order
    pub fn iter(self) -> impl Iterator<Item = u8> {
        let mut rest = self.0;
        std::iter::from_fn(move || {
            if rest == 0 {
                None
            } else {
                let color = rest.trailing_zeros() as u8;
                rest &= rest - 1;
                Some(color)
            }
        })
    }
}

impl BitOr for ColorSet {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

impl BitOrAssign for ColorSet {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

impl FromIterator<u8> for ColorSet {
    fn from_iter<T: IntoIterator<Item = u8>>(iter: T) -> Self {
        iter.into_iter()
            .fold(Self::EMPTY, |set, color| set | Self::single(color))
    }
}

impl Display for ColorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (index, color) in self.iter().enumerate() {
            if index != 0 {
                write!(f, ",")?;
            }
            write!(f, "{color}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
#[expect(clippy::missing_panics_doc)]
mod tests {
    use super::ColorSet;

    #[test]
    fn set_operations() {
        let a: ColorSet = [0, 3, 5].into_iter().collect();
        let b = ColorSet::single(4) | ColorSet::single(63);
        assert!(a.is_disjoint(b));
        assert!(!a.is_disjoint(ColorSet::single(3)));
        assert_eq!(a.union(b).len(), 5);
        assert_eq!(a.difference(ColorSet::single(3)).iter().collect::<Vec<_>>(), [0, 5]);
        assert!(ColorSet::single(5).is_subset(a));
        assert!(!b.is_subset(a));
        assert!(b.contains(63));
        assert!(!b.contains(64));
        assert_eq!(a.to_string(), "{0,3,5}");
    }

    #[test]
    fn first() {
        assert_eq!(ColorSet::first(0), ColorSet::EMPTY);
        assert_eq!(ColorSet::first(3).bits(), 0b111);
        assert_eq!(ColorSet::first(64).len(), 64);
    }
}
