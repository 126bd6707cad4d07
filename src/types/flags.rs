//! Fixed-size flag sets for policy decisions.
//!
//! Every decision the policy advisor makes is a set of independent checks.
//! [`FlagSet`] stores such a set in a single `u32`, so membership, equality and
//! subset tests are constant time. "Not yet decided" is represented by wrapping
//! the set in an `Option`, never by an empty set.

use std::fmt;
use std::marker::PhantomData;
use std::ops::{BitAnd, BitOr, Sub};

/// An enumeration that can be stored in a [`FlagSet`].
///
/// Implementors list every variant in `ALL` and map each to a distinct bit
/// position below 32.
pub trait Flag: Copy + Eq + fmt::Debug + 'static {
    const ALL: &'static [Self];

    fn bit_index(self) -> u32;
}

/// A set of flags of one kind, stored as a bit mask.
pub struct FlagSet<F: Flag> {
    bits: u32,
    _marker: PhantomData<F>,
}

impl<F: Flag> FlagSet<F> {
    const fn from_bits(bits: u32) -> Self {
        Self {
            bits,
            _marker: PhantomData,
        }
    }

    fn mask(flag: F) -> u32 {
        1u32 << flag.bit_index()
    }

    /// The empty set
    pub const fn empty() -> Self {
        Self::from_bits(0)
    }

    /// Every variant of `F`
    pub fn all() -> Self {
        F::ALL.iter().copied().collect()
    }

    /// Build a set from a slice of flags
    pub fn of(flags: &[F]) -> Self {
        flags.iter().copied().collect()
    }

    pub fn contains(&self, flag: F) -> bool {
        self.bits & Self::mask(flag) != 0
    }

    pub fn insert(&mut self, flag: F) -> bool {
        let present = self.contains(flag);
        self.bits |= Self::mask(flag);
        !present
    }

    pub fn remove(&mut self, flag: F) -> bool {
        let present = self.contains(flag);
        self.bits &= !Self::mask(flag);
        present
    }

    /// Builder-style insert
    pub fn with(mut self, flag: F) -> Self {
        self.insert(flag);
        self
    }

    /// Builder-style remove
    pub fn without(mut self, flag: F) -> Self {
        self.remove(flag);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    pub fn is_subset(&self, other: &Self) -> bool {
        self.bits & !other.bits == 0
    }

    pub fn union(&self, other: &Self) -> Self {
        Self::from_bits(self.bits | other.bits)
    }

    pub fn intersection(&self, other: &Self) -> Self {
        Self::from_bits(self.bits & other.bits)
    }

    pub fn difference(&self, other: &Self) -> Self {
        Self::from_bits(self.bits & !other.bits)
    }

    /// Iterate members in declaration order
    pub fn iter(&self) -> impl Iterator<Item = F> + '_ {
        F::ALL.iter().copied().filter(move |flag| self.contains(*flag))
    }
}

impl<F: Flag> Clone for FlagSet<F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<F: Flag> Copy for FlagSet<F> {}

impl<F: Flag> PartialEq for FlagSet<F> {
    fn eq(&self, other: &Self) -> bool {
        self.bits == other.bits
    }
}

impl<F: Flag> Eq for FlagSet<F> {}

impl<F: Flag> std::hash::Hash for FlagSet<F> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.bits.hash(state);
    }
}

impl<F: Flag> Default for FlagSet<F> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<F: Flag> fmt::Debug for FlagSet<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<F: Flag> FromIterator<F> for FlagSet<F> {
    fn from_iter<I: IntoIterator<Item = F>>(iter: I) -> Self {
        let mut set = Self::empty();
        for flag in iter {
            set.insert(flag);
        }
        set
    }
}

impl<F: Flag> Extend<F> for FlagSet<F> {
    fn extend<I: IntoIterator<Item = F>>(&mut self, iter: I) {
        for flag in iter {
            self.insert(flag);
        }
    }
}

impl<F: Flag> From<F> for FlagSet<F> {
    fn from(flag: F) -> Self {
        Self::empty().with(flag)
    }
}

impl<F: Flag> BitOr for FlagSet<F> {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(&rhs)
    }
}

impl<F: Flag> BitAnd for FlagSet<F> {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        self.intersection(&rhs)
    }
}

impl<F: Flag> Sub for FlagSet<F> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self.difference(&rhs)
    }
}
