//! The edge-relation alphabet and dense sets over it.
//!
//! Every edge in a dependency graph carries a [`RelSet`]: a non-empty
//! subset of the five relations a pair of transactions can stand in.
//! Subset tests on these sets are the single hot comparison inside every
//! graph walk, so the set is a `u8` bit-mask rather than a hash set.

use std::fmt::{self, Debug, Display, Formatter};

/// A single dependency relation between two transactions.
#[cfg_attr(
    feature = "serde",
    derive(::serde::Serialize, ::serde::Deserialize),
    serde(rename_all = "lowercase")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rel {
    /// Write-write: the target overwrote a version the source installed.
    Ww,
    /// Write-read: the target read a version the source installed.
    Wr,
    /// Read-write (anti-dependency): the target overwrote a version the
    /// source read.
    Rw,
    /// Process order: same logical client, submitted one after the other.
    Process,
    /// Realtime order: the source completed before the target began.
    Realtime,
}

impl Rel {
    /// All relations, in the fixed alphabet order used everywhere.
    pub const ALL: [Self; 5] = [Self::Ww, Self::Wr, Self::Rw, Self::Process, Self::Realtime];

    const fn bit(self) -> u8 {
        1 << self as u8
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ww => "ww",
            Self::Wr => "wr",
            Self::Rw => "rw",
            Self::Process => "process",
            Self::Realtime => "realtime",
        }
    }
}

impl Display for Rel {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of [`Rel`]s, packed into one byte.
#[derive(Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelSet(u8);

impl RelSet {
    pub const EMPTY: Self = Self(0);

    /// The full alphabet {ww, wr, rw, process, realtime}.
    pub const ALL: Self = Self::of(&Rel::ALL);

    pub const WW: Self = Self::single(Rel::Ww);
    pub const WR: Self = Self::single(Rel::Wr);
    pub const RW: Self = Self::single(Rel::Rw);
    pub const PROCESS: Self = Self::single(Rel::Process);
    pub const REALTIME: Self = Self::single(Rel::Realtime);

    #[must_use]
    pub const fn of(rels: &[Rel]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < rels.len() {
            bits |= rels[i].bit();
            i += 1;
        }
        Self(bits)
    }

    #[must_use]
    pub const fn single(rel: Rel) -> Self {
        Self(rel.bit())
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn contains(self, rel: Rel) -> bool {
        self.0 & rel.bit() != 0
    }

    /// `self ⊆ other`. This is the "intersects" test of the search layer:
    /// an edge participates in a projection iff its whole label fits.
    #[must_use]
    pub const fn is_subset_of(self, other: Self) -> bool {
        self.0 & !other.0 == 0
    }

    /// `other ⊆ self`.
    #[must_use]
    pub const fn contains_all(self, other: Self) -> bool {
        other.is_subset_of(self)
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn len(self) -> u32 {
        self.0.count_ones()
    }

    /// Member relations in alphabet order.
    pub fn iter(self) -> impl Iterator<Item = Rel> {
        Rel::ALL.into_iter().filter(move |rel| self.contains(*rel))
    }

    /// The relation that best explains an edge bearing this label: data
    /// dependencies (ww, wr, rw) before pure ordering edges. The cycle
    /// classifier tallies steps by this relation.
    #[must_use]
    pub fn primary(self) -> Option<Rel> {
        self.iter().next()
    }
}

// RelSet crosses serialization boundaries as the list of its members,
// not as the raw bit-mask: `["ww", "realtime"]`.

#[cfg(feature = "serde")]
impl ::serde::Serialize for RelSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: ::serde::Serializer,
    {
        serializer.collect_seq(self.iter())
    }
}

#[cfg(feature = "serde")]
impl<'de> ::serde::Deserialize<'de> for RelSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: ::serde::Deserializer<'de>,
    {
        let rels = <Vec<Rel> as ::serde::Deserialize>::deserialize(deserializer)?;
        Ok(rels.into_iter().collect())
    }
}

impl FromIterator<Rel> for RelSet {
    fn from_iter<I: IntoIterator<Item = Rel>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::EMPTY, |acc, rel| acc.union(Self::single(rel)))
    }
}

impl From<Rel> for RelSet {
    fn from(rel: Rel) -> Self {
        Self::single(rel)
    }
}

impl Display for RelSet {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        for (i, rel) in self.iter().enumerate() {
            if i > 0 {
                write!(f, "+")?;
            }
            write!(f, "{rel}")?;
        }
        Ok(())
    }
}

impl Debug for RelSet {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{{{self}}}")
    }
}
