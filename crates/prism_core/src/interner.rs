//! Name Interner
//!
//! Maps strings to compact [`NameId`] handles and back. Pass names, draw
//! groups, texture names and uniform variable names are all compared through
//! these handles instead of string comparison.
//!
//! Handles are assigned monotonically starting at `1`; [`NameId::INVALID`]
//! (`0`) is never handed out. Once assigned, a handle is never reused or
//! renumbered for the lifetime of the [`NameMap`].
//!
//! Storage is a [`lasso::Rodeo`]. The renderer is single-threaded, so the
//! non-atomic interner is used and passed around explicitly rather than
//! living in a global.

use std::fmt;

use lasso::{Key, Rodeo, Spur};

/// An interned name handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NameId(u32);

impl NameId {
    /// The reserved "no name" handle.
    pub const INVALID: NameId = NameId(0);

    /// Returns `true` for any handle produced by a [`NameMap`].
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// Raw integer value of the handle.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    fn from_spur(spur: Spur) -> Self {
        NameId(spur.into_usize() as u32 + 1)
    }

    fn to_spur(self) -> Option<Spur> {
        if self.is_valid() {
            Spur::try_from_usize(self.0 as usize - 1)
        } else {
            None
        }
    }
}

impl fmt::Display for NameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Bidirectional string ↔ [`NameId`] map.
#[derive(Debug, Default)]
pub struct NameMap {
    rodeo: Rodeo<Spur>,
}

impl NameMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle for `name`, interning it if it has not been seen.
    pub fn add(&mut self, name: &str) -> NameId {
        NameId::from_spur(self.rodeo.get_or_intern(name))
    }

    /// Looks up an existing handle without interning.
    #[must_use]
    pub fn id_of(&self, name: &str) -> Option<NameId> {
        self.rodeo.get(name).map(NameId::from_spur)
    }

    /// Resolves a handle back to its string.
    ///
    /// Returns `None` for [`NameId::INVALID`] and for handles that were not
    /// produced by this map.
    #[must_use]
    pub fn name_of(&self, id: NameId) -> Option<&str> {
        id.to_spur().and_then(|spur| self.rodeo.try_resolve(&spur))
    }

    /// Resolves a handle for display purposes, falling back to `"<unknown>"`.
    #[must_use]
    pub fn display(&self, id: NameId) -> &str {
        self.name_of(id).unwrap_or("<unknown>")
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rodeo.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rodeo.is_empty()
    }
}
