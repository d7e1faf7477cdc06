//! Attribute names.
//!
//! A registry interns every name an attribute is added under and keys its
//! tables by the resulting [`Ident`], so aliases and lookups compare integers.

use std::fmt;

use lasso::Rodeo;
use serde::{Deserialize, Serialize};

/// An interned attribute name, valid within the [`Interner`] that issued it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Ident(u32);

impl Ident {
    /// Creates an `Ident` from a raw index, e.g. when replaying a recorded
    /// event stream.
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

// SAFETY: `try_from_usize` only accepts values that fit in a `u32`, and
// `into_usize` widens that same value back, so the round trip is exact.
unsafe impl lasso::Key for Ident {
    fn into_usize(self) -> usize {
        self.0 as usize
    }

    fn try_from_usize(int: usize) -> Option<Self> {
        u32::try_from(int).ok().map(Ident)
    }
}

/// The set of attribute names known to one registry.
pub struct Interner {
    names: Rodeo<Ident>,
}

impl Interner {
    /// Creates an empty interner.
    pub fn new() -> Self {
        Self {
            names: Rodeo::new(),
        }
    }

    /// Returns the identifier of `name`, interning it first if needed.
    pub fn intern(&mut self, name: &str) -> Ident {
        self.names.get_or_intern(name)
    }

    /// Returns the identifier of `name` without interning it.
    pub fn lookup(&self, name: &str) -> Option<Ident> {
        self.names.get(name)
    }

    /// Returns the name behind `ident`, or `None` if another interner issued it.
    pub fn name(&self, ident: Ident) -> Option<&str> {
        self.names.try_resolve(&ident)
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if nothing has been interned.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Interner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interner").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let mut interner = Interner::new();
        let min = interner.intern("min");
        let depth = interner.intern("depth");
        assert_ne!(min, depth);
        assert_eq!(interner.intern("min"), min);
        assert_eq!(interner.len(), 2);
        assert_eq!(interner.name(depth), Some("depth"));
    }

    #[test]
    fn lookup_never_interns() {
        let mut interner = Interner::new();
        assert_eq!(interner.lookup("repmin"), None);
        assert!(interner.is_empty());
        let id = interner.intern("repmin");
        assert_eq!(interner.lookup("repmin"), Some(id));
    }

    #[test]
    fn foreign_ident_has_no_name() {
        let interner = Interner::new();
        assert_eq!(interner.name(Ident::from_raw(7)), None);
    }
}
