use once_cell::sync::Lazy;
use std::fmt;
use std::sync::{PoisonError, RwLock};
use string_interner::{DefaultBackend, DefaultSymbol, StringInterner};

static INTERNER: Lazy<RwLock<StringInterner<DefaultBackend>>> =
    Lazy::new(|| RwLock::new(StringInterner::default()));

/// A name that has been interned in the global string interner.
///
/// Symbols, keywords and environment keys all go through here, so name
/// comparison during lookup is an integer comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InternedSymbol(DefaultSymbol);

impl InternedSymbol {
    /// Intern a string and return an InternedSymbol
    pub fn new(s: &str) -> Self {
        let mut interner = INTERNER.write().unwrap_or_else(PoisonError::into_inner);
        InternedSymbol(interner.get_or_intern(s))
    }

    /// Resolve the interned symbol back to its string representation
    pub fn resolve(&self) -> String {
        self.with_str(str::to_string)
    }

    /// Run a function against the interned text without allocating.
    pub fn with_str<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&str) -> R,
    {
        let interner = INTERNER.read().unwrap_or_else(PoisonError::into_inner);
        // Every InternedSymbol was produced by this interner.
        f(interner.resolve(self.0).unwrap_or_default())
    }
}

impl From<&str> for InternedSymbol {
    fn from(s: &str) -> Self {
        InternedSymbol::new(s)
    }
}

impl fmt::Display for InternedSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with_str(|s| write!(f, "{s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_same_string_returns_same_symbol() {
        let sym1 = InternedSymbol::new("foo");
        let sym2 = InternedSymbol::new("foo");
        assert_eq!(sym1, sym2);
    }

    #[test]
    fn test_intern_different_strings_returns_different_symbols() {
        assert_ne!(InternedSymbol::new("foo"), InternedSymbol::new("bar"));
    }

    #[test]
    fn test_with_str_does_not_allocate_a_copy() {
        let sym = InternedSymbol::new("define-type");
        assert_eq!(sym.with_str(|s| s.len()), 11);
        assert_eq!(sym.resolve(), "define-type");
    }

    #[test]
    fn test_display() {
        let sym: InternedSymbol = "display-test".into();
        assert_eq!(format!("{sym}"), "display-test");
    }
}
