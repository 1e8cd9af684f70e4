//! Instrument Symbols
//!
//! Symbols are normalized exactly once, at the API boundary: raw input is
//! trimmed and uppercased, and anything past that point compares
//! case-sensitively on the canonical form.
//!
//! A raw string may carry several comma-separated tickers (`"aapl, msft"`),
//! matching how the streaming endpoint itself accepts symbol lists.

use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;

// =============================================================================
// Symbol
// =============================================================================

/// Canonical (uppercase) instrument identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(String);

impl Symbol {
    /// Normalize a single raw ticker.
    ///
    /// Returns `None` when the input is blank.
    #[must_use]
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_uppercase()))
        }
    }

    /// The canonical ticker.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Ordered set of canonical symbols.
///
/// Ordering only makes outgoing control frames deterministic; the server does
/// not assign meaning to symbol order.
pub type SymbolSet = BTreeSet<Symbol>;

// =============================================================================
// Normalization
// =============================================================================

/// Normalize raw tickers into a [`SymbolSet`].
///
/// Every entry is split on commas, trimmed and uppercased; blank entries are
/// dropped and duplicates collapse.
pub fn normalize_symbols<I, S>(raw: I) -> SymbolSet
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .flat_map(|entry| {
            entry
                .as_ref()
                .split(',')
                .filter_map(Symbol::new)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Comma-join a symbol set for the wire.
#[must_use]
pub fn join_symbols(symbols: &SymbolSet) -> String {
    symbols
        .iter()
        .map(Symbol::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

/// Anything accepted where the API takes "a symbol or a collection of symbols".
pub trait IntoSymbols {
    /// Normalize into a [`SymbolSet`].
    fn into_symbols(self) -> SymbolSet;
}

impl IntoSymbols for &str {
    fn into_symbols(self) -> SymbolSet {
        normalize_symbols([self])
    }
}

impl IntoSymbols for String {
    fn into_symbols(self) -> SymbolSet {
        normalize_symbols([self])
    }
}

impl IntoSymbols for &String {
    fn into_symbols(self) -> SymbolSet {
        normalize_symbols([self])
    }
}

impl<S: AsRef<str>> IntoSymbols for Vec<S> {
    fn into_symbols(self) -> SymbolSet {
        normalize_symbols(self)
    }
}

impl<S: AsRef<str>> IntoSymbols for &[S] {
    fn into_symbols(self) -> SymbolSet {
        normalize_symbols(self)
    }
}

impl<S: AsRef<str>, const N: usize> IntoSymbols for [S; N] {
    fn into_symbols(self) -> SymbolSet {
        normalize_symbols(self)
    }
}

impl IntoSymbols for SymbolSet {
    fn into_symbols(self) -> SymbolSet {
        self
    }
}

impl IntoSymbols for &SymbolSet {
    fn into_symbols(self) -> SymbolSet {
        self.clone()
    }
}

// =============================================================================
// Tests
// =============================================================================
