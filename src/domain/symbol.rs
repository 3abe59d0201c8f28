//! Ticker symbols.
//!
//! Every symbol entering the system goes through [`Symbol::parse`], which trims
//! and uppercases the input so `"aapl"`, `" AAPL "` and `"AAPL"` all resolve to
//! the same cache key.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

const MAX_SYMBOL_LEN: usize = 32;

/// Errors raised while normalising a ticker symbol.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SymbolError {
    #[error("symbol is empty")]
    Empty,
    #[error("symbol `{input}` exceeds {MAX_SYMBOL_LEN} characters")]
    TooLong { input: String },
    #[error("symbol `{input}` contains unsupported character `{character}`")]
    InvalidCharacter { input: String, character: char },
}

/// An uppercase ticker symbol, unique cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Normalise raw input into a symbol.
    pub fn parse(input: &str) -> Result<Self, SymbolError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(SymbolError::Empty);
        }
        if trimmed.chars().count() > MAX_SYMBOL_LEN {
            return Err(SymbolError::TooLong {
                input: trimmed.to_string(),
            });
        }

        let normalized = trimmed.to_ascii_uppercase();
        if let Some(character) = normalized.chars().find(|c| !is_symbol_char(*c)) {
            return Err(SymbolError::InvalidCharacter {
                input: trimmed.to_string(),
                character,
            });
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Index (`^GSPC`), futures (`ES=F`), FX (`EURUSD=X`), share classes (`BRK-B`, `BF.B`).
fn is_symbol_char(c: char) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, '.' | '-' | '^' | '=')
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Symbol {
    type Err = SymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Symbol::parse(&raw).map_err(serde::de::Error::custom)
    }
}
