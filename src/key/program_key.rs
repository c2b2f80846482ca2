//! Packed program key.

use std::fmt;
use std::str::FromStr;

use crate::errors::{Result, ShaderCacheError};

/// Bit-packed encoding of every render-state field relevant to shader
/// selection. Equality and hashing are exact bitwise comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ProgramKey {
    halves: [u64; 2],
}

impl ProgramKey {
    pub const ZERO: Self = Self { halves: [0, 0] };

    #[inline]
    #[must_use]
    pub const fn from_halves(half0: u64, half1: u64) -> Self {
        Self {
            halves: [half0, half1],
        }
    }

    #[inline]
    #[must_use]
    pub const fn half(&self, index: usize) -> u64 {
        self.halves[index]
    }

    #[inline]
    #[must_use]
    pub const fn halves(&self) -> [u64; 2] {
        self.halves
    }

    /// Parses a hex string the way key manifests write them.
    ///
    /// A leading `0x` / `x` is skipped and parsing stops at the first
    /// non-hex character, so trailing junk is tolerated. The two halves
    /// are separated by `_` (half 0 first, as [`fmt::Display`] prints them);
    /// a single hex run is the low half, half 1.
    pub fn parse_hex(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let (first, second) = match trimmed.split_once('_') {
            Some((a, b)) => (a, Some(b)),
            None => (trimmed, None),
        };
        let invalid = || ShaderCacheError::InvalidKeyString(text.to_string());
        let first = parse_hex_word(first).ok_or_else(invalid)?;
        match second {
            Some(part) => {
                let half1 = parse_hex_word(part).ok_or_else(invalid)?;
                Ok(Self::from_halves(first, half1))
            }
            None => Ok(Self::from_halves(0, first)),
        }
    }
}

fn parse_hex_word(text: &str) -> Option<u64> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .or_else(|| text.strip_prefix('x'))
        .unwrap_or(text);
    let end = digits
        .find(|c: char| !c.is_ascii_hexdigit())
        .unwrap_or(digits.len());
    let digits = &digits[..end];
    if digits.is_empty() || digits.len() > 16 {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}

impl fmt::Display for ProgramKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}_{:016X}", self.halves[0], self.halves[1])
    }
}

impl FromStr for ProgramKey {
    type Err = ShaderCacheError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_hex(s)
    }
}
