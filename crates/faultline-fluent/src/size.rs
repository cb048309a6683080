//! Byte sizes with binary (`Ki`, `Mi`, `Gi`, `Ti`) and decimal
//! (`K`, `M`, `G`, `T`) multipliers

use crate::error::ParseError;
use crate::scalar::Scalar;
use rand::Rng;
use std::fmt;

const KI: u64 = 1024;
const K: u64 = 1000;

/// Suffixes ordered so two-letter binary forms win over their decimal prefix
const SUFFIXES: [(&str, u64); 8] = [
    ("Ki", KI),
    ("Mi", KI * KI),
    ("Gi", KI * KI * KI),
    ("Ti", KI * KI * KI * KI),
    ("K", K),
    ("M", K * K),
    ("G", K * K * K),
    ("T", K * K * K * K),
];

/// A number of bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteSize(pub u64);

impl ByteSize {
    /// Zero bytes
    pub const ZERO: Self = Self(0);

    /// Create from kibibytes
    #[inline]
    #[must_use]
    pub const fn kib(n: u64) -> Self {
        Self(n * KI)
    }

    /// Create from mebibytes
    #[inline]
    #[must_use]
    pub const fn mib(n: u64) -> Self {
        Self(n * KI * KI)
    }

    /// Raw byte count
    #[inline]
    #[must_use]
    pub const fn bytes(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return write!(f, "0");
        }

        for (suffix, multiplier) in SUFFIXES[..4].iter().rev() {
            if self.0 % multiplier == 0 {
                return write!(f, "{}{}", self.0 / multiplier, suffix);
            }
        }

        write!(f, "{}", self.0)
    }
}

impl Scalar for ByteSize {
    const KIND: &'static str = "size";

    fn parse_token(token: &str) -> Result<Self, ParseError> {
        if token.is_empty() {
            return Err(ParseError::invalid_token(Self::KIND, token, "empty size"));
        }

        if token.bytes().all(|b| b.is_ascii_digit()) {
            return token
                .parse()
                .map(ByteSize)
                .map_err(|e| ParseError::invalid_token(Self::KIND, token, e));
        }

        let (number, multiplier) = SUFFIXES
            .iter()
            .find_map(|(suffix, multiplier)| {
                token
                    .strip_suffix(suffix)
                    .map(|number| (number.trim_end(), *multiplier))
            })
            .ok_or_else(|| ParseError::UnknownSizeSuffix {
                token: token.to_string(),
            })?;

        let count: u64 = number
            .parse()
            .map_err(|e| ParseError::invalid_token(Self::KIND, token, e))?;

        count
            .checked_mul(multiplier)
            .map(ByteSize)
            .ok_or_else(|| ParseError::invalid_token(Self::KIND, token, "size overflows 64 bits"))
    }

    fn sample_between<R: Rng + ?Sized>(low: Self, high: Self, rng: &mut R) -> Self {
        if low >= high {
            return low;
        }
        ByteSize(rng.gen_range(low.0..=high.0))
    }

    fn zero() -> Self {
        Self::ZERO
    }

    fn to_token(&self) -> String {
        self.to_string()
    }
}
