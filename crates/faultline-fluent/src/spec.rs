//! The exact / range / list specification and its two retrieval modes
//!
//! - [`ValueSpec::draw`] re-evaluates on every call: ranges yield a fresh
//!   random value, lists a random element.
//! - [`ValueSpec::snapshot`] builds the repeating schedule of one plan phase:
//!   exact and ranged specs yield one value (a range freezes a single draw),
//!   lists yield the literal list unchanged.

use crate::error::ParseError;
use crate::scalar::Scalar;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const RANGE_SEPARATOR: &str = " to ";
const LIST_SEPARATOR: char = ',';

/// Parsed shape of a specification
#[derive(Debug, Clone, PartialEq)]
pub enum SpecKind<T> {
    /// A single constant value
    Exactly(T),
    /// An inclusive range, always stored with `min <= max`
    Between { min: T, max: T },
    /// A literal list of values (two or more)
    List(Vec<T>),
}

/// A parsed value specification together with the text it came from
#[derive(Debug, Clone, PartialEq)]
pub struct ValueSpec<T: Scalar> {
    input: String,
    kind: SpecKind<T>,
}

impl<T: Scalar> ValueSpec<T> {
    /// Parse a specification
    ///
    /// # Errors
    /// - `ParseError::Empty` for blank input
    /// - `ParseError::MalformedRange` when a range does not have exactly two parts
    /// - any scalar error for an unparseable token; no partial result is returned
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ParseError::Empty);
        }

        let kind = if trimmed.contains(RANGE_SEPARATOR) {
            let parts: Vec<&str> = trimmed.split(RANGE_SEPARATOR).collect();
            if parts.len() != 2 {
                return Err(ParseError::MalformedRange {
                    input: input.to_string(),
                });
            }

            let start = T::parse_token(parts[0].trim())?;
            let end = T::parse_token(parts[1].trim())?;
            Self::normalized_between(start, end)
        } else if trimmed.ends_with(" to") || trimmed.starts_with("to ") {
            return Err(ParseError::MalformedRange {
                input: input.to_string(),
            });
        } else if trimmed.contains(LIST_SEPARATOR) {
            let values = trimmed
                .split(LIST_SEPARATOR)
                .map(|part| T::parse_token(part.trim()))
                .collect::<Result<Vec<_>, _>>()?;
            SpecKind::List(values)
        } else {
            SpecKind::Exactly(T::parse_token(trimmed)?)
        };

        Ok(Self {
            input: input.to_string(),
            kind,
        })
    }

    /// Build an exact specification
    #[must_use]
    pub fn exactly(value: T) -> Self {
        Self {
            input: value.to_token(),
            kind: SpecKind::Exactly(value),
        }
    }

    /// Build a range specification; bounds are swapped when given in reverse
    #[must_use]
    pub fn between(a: T, b: T) -> Self {
        Self {
            input: format!("{} to {}", a.to_token(), b.to_token()),
            kind: Self::normalized_between(a, b),
        }
    }

    /// Build a list specification; a single-element list collapses to exact
    ///
    /// # Errors
    /// Returns `ParseError::Empty` for an empty list.
    pub fn list(values: Vec<T>) -> Result<Self, ParseError> {
        let input = values
            .iter()
            .map(Scalar::to_token)
            .collect::<Vec<_>>()
            .join(", ");

        let kind = match values.len() {
            0 => return Err(ParseError::Empty),
            1 => SpecKind::Exactly(values[0]),
            _ => SpecKind::List(values),
        };

        Ok(Self { input, kind })
    }

    fn normalized_between(a: T, b: T) -> SpecKind<T> {
        if a > b {
            SpecKind::Between { min: b, max: a }
        } else {
            SpecKind::Between { min: a, max: b }
        }
    }

    /// Parsed shape
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &SpecKind<T> {
        &self.kind
    }

    /// Original input text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.input
    }

    /// Whether this is a `min to max` range
    #[inline]
    #[must_use]
    pub fn is_ranged(&self) -> bool {
        matches!(self.kind, SpecKind::Between { .. })
    }

    /// Normalized `(min, max)` bounds of a range
    #[must_use]
    pub fn range(&self) -> Option<(T, T)> {
        match self.kind {
            SpecKind::Between { min, max } => Some((min, max)),
            _ => None,
        }
    }

    /// Length of every [`snapshot`](Self::snapshot), known without drawing
    #[must_use]
    pub fn snapshot_len(&self) -> usize {
        match &self.kind {
            SpecKind::List(values) => values.len(),
            _ => 1,
        }
    }

    /// Single draw with an explicit randomness source
    pub fn draw_with<R: Rng + ?Sized>(&self, rng: &mut R) -> T {
        match &self.kind {
            SpecKind::Exactly(value) => *value,
            SpecKind::Between { min, max } => T::sample_between(*min, *max, rng),
            SpecKind::List(values) => *values.choose(rng).unwrap_or(&values[0]),
        }
    }

    /// Single draw using the thread-local generator
    #[must_use]
    pub fn draw(&self) -> T {
        self.draw_with(&mut rand::thread_rng())
    }

    /// Sequence snapshot for one plan phase
    pub fn snapshot<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<T> {
        match &self.kind {
            SpecKind::Exactly(value) => vec![*value],
            SpecKind::Between { min, max } => vec![T::sample_between(*min, *max, rng)],
            SpecKind::List(values) => values.clone(),
        }
    }
}

impl<T: Scalar> FromStr for ValueSpec<T> {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<T: Scalar> fmt::Display for ValueSpec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.input)
    }
}

impl<T: Scalar> Serialize for ValueSpec<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.input)
    }
}

/// Configuration documents may carry bare numbers where text is expected
#[derive(Deserialize)]
#[serde(untagged)]
enum RawSpec {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl<'de, T: Scalar> Deserialize<'de> for ValueSpec<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let input = match RawSpec::deserialize(deserializer)? {
            RawSpec::Text(text) => text,
            RawSpec::Integer(n) => n.to_string(),
            RawSpec::Float(n) => n.to_string(),
        };

        Self::parse(&input).map_err(de::Error::custom)
    }
}
