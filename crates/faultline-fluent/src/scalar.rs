//! Scalar kinds a [`ValueSpec`](crate::ValueSpec) can hold

use crate::error::ParseError;
use rand::Rng;
use std::fmt;
use std::time::Duration;

/// A single parseable, orderable, randomly-sampleable value
pub trait Scalar: Copy + PartialOrd + fmt::Debug + Send + Sync + 'static {
    /// Human name of the kind, used in error messages
    const KIND: &'static str;

    /// Parse one already-trimmed token
    ///
    /// # Errors
    /// Returns `ParseError` when the token is not a valid literal of this kind.
    fn parse_token(token: &str) -> Result<Self, ParseError>;

    /// Uniformly sample a value in `[low, high]`; callers guarantee `low <= high`
    fn sample_between<R: Rng + ?Sized>(low: Self, high: Self, rng: &mut R) -> Self;

    /// Neutral value used to pad missing sequences
    fn zero() -> Self;

    /// Render as a token [`parse_token`](Self::parse_token) accepts
    fn to_token(&self) -> String;
}

impl Scalar for f64 {
    const KIND: &'static str = "float";

    fn parse_token(token: &str) -> Result<Self, ParseError> {
        let value: f64 = token
            .parse()
            .map_err(|e| ParseError::invalid_token(Self::KIND, token, e))?;

        if !value.is_finite() {
            return Err(ParseError::invalid_token(Self::KIND, token, "value is not finite"));
        }

        Ok(value)
    }

    fn sample_between<R: Rng + ?Sized>(low: Self, high: Self, rng: &mut R) -> Self {
        if low >= high {
            return low;
        }
        rng.gen_range(low..=high)
    }

    fn zero() -> Self {
        0.0
    }

    fn to_token(&self) -> String {
        self.to_string()
    }
}

impl Scalar for Duration {
    const KIND: &'static str = "duration";

    fn parse_token(token: &str) -> Result<Self, ParseError> {
        // a bare zero is the only unit-less duration
        if token == "0" {
            return Ok(Duration::ZERO);
        }

        humantime::parse_duration(token).map_err(|e| ParseError::invalid_token(Self::KIND, token, e))
    }

    fn sample_between<R: Rng + ?Sized>(low: Self, high: Self, rng: &mut R) -> Self {
        if low >= high {
            return low;
        }
        rng.gen_range(low..=high)
    }

    fn zero() -> Self {
        Duration::ZERO
    }

    fn to_token(&self) -> String {
        if self.is_zero() {
            return "0".to_string();
        }
        humantime::format_duration(*self).to_string()
    }
}
