//! Error types for value specification parsing
//!
//! Every failure is reported while parsing; a spec that parsed successfully
//! can always be drawn from.

/// Errors raised while parsing a value specification
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Nothing to parse
    #[error("value is empty")]
    Empty,

    /// A range that is not exactly `min to max`
    #[error("invalid range format {input:?}: it must be in the form of \"min to max\" like \"1.5 to 6\"")]
    MalformedRange { input: String },

    /// A scalar token that does not parse as its kind
    #[error("invalid {kind} {token:?}: {reason}")]
    InvalidToken {
        kind: &'static str,
        token: String,
        reason: String,
    },

    /// A size token with a suffix outside the supported multipliers
    #[error("invalid syntax for size {token:?}: expected a byte count or one of the suffixes Ki, Mi, Gi, Ti, K, M, G, T")]
    UnknownSizeSuffix { token: String },
}

impl ParseError {
    /// Create an invalid token error
    pub fn invalid_token(
        kind: &'static str,
        token: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Self::InvalidToken {
            kind,
            token: token.into(),
            reason: reason.to_string(),
        }
    }
}
