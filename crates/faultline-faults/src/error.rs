//! Validation errors raised by fault module declarations

use faultline_planner::PlanError;

/// A fault module declaration that cannot be wired
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModuleError {
    /// Neither an inline specification nor a plan reference was given
    #[error("no {what} specification or plan refs is set")]
    MissingPlan { what: &'static str },

    /// Module accepts at most one plan reference
    #[error("plan refs can not contain more than one element")]
    TooManyPlanRefs,

    /// The plan built from inline fields is invalid
    #[error("inline plan is invalid: {0}")]
    InvalidInlinePlan(#[from] PlanError),

    /// Unknown HTTP method
    #[error("{0} is not a valid HTTP method")]
    InvalidMethod(String),

    /// A route fault that could never pick a failure status
    #[error("no failure category is enabled")]
    NoFailureCategory,

    /// Route path must be absolute
    #[error("path {0} must start with /")]
    InvalidPath(String),

    /// Interface and port do not form a socket address
    #[error("address {address} is invalid: {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Listener could not be bound
    #[error("failed to listen on {address}: {reason}")]
    Listen { address: String, reason: String },
}

impl ModuleError {
    /// Create a listen error
    pub fn listen(address: impl ToString, reason: impl ToString) -> Self {
        Self::Listen {
            address: address.to_string(),
            reason: reason.to_string(),
        }
    }
}
