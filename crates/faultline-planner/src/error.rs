//! Error types for plan validation and wiring
//!
//! Both kinds are fatal and surface before any plan starts. Hooks never
//! return errors: at runtime they only signal continue or terminate.

/// A plan declaration that cannot be scheduled
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    /// Top-level phase fields were combined with `subPlans`
    #[error("percentage, size, interval and duration cannot be combined with subPlans")]
    MixedDeclaration,

    /// Percentage and size lists of one phase disagree in length
    #[error("phase {phase}: percentage yields {percentage} values but size yields {size}")]
    SequenceLengthMismatch {
        phase: usize,
        percentage: usize,
        size: usize,
    },

    /// A phase without duration is not the last one, so later phases could never run
    #[error("phase {phase} has no duration and runs forever, but {remaining} phase(s) follow it")]
    EndlessPhaseNotLast { phase: usize, remaining: usize },
}

/// Errors binding plannable modules to plans
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WiringError {
    /// Two named plans share a name
    #[error("there are duplicate plans: {}", .0.join(", "))]
    DuplicatePlans(Vec<String>),

    /// A named plan failed validation
    #[error("plan {name} is invalid: {source}")]
    InvalidPlan {
        name: String,
        #[source]
        source: PlanError,
    },

    /// A module referenced a plan nobody declared
    #[error("plan {plan} not found for {plannable}")]
    UnknownPlan { plan: String, plannable: String },

    /// Two modules of the same registry share an identity
    #[error("duplicate plannable identity: {0}")]
    DuplicatePlannable(String),

    /// A module wants a dedicated plan but offers neither inline nor default plan
    #[error("no plan available for {0}: declare an inline plan or reference a named one")]
    NoPlanAvailable(String),
}

impl WiringError {
    /// Create an invalid plan error
    pub fn invalid_plan(name: impl Into<String>, source: PlanError) -> Self {
        Self::InvalidPlan {
            name: name.into(),
            source,
        }
    }
}
