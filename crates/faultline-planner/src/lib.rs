//! Faultline Planner - phased fault schedules
//!
//! Turns declarative, time-varying value specifications into a stream of
//! discrete cycle values delivered on a fixed cadence to fault modules.
//!
//! - **Declaration**: [`PlanSpec`] / [`PhaseSpec`], usually deserialized from config
//! - **Resolution**: each [`SubPlan`] freezes its value sequence, interval and cycle budget
//! - **Execution**: a [`Plan`] drains its phases in order on its own tokio task,
//!   invoking every attached [`Plannable`]'s hooks around each tick's sleep
//! - **Wiring**: the [`PlanRegistry`] binds modules to shared or dedicated plans
//!
//! # Example
//!
//! ```rust,ignore
//! use faultline_planner::prelude::*;
//!
//! let mut registry = PlanRegistry::new(PlannerSettings::default());
//! registry.add_plans(&config.plans)?;
//! registry.attach(cpu_loader)?;
//!
//! for handle in registry.start_all() {
//!     // detached: plans run until exhausted or terminated
//!     drop(handle);
//! }
//! ```

pub mod error;
pub mod plan;
pub mod plannable;
pub mod registry;
pub mod spec;
pub mod sub_plan;
pub mod value;

// Re-exports
pub use error::{PlanError, WiringError};
pub use plan::{Plan, PlanHandle, PlanId, PlanOutcome, PlanState, PlannerSettings};
pub use plannable::{PlanAssignments, Plannable};
pub use registry::{find_duplicates, PlanRegistry};
pub use spec::{PhaseSpec, PlanSpec};
pub use sub_plan::{CycleBudget, Resolution, SubPlan};
pub use value::{Cycle, CycleHooks, CycleValue, HookFn, PlanSignal};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::{
        Cycle, CycleHooks, CycleValue, PhaseSpec, Plan, PlanAssignments, PlanHandle, PlanOutcome,
        PlanRegistry, PlanSignal, PlanSpec, Plannable, PlannerSettings,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
