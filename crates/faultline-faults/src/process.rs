//! Process manager: startup delay and scheduled exit
//!
//! The exit is modelled as a one-tick plan whose interval and duration are
//! the same single draw of `after`. The post-sleep hook then asks the
//! [`ExitController`] to end the process with the configured code.

use crate::error::ModuleError;
use faultline_fluent::{DurationSpec, Scalar};
use faultline_planner::{
    CycleHooks, PhaseSpec, PlanAssignments, PlanHandle, PlanSignal, PlanSpec, Plannable,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Identity of the process manager
pub const PROCESS_MANAGER: &str = "process-manager";

/// Scheduled exit declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessExitConfig {
    /// Time until exit
    pub after: DurationSpec,
    /// Exit status
    #[serde(default)]
    pub code: i32,
}

/// Process-level declaration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Sleep before any plan starts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<DurationSpec>,
    /// Scheduled exit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit: Option<ProcessExitConfig>,
}

impl ProcessConfig {
    /// Check the declaration
    ///
    /// # Errors
    /// Returns `ModuleError::InvalidInlinePlan` when the exit plan is invalid.
    pub fn validate(&self) -> Result<(), ModuleError> {
        if let Some(exit) = &self.exit {
            exit_plan(exit.after.draw()).validate()?;
        }
        Ok(())
    }
}

fn exit_plan(after: Duration) -> PlanSpec {
    let after = DurationSpec::exactly(after);
    PlanSpec::single(
        PhaseSpec::default()
            .with_percentage(faultline_fluent::FloatSpec::exactly(100.0))
            .with_interval(after.clone())
            .with_duration(after),
    )
}

/// Ends the process
pub trait ExitController: Send + Sync {
    /// Exit with `code`
    fn exit(&self, code: i32);
}

/// Calls [`std::process::exit`]
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExitController;

impl ExitController for ProcessExitController {
    fn exit(&self, code: i32) {
        std::process::exit(code);
    }
}

/// Runtime process manager
pub struct ProcessManager {
    config: ProcessConfig,
    controller: Arc<dyn ExitController>,
    assignments: PlanAssignments,
}

impl ProcessManager {
    /// Create from a declaration
    ///
    /// # Errors
    /// See [`ProcessConfig::validate`].
    pub fn new(
        config: ProcessConfig,
        controller: Arc<dyn ExitController>,
    ) -> Result<Self, ModuleError> {
        config.validate()?;
        Ok(Self {
            config,
            controller,
            assignments: PlanAssignments::new(),
        })
    }

    /// Startup delay, drawn once per call
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.config
            .delay
            .as_ref()
            .map_or(Duration::ZERO, DurationSpec::draw)
    }

    /// Whether an exit is scheduled and the manager needs a plan
    #[must_use]
    pub fn has_exit(&self) -> bool {
        self.config.exit.is_some()
    }

    /// Plans this manager is attached to
    #[must_use]
    pub fn assignments(&self) -> &PlanAssignments {
        &self.assignments
    }
}

impl fmt::Debug for ProcessManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessManager")
            .field("config", &self.config)
            .field("plans", &self.assignments.len())
            .finish_non_exhaustive()
    }
}

impl Plannable for ProcessManager {
    fn name(&self) -> String {
        PROCESS_MANAGER.to_string()
    }

    fn desired_plan_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn make_inline_plan(&self) -> Option<PlanSpec> {
        self.config
            .exit
            .as_ref()
            .map(|exit| exit_plan(exit.after.draw()))
    }

    fn make_default_plan(&self) -> Option<PlanSpec> {
        None
    }

    fn assign_plan(&self, plan: PlanHandle) {
        self.assignments.push(plan);
    }

    fn cycle_hooks(self: Arc<Self>) -> CycleHooks {
        CycleHooks::new().with_post_sleep(move |cycle| {
            let Some(exit) = &self.config.exit else {
                return PlanSignal::Terminate;
            };

            info!(
                alive = %cycle.elapsed.to_token(),
                exit_code = exit.code,
                "process is exiting due to the configured lifetime"
            );
            self.controller.exit(exit.code);
            PlanSignal::Terminate
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct NeverExit;

    impl ExitController for NeverExit {
        fn exit(&self, _code: i32) {}
    }

    fn manager(yaml: &str) -> ProcessManager {
        let config: ProcessConfig = serde_yaml::from_str(yaml).unwrap();
        ProcessManager::new(config, Arc::new(NeverExit)).unwrap()
    }

    #[test]
    fn exit_plan_is_single_tick() {
        let manager = manager("exit:\n  after: 150ms\n  code: 3\n");
        let plan = manager.make_inline_plan().unwrap();
        let phase = &plan.phase;

        assert_eq!(
            phase.interval.as_ref().map(DurationSpec::draw),
            Some(Duration::from_millis(150))
        );
        assert_eq!(phase.interval, phase.duration);
        assert!(manager.has_inline_plan());
    }

    #[test]
    fn ranged_after_draws_once_for_both_fields() {
        let manager = manager("exit:\n  after: 100ms to 900ms\n");
        let plan = manager.make_inline_plan().unwrap();
        assert_eq!(plan.phase.interval, plan.phase.duration);
        assert!(!plan.phase.interval.unwrap().is_ranged());
    }

    #[test]
    fn no_exit_means_no_plan() {
        let manager = manager("delay: 2s\n");
        assert!(!manager.has_exit());
        assert!(manager.make_inline_plan().is_none());
        assert_eq!(manager.delay(), Duration::from_secs(2));
    }
}
