//! The capability every fault module implements to be driven by plans

use crate::plan::PlanHandle;
use crate::spec::PlanSpec;
use crate::value::CycleHooks;
use parking_lot::RwLock;
use std::sync::Arc;

/// A fault module that can be attached to one or more plans
///
/// Wiring rules applied by the registry:
/// - a non-empty [`desired_plan_names`](Self::desired_plan_names) attaches the
///   module to each of those shared plans
/// - otherwise the module gets a dedicated plan built from
///   [`make_inline_plan`](Self::make_inline_plan), falling back to
///   [`make_default_plan`](Self::make_default_plan)
pub trait Plannable: Send + Sync {
    /// Unique identity within one registry
    fn name(&self) -> String;

    /// Named plans this module wants to follow
    fn desired_plan_names(&self) -> Vec<String>;

    /// Whether an inline plan was declared
    fn has_inline_plan(&self) -> bool {
        self.make_inline_plan().is_some()
    }

    /// Plan declared directly on the module
    fn make_inline_plan(&self) -> Option<PlanSpec>;

    /// Plan used when nothing else was declared
    fn make_default_plan(&self) -> Option<PlanSpec>;

    /// Receive a handle to a plan this module is now attached to
    fn assign_plan(&self, plan: PlanHandle);

    /// Hooks invoked by every plan this module is attached to
    fn cycle_hooks(self: Arc<Self>) -> CycleHooks;
}

/// Plans assigned to one module, readable from any task
#[derive(Debug, Default)]
pub struct PlanAssignments {
    plans: RwLock<Vec<PlanHandle>>,
}

impl PlanAssignments {
    /// Empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an assignment
    pub fn push(&self, plan: PlanHandle) {
        self.plans.write().push(plan);
    }

    /// All assigned plans in assignment order
    #[must_use]
    pub fn handles(&self) -> Vec<PlanHandle> {
        self.plans.read().clone()
    }

    /// First assigned plan
    #[must_use]
    pub fn first(&self) -> Option<PlanHandle> {
        self.plans.read().first().cloned()
    }

    /// Number of assigned plans
    #[must_use]
    pub fn len(&self) -> usize {
        self.plans.read().len()
    }

    /// No plan assigned yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plans.read().is_empty()
    }

    /// Whether every assigned plan's latest tick fired; `false` when unassigned
    #[must_use]
    pub fn all_outcomes(&self) -> bool {
        let plans = self.plans.read();
        !plans.is_empty() && plans.iter().all(PlanHandle::current_outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Plan;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::time::Duration;

    fn handle(name: &str) -> PlanHandle {
        Plan::new(name, &PlanSpec::default(), Duration::from_secs(1), StdRng::seed_from_u64(0))
            .unwrap()
            .handle()
    }

    #[test]
    fn keeps_assignment_order() {
        let assignments = PlanAssignments::new();
        assert!(assignments.is_empty());
        assert!(assignments.first().is_none());

        assignments.push(handle("a"));
        assignments.push(handle("b"));

        let names: Vec<_> = assignments
            .handles()
            .iter()
            .map(|h| h.name().to_string())
            .collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(assignments.first().unwrap().name(), "a");
        assert_eq!(assignments.len(), 2);
    }

    #[test]
    fn idle_plans_never_fire() {
        let assignments = PlanAssignments::new();
        assert!(!assignments.all_outcomes());
        assignments.push(handle("idle"));
        assert!(!assignments.all_outcomes());
    }
}
