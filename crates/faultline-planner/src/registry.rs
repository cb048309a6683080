//! Plan registry: named plans, dedicated plans, and the wiring between
//! plans and plannable modules
//!
//! Named plans come from configuration and may be shared by several
//! modules. A module that references no named plan gets a dedicated plan
//! of its own, registered as `<module>-inline-plan` or
//! `<module>-default-plan`. Dedicated plans never enter the name index, so
//! configuration cannot reference them.

use crate::error::WiringError;
use crate::plan::{Plan, PlanHandle, PlanOutcome, PlannerSettings};
use crate::plannable::Plannable;
use crate::spec::PlanSpec;
use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Sorted, de-duplicated list of names occurring more than once
pub fn find_duplicates<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let duplicates: BTreeSet<&str> = names.into_iter().filter(|n| !seen.insert(*n)).collect();
    duplicates.into_iter().map(str::to_string).collect()
}

/// Owner of every plan until they are started
#[derive(Debug)]
pub struct PlanRegistry {
    settings: PlannerSettings,
    rng: StdRng,
    named: IndexMap<String, Plan>,
    unnamed: Vec<Plan>,
    plannables: HashSet<String>,
}

impl PlanRegistry {
    /// Empty registry; a configured seed makes every plan reproducible
    #[must_use]
    pub fn new(settings: PlannerSettings) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            settings,
            rng,
            named: IndexMap::new(),
            unnamed: Vec::new(),
            plannables: HashSet::new(),
        }
    }

    /// Active settings
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &PlannerSettings {
        &self.settings
    }

    fn build(&mut self, name: String, spec: &PlanSpec) -> Result<Plan, WiringError> {
        let rng = StdRng::seed_from_u64(self.rng.gen());
        Plan::new(name.clone(), spec, self.settings.default_interval, rng)
            .map_err(|source| WiringError::invalid_plan(name, source))
    }

    /// Register a plan declaration
    ///
    /// Named plans join the name index; unnamed ones still run but cannot
    /// be referenced.
    ///
    /// # Errors
    /// - `WiringError::DuplicatePlans` when the name is taken
    /// - `WiringError::InvalidPlan` when the declaration fails validation
    pub fn add_plan(&mut self, spec: &PlanSpec) -> Result<PlanHandle, WiringError> {
        match &spec.name {
            Some(name) => {
                if self.named.contains_key(name) {
                    return Err(WiringError::DuplicatePlans(vec![name.clone()]));
                }
                let plan = self.build(name.clone(), spec)?;
                let handle = plan.handle();
                self.named.insert(name.clone(), plan);
                Ok(handle)
            }
            None => {
                let name = format!("plan-{}", self.named.len() + self.unnamed.len());
                let plan = self.build(name, spec)?;
                let handle = plan.handle();
                self.unnamed.push(plan);
                Ok(handle)
            }
        }
    }

    /// Register a batch of declarations, reporting every duplicate name at once
    ///
    /// # Errors
    /// See [`add_plan`](Self::add_plan).
    pub fn add_plans<'a>(
        &mut self,
        specs: impl IntoIterator<Item = &'a PlanSpec>,
    ) -> Result<(), WiringError> {
        let specs: Vec<&PlanSpec> = specs.into_iter().collect();
        let duplicates = find_duplicates(specs.iter().filter_map(|s| s.name.as_deref()));
        if !duplicates.is_empty() {
            return Err(WiringError::DuplicatePlans(duplicates));
        }

        for spec in specs {
            self.add_plan(spec)?;
        }
        Ok(())
    }

    /// Attach a plannable to its plans, creating a dedicated plan if needed
    ///
    /// # Errors
    /// - `WiringError::DuplicatePlannable` when the identity is already attached
    /// - `WiringError::UnknownPlan` for a reference to an undeclared plan
    /// - `WiringError::NoPlanAvailable` when no plan could be derived
    /// - `WiringError::InvalidPlan` when the dedicated plan is invalid
    pub fn attach(&mut self, plannable: Arc<dyn Plannable>) -> Result<Vec<PlanHandle>, WiringError> {
        let name = plannable.name();
        if !self.plannables.insert(name.clone()) {
            return Err(WiringError::DuplicatePlannable(name));
        }

        let desired = plannable.desired_plan_names();
        if desired.is_empty() {
            let (suffix, spec) = if let Some(spec) = plannable.make_inline_plan() {
                ("inline-plan", spec)
            } else if let Some(spec) = plannable.make_default_plan() {
                ("default-plan", spec)
            } else {
                return Err(WiringError::NoPlanAvailable(name));
            };

            let mut plan = self.build(format!("{name}-{suffix}"), &spec)?;
            plan.make_dedicated();
            plan.assign(plannable);
            debug!(plan = %plan.name(), plannable = %name, "attached to dedicated plan");

            let handle = plan.handle();
            self.unnamed.push(plan);
            return Ok(vec![handle]);
        }

        if let Some(missing) = desired.iter().find(|d| !self.named.contains_key(*d)) {
            return Err(WiringError::UnknownPlan {
                plan: missing.clone(),
                plannable: name,
            });
        }

        let mut handles = Vec::with_capacity(desired.len());
        for plan_name in desired {
            if let Some(plan) = self.named.get_mut(&plan_name) {
                plan.assign(Arc::clone(&plannable));
                handles.push(plan.handle());
            }
        }
        debug!(plannable = %name, plans = handles.len(), "attached to shared plans");
        Ok(handles)
    }

    /// Handle of a named plan
    #[must_use]
    pub fn plan(&self, name: &str) -> Option<PlanHandle> {
        self.named.get(name).map(Plan::handle)
    }

    /// Named plans in declaration order
    #[must_use]
    pub fn plan_names(&self) -> Vec<&str> {
        self.named.keys().map(String::as_str).collect()
    }

    /// Every plan, named first
    #[must_use]
    pub fn handles(&self) -> Vec<PlanHandle> {
        self.named
            .values()
            .chain(self.unnamed.iter())
            .map(Plan::handle)
            .collect()
    }

    /// Total number of plans
    #[must_use]
    pub fn len(&self) -> usize {
        self.named.len() + self.unnamed.len()
    }

    /// No plan registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start every plan on its own task
    pub fn start_all(self) -> Vec<JoinHandle<PlanOutcome>> {
        info!(plans = self.len(), "starting plans");
        self.named
            .into_values()
            .chain(self.unnamed)
            .map(Plan::start)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn finds_each_duplicate_once() {
        assert_eq!(
            find_duplicates(["b", "a", "b", "c", "a", "b"]),
            vec!["a".to_string(), "b".to_string()]
        );
        assert!(find_duplicates(["x", "y"]).is_empty());
    }

    #[test]
    fn add_plans_reports_all_duplicates() {
        let specs = [
            PlanSpec::default().named("a"),
            PlanSpec::default().named("b"),
            PlanSpec::default().named("a"),
            PlanSpec::default().named("b"),
        ];
        let mut registry = PlanRegistry::new(PlannerSettings::default());
        let err = registry.add_plans(&specs).unwrap_err();
        assert_eq!(err.to_string(), "there are duplicate plans: a, b");
        assert!(registry.is_empty());
    }

    #[test]
    fn invalid_plan_error_names_plan() {
        let spec: PlanSpec =
            serde_yaml::from_str("name: broken\nsize: 1Mi\nsubPlans:\n  - size: 2Mi\n").unwrap();
        let mut registry = PlanRegistry::new(PlannerSettings::default());
        let err = registry.add_plan(&spec).unwrap_err();
        assert!(err.to_string().starts_with("plan broken is invalid"));
    }

    #[test]
    fn unnamed_plans_are_not_indexed() {
        let mut registry = PlanRegistry::new(PlannerSettings::default());
        registry.add_plan(&PlanSpec::default().named("shared")).unwrap();
        let handle = registry.add_plan(&PlanSpec::default()).unwrap();

        assert_eq!(registry.plan_names(), vec!["shared"]);
        assert_eq!(registry.len(), 2);
        assert!(registry.plan(handle.name()).is_none());
    }
}
