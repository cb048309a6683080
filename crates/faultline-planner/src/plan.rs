//! Plan execution
//!
//! A [`Plan`] owns its phases, its subscribers' hooks and its own random
//! generator. Once started it runs on a dedicated tokio task and nothing
//! else touches it; observers read its live state through a cloned
//! [`PlanHandle`].
//!
//! Each tick:
//! 1. takes one unit of the phase's cycle budget (moves on when exhausted)
//! 2. publishes the next `(percentage, size)` pair with a fresh outcome draw
//! 3. runs every subscriber's pre-sleep hook
//! 4. sleeps the phase interval
//! 5. runs every subscriber's post-sleep hook
//!
//! A hook returning [`PlanSignal::Terminate`] ends the whole plan at once.
//! A zero interval pauses the plan after the first tick.

use crate::error::PlanError;
use crate::plannable::Plannable;
use crate::spec::PlanSpec;
use crate::sub_plan::SubPlan;
use crate::value::{Cycle, CycleHooks, CycleValue, HookFn, PlanSignal};
use parking_lot::RwLock;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, Instrument};
use uuid::Uuid;

/// Planner-wide defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlannerSettings {
    /// Interval used by phases that do not declare one
    #[serde(with = "fluent_duration")]
    pub default_interval: Duration,
    /// Master seed; every plan derives its own generator from it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            default_interval: Duration::from_secs(1),
            seed: None,
        }
    }
}

/// `Duration` as fluent text inside settings documents
mod fluent_duration {
    use faultline_fluent::Scalar;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.to_token())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(d)?;
        Duration::parse_token(&text).map_err(serde::de::Error::custom)
    }
}

/// Unique identifier for a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanId(pub Uuid);

impl PlanId {
    /// Create new random plan ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlanId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "plan:{}", self.0)
    }
}

/// Lifecycle of a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanState {
    /// Declared, phases not resolved yet
    Unprepared,
    /// Phases resolved
    Prepared,
    /// Ticking
    Running,
    /// Finished for any reason
    Terminated,
}

/// Why a plan stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOutcome {
    /// Every phase used up its budget
    Exhausted,
    /// A subscriber's hook returned [`PlanSignal::Terminate`]
    Terminated {
        /// Name of the subscriber that asked to stop
        by: String,
        /// Phase running at the time
        phase: usize,
        /// Tick running at the time
        tick: u64,
    },
    /// A zero interval stopped the plan after its first tick
    Paused,
    /// Phase resolution failed; no tick ran
    Aborted(PlanError),
}

#[derive(Debug)]
struct PlanShared {
    id: PlanId,
    name: String,
    dedicated: RwLock<bool>,
    state: RwLock<PlanState>,
    current: RwLock<Option<CycleValue>>,
}

/// Read-only view of a plan, safe to clone into other tasks
#[derive(Debug, Clone)]
pub struct PlanHandle {
    shared: Arc<PlanShared>,
}

impl PlanHandle {
    /// Plan identifier
    #[inline]
    #[must_use]
    pub fn id(&self) -> PlanId {
        self.shared.id
    }

    /// Plan name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Created for a single plannable
    #[must_use]
    pub fn is_dedicated(&self) -> bool {
        *self.shared.dedicated.read()
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> PlanState {
        *self.shared.state.read()
    }

    /// Value of the latest tick, `None` before the first one
    #[must_use]
    pub fn current_value(&self) -> Option<CycleValue> {
        *self.shared.current.read()
    }

    /// Outcome of the latest tick, `false` before the first one
    #[must_use]
    pub fn current_outcome(&self) -> bool {
        self.current_value().is_some_and(|value| value.outcome)
    }
}

struct Subscriber {
    name: String,
    hooks: CycleHooks,
}

#[derive(Clone, Copy)]
enum HookStage {
    PreSleep,
    PostSleep,
}

/// A schedule of phases plus the plannables it drives
pub struct Plan {
    shared: Arc<PlanShared>,
    phases: Vec<SubPlan>,
    subscribers: Vec<Subscriber>,
    default_interval: Duration,
    rng: StdRng,
}

impl Plan {
    /// Build a plan after validating its declaration
    ///
    /// # Errors
    /// Returns the first [`PlanError`] found by [`PlanSpec::validate`].
    pub fn new(
        name: impl Into<String>,
        spec: &PlanSpec,
        default_interval: Duration,
        rng: StdRng,
    ) -> Result<Self, PlanError> {
        spec.validate()?;

        let phases = spec
            .phases()
            .into_iter()
            .enumerate()
            .map(|(index, phase)| SubPlan::new(index, phase))
            .collect();

        Ok(Self {
            shared: Arc::new(PlanShared {
                id: PlanId::new(),
                name: name.into(),
                dedicated: RwLock::new(false),
                state: RwLock::new(PlanState::Unprepared),
                current: RwLock::new(None),
            }),
            phases,
            subscribers: Vec::new(),
            default_interval,
            rng,
        })
    }

    /// Mark the plan as owned by a single plannable
    pub fn make_dedicated(&mut self) {
        *self.shared.dedicated.write() = true;
    }

    /// Observer handle
    #[must_use]
    pub fn handle(&self) -> PlanHandle {
        PlanHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Plan name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> PlanState {
        *self.shared.state.read()
    }

    /// Phases in execution order
    #[inline]
    #[must_use]
    pub fn sub_plans(&self) -> &[SubPlan] {
        &self.phases
    }

    /// Names of attached plannables, in attachment order
    #[must_use]
    pub fn subscriber_names(&self) -> Vec<&str> {
        self.subscribers.iter().map(|s| s.name.as_str()).collect()
    }

    /// Subscribe a plannable and hand it a handle to this plan
    pub fn assign(&mut self, plannable: Arc<dyn Plannable>) {
        let name = plannable.name();
        debug!(plan = %self.shared.name, plannable = %name, "assigning plan");

        plannable.assign_plan(self.handle());
        let hooks = Arc::clone(&plannable).cycle_hooks();
        self.subscribers.push(Subscriber { name, hooks });
    }

    /// Resolve every phase; idempotent
    ///
    /// # Errors
    /// Returns the first phase that fails to resolve.
    pub fn prepare(&mut self) -> Result<(), PlanError> {
        if self.state() != PlanState::Unprepared {
            return Ok(());
        }

        for phase in &mut self.phases {
            phase.prepare(self.default_interval, &mut self.rng)?;
        }
        self.set_state(PlanState::Prepared);
        Ok(())
    }

    /// Run on a new tokio task
    pub fn start(self) -> JoinHandle<PlanOutcome> {
        tokio::spawn(self.run())
    }

    /// Run to completion on the current task
    pub async fn run(mut self) -> PlanOutcome {
        let span = tracing::info_span!(
            "plan",
            name = %self.shared.name,
            dedicated = *self.shared.dedicated.read()
        );
        self.drive().instrument(span).await
    }

    async fn drive(&mut self) -> PlanOutcome {
        if let Err(e) = self.prepare() {
            error!(error = %e, "aborting plan");
            return self.finish(PlanOutcome::Aborted(e));
        }

        self.set_state(PlanState::Running);
        info!(
            phases = self.phases.len(),
            subscribers = self.subscribers.len(),
            "executing plan"
        );

        let mut tick: u64 = 0;
        for index in 0..self.phases.len() {
            let Some(resolution) = self.phases[index].resolution().cloned() else {
                continue;
            };
            debug!(
                phase = index,
                interval = ?resolution.interval(),
                cycles = ?resolution.budget().total(),
                "entering phase"
            );

            let mut step = 0usize;
            while self.phases[index].consume_cycle() {
                let (percentage, size) = resolution.value_at(step);
                step += 1;

                let value = CycleValue::draw(percentage, size, &mut self.rng);
                *self.shared.current.write() = Some(value);
                let started_at = Instant::now();

                debug!(
                    phase = index,
                    tick,
                    percentage,
                    size = %size,
                    outcome = value.outcome,
                    "executing pre-sleep hooks"
                );
                if let Some(by) = self.run_hooks(HookStage::PreSleep, index, tick, value, started_at)
                {
                    return self.finish(PlanOutcome::Terminated { by, phase: index, tick });
                }

                tokio::time::sleep(resolution.interval()).await;

                debug!(phase = index, tick, "executing post-sleep hooks");
                if let Some(by) = self.run_hooks(HookStage::PostSleep, index, tick, value, started_at)
                {
                    return self.finish(PlanOutcome::Terminated { by, phase: index, tick });
                }

                tick += 1;
                if resolution.interval().is_zero() {
                    info!("pausing plan due to zero interval");
                    return self.finish(PlanOutcome::Paused);
                }
            }
        }

        self.finish(PlanOutcome::Exhausted)
    }

    /// Run one hook stage; returns the subscriber that asked to terminate
    fn run_hooks(
        &mut self,
        stage: HookStage,
        phase: usize,
        tick: u64,
        value: CycleValue,
        started_at: Instant,
    ) -> Option<String> {
        for subscriber in &mut self.subscribers {
            let slot: &mut Option<HookFn> = match stage {
                HookStage::PreSleep => &mut subscriber.hooks.pre_sleep,
                HookStage::PostSleep => &mut subscriber.hooks.post_sleep,
            };
            let Some(hook) = slot.as_mut() else {
                continue;
            };

            let cycle = Cycle {
                phase,
                tick,
                value,
                started_at,
                elapsed: started_at.elapsed(),
            };
            if hook(&cycle) == PlanSignal::Terminate {
                info!(plannable = %subscriber.name, "plan terminated by hook");
                return Some(subscriber.name.clone());
            }
        }
        None
    }

    fn finish(&self, outcome: PlanOutcome) -> PlanOutcome {
        self.set_state(PlanState::Terminated);
        info!(outcome = ?outcome, "plan finished");
        outcome
    }

    fn set_state(&self, state: PlanState) {
        *self.shared.state.write() = state;
    }
}

impl fmt::Debug for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plan")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .field("phases", &self.phases.len())
            .field("subscribers", &self.subscriber_names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::PhaseSpec;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;

    struct Probe {
        name: String,
        seen: Arc<Mutex<Vec<(u64, f64)>>>,
        stop_at: Option<u64>,
        handle: Mutex<Option<PlanHandle>>,
    }

    impl Probe {
        fn new(name: &str, stop_at: Option<u64>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                seen: Arc::default(),
                stop_at,
                handle: Mutex::new(None),
            })
        }
    }

    impl Plannable for Probe {
        fn name(&self) -> String {
            self.name.clone()
        }

        fn desired_plan_names(&self) -> Vec<String> {
            Vec::new()
        }

        fn make_inline_plan(&self) -> Option<PlanSpec> {
            None
        }

        fn make_default_plan(&self) -> Option<PlanSpec> {
            None
        }

        fn assign_plan(&self, plan: PlanHandle) {
            *self.handle.lock() = Some(plan);
        }

        fn cycle_hooks(self: Arc<Self>) -> CycleHooks {
            let seen = Arc::clone(&self.seen);
            let stop_at = self.stop_at;
            CycleHooks::new().with_post_sleep(move |cycle| {
                seen.lock().push((cycle.tick, cycle.value.percentage));
                if stop_at == Some(cycle.tick) {
                    PlanSignal::Terminate
                } else {
                    PlanSignal::Continue
                }
            })
        }
    }

    fn plan(spec: &PlanSpec) -> Plan {
        Plan::new("test", spec, Duration::from_millis(5), StdRng::seed_from_u64(7)).unwrap()
    }

    #[test]
    fn new_rejects_invalid_declaration() {
        let spec: PlanSpec =
            serde_yaml::from_str("percentage: 5\nsubPlans:\n  - percentage: 10\n").unwrap();
        let err = Plan::new("bad", &spec, Duration::from_secs(1), StdRng::seed_from_u64(1));
        assert!(matches!(err, Err(PlanError::MixedDeclaration)));
    }

    #[test]
    fn prepare_is_idempotent() {
        let spec = PlanSpec::single(PhaseSpec::default().with_percentage("0 to 100".parse().unwrap()));
        let mut plan = plan(&spec);
        assert_eq!(plan.state(), PlanState::Unprepared);

        plan.prepare().unwrap();
        let first = plan.sub_plans()[0].resolution().cloned();
        plan.prepare().unwrap();

        assert_eq!(plan.state(), PlanState::Prepared);
        assert_eq!(plan.sub_plans()[0].resolution().cloned(), first);
    }

    #[test]
    fn assign_hands_out_handle() {
        let mut plan = plan(&PlanSpec::default());
        let probe = Probe::new("probe", None);
        plan.assign(probe.clone());

        assert_eq!(plan.subscriber_names(), vec!["probe"]);
        let handle = probe.handle.lock().clone().unwrap();
        assert_eq!(handle.name(), "test");
        assert_eq!(handle.id(), plan.handle().id());
    }

    #[tokio::test(start_paused = true)]
    async fn runs_exact_cycle_count_and_publishes_values() {
        let spec = PlanSpec::single(
            PhaseSpec::default()
                .with_percentage("100".parse().unwrap())
                .with_interval("10ms".parse().unwrap())
                .with_duration("40ms".parse().unwrap()),
        );
        let mut plan = plan(&spec);
        let probe = Probe::new("probe", None);
        plan.assign(probe.clone());
        let handle = plan.handle();

        assert_eq!(plan.start().await.unwrap(), PlanOutcome::Exhausted);
        assert_eq!(probe.seen.lock().len(), 4);
        assert_eq!(handle.state(), PlanState::Terminated);
        assert!(handle.current_outcome());
    }

    #[tokio::test(start_paused = true)]
    async fn terminate_stops_all_phases() {
        let spec = PlanSpec::phased(vec![
            PhaseSpec::default()
                .with_interval("10ms".parse().unwrap())
                .with_duration("100ms".parse().unwrap()),
            PhaseSpec::default().with_interval("10ms".parse().unwrap()),
        ]);
        let mut plan = plan(&spec);
        let probe = Probe::new("probe", Some(2));
        plan.assign(probe.clone());

        let outcome = plan.run().await;
        assert_eq!(
            outcome,
            PlanOutcome::Terminated {
                by: "probe".to_string(),
                phase: 0,
                tick: 2
            }
        );
        assert_eq!(probe.seen.lock().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_pauses_after_one_tick() {
        let spec = PlanSpec::single(PhaseSpec::default().with_interval("0".parse().unwrap()));
        let mut plan = plan(&spec);
        let probe = Probe::new("probe", None);
        plan.assign(probe.clone());

        assert_eq!(plan.run().await, PlanOutcome::Paused);
        assert_eq!(probe.seen.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn runs_without_subscribers() {
        let spec = PlanSpec::single(
            PhaseSpec::default()
                .with_interval("1ms".parse().unwrap())
                .with_duration("3ms".parse().unwrap()),
        );
        let plan = plan(&spec);
        let handle = plan.handle();

        assert_eq!(plan.run().await, PlanOutcome::Exhausted);
        assert_eq!(handle.current_value().map(|v| v.percentage), Some(0.0));
    }
}
