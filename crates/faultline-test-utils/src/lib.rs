//! Testing utilities for Faultline workspace
//!
//! Recording plannables, a non-exiting exit controller, and plan fixtures.

#![allow(missing_docs)]

use faultline_faults::ExitController;
use faultline_fluent::ByteSize;
use faultline_planner::{
    Cycle, CycleHooks, CycleValue, PhaseSpec, PlanAssignments, PlanHandle, PlanSignal, PlanSpec,
    Plannable,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    PreSleep,
    PostSleep,
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub stage: Stage,
    pub phase: usize,
    pub tick: u64,
    pub value: CycleValue,
    pub elapsed: Duration,
}

/// Plannable that records every hook invocation
#[derive(Debug)]
pub struct PlanRecorder {
    name: String,
    plan_refs: Vec<String>,
    inline: Option<PlanSpec>,
    fallback: Option<PlanSpec>,
    cap: Option<usize>,
    terminate_pre_at: Option<u64>,
    terminate_post_at: Option<u64>,
    records: Mutex<Vec<Recorded>>,
    assignments: PlanAssignments,
}

impl PlanRecorder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            plan_refs: Vec::new(),
            inline: None,
            fallback: None,
            cap: None,
            terminate_pre_at: None,
            terminate_post_at: None,
            records: Mutex::new(Vec::new()),
            assignments: PlanAssignments::new(),
        }
    }

    pub fn following<'a>(mut self, plans: impl IntoIterator<Item = &'a str>) -> Self {
        self.plan_refs = plans.into_iter().map(str::to_string).collect();
        self
    }

    pub fn with_inline(mut self, spec: PlanSpec) -> Self {
        self.inline = Some(spec);
        self
    }

    pub fn with_default(mut self, spec: PlanSpec) -> Self {
        self.fallback = Some(spec);
        self
    }

    /// Terminate the plan after this many post-sleep hooks
    pub fn capped(mut self, ticks: usize) -> Self {
        self.cap = Some(ticks);
        self
    }

    pub fn terminate_pre_at(mut self, tick: u64) -> Self {
        self.terminate_pre_at = Some(tick);
        self
    }

    pub fn terminate_post_at(mut self, tick: u64) -> Self {
        self.terminate_post_at = Some(tick);
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn records(&self) -> Vec<Recorded> {
        self.records.lock().clone()
    }

    pub fn stage_count(&self, stage: Stage) -> usize {
        self.records.lock().iter().filter(|r| r.stage == stage).count()
    }

    /// Values seen by post-sleep hooks, one per completed tick
    pub fn values(&self) -> Vec<CycleValue> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.stage == Stage::PostSleep)
            .map(|r| r.value)
            .collect()
    }

    pub fn percentages(&self) -> Vec<f64> {
        self.values().iter().map(|v| v.percentage).collect()
    }

    /// Sum of tick durations measured by post-sleep hooks
    pub fn total_elapsed(&self) -> Duration {
        self.records
            .lock()
            .iter()
            .filter(|r| r.stage == Stage::PostSleep)
            .map(|r| r.elapsed)
            .sum()
    }

    pub fn assignments(&self) -> &PlanAssignments {
        &self.assignments
    }

    fn record(&self, stage: Stage, cycle: &Cycle) -> PlanSignal {
        let mut records = self.records.lock();
        records.push(Recorded {
            stage,
            phase: cycle.phase,
            tick: cycle.tick,
            value: cycle.value,
            elapsed: cycle.elapsed,
        });

        let terminate_at = match stage {
            Stage::PreSleep => self.terminate_pre_at,
            Stage::PostSleep => self.terminate_post_at,
        };
        if terminate_at == Some(cycle.tick) {
            return PlanSignal::Terminate;
        }

        let completed = records.iter().filter(|r| r.stage == Stage::PostSleep).count();
        if stage == Stage::PostSleep && self.cap.is_some_and(|cap| completed >= cap) {
            return PlanSignal::Terminate;
        }
        PlanSignal::Continue
    }
}

impl Plannable for PlanRecorder {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn desired_plan_names(&self) -> Vec<String> {
        self.plan_refs.clone()
    }

    fn make_inline_plan(&self) -> Option<PlanSpec> {
        self.inline.clone()
    }

    fn make_default_plan(&self) -> Option<PlanSpec> {
        self.fallback.clone()
    }

    fn assign_plan(&self, plan: PlanHandle) {
        self.assignments.push(plan);
    }

    fn cycle_hooks(self: Arc<Self>) -> CycleHooks {
        let pre = Arc::clone(&self);
        CycleHooks::new()
            .with_pre_sleep(move |cycle| pre.record(Stage::PreSleep, cycle))
            .with_post_sleep(move |cycle| self.record(Stage::PostSleep, cycle))
    }
}

/// Exit controller that records requested codes instead of exiting
#[derive(Debug, Default)]
pub struct RecordingExitController {
    codes: Mutex<Vec<i32>>,
}

impl RecordingExitController {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn codes(&self) -> Vec<i32> {
        self.codes.lock().clone()
    }
}

impl ExitController for RecordingExitController {
    fn exit(&self, code: i32) {
        self.codes.lock().push(code);
    }
}

/// Single-phase plan from fluent strings
pub fn phase(
    percentage: Option<&str>,
    size: Option<&str>,
    interval: Option<&str>,
    duration: Option<&str>,
) -> PhaseSpec {
    PhaseSpec {
        percentage: percentage.map(|s| s.parse().unwrap()),
        size: size.map(|s| s.parse().unwrap()),
        interval: interval.map(|s| s.parse().unwrap()),
        duration: duration.map(|s| s.parse().unwrap()),
    }
}

pub fn percentage_plan(percentage: &str, interval: &str, duration: Option<&str>) -> PlanSpec {
    PlanSpec::single(phase(Some(percentage), None, Some(interval), duration))
}

pub fn size_plan(size: &str, interval: &str, duration: Option<&str>) -> PlanSpec {
    PlanSpec::single(phase(None, Some(size), Some(interval), duration))
}

pub fn mib(n: u64) -> ByteSize {
    ByteSize::mib(n)
}

/// A localhost port that was free a moment ago
pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .map(|addr| addr.port())
        .unwrap()
}
