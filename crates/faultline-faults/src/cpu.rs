//! CPU loader
//!
//! Each tick's pre-sleep hook starts one busy-loop worker per core running
//! a 100ms duty cycle: spin for `percentage`% of the period, sleep for the
//! rest. The post-sleep hook signals the workers to stop. Both are
//! idempotent, so a tick cut short by another module's termination is safe.

use crate::error::ModuleError;
use crate::plan_source::{inline_plan, require_single_source};
use faultline_fluent::{DurationSpec, FloatSpec};
use faultline_planner::{
    CycleHooks, PlanAssignments, PlanHandle, PlanSignal, PlanSpec, Plannable,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Identity of the CPU loader
pub const CPU_MANAGER: &str = "cpu-manager";

const DUTY_PERIOD: Duration = Duration::from_millis(100);

/// CPU load declaration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuLoadConfig {
    /// A single named plan to follow
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plan_refs: Vec<String>,
    /// Load percentage, `0` idle to `100` every core saturated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<FloatSpec>,
    /// Tick interval
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<DurationSpec>,
    /// Total duration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<DurationSpec>,
}

impl CpuLoadConfig {
    fn inline_plan(&self) -> Option<PlanSpec> {
        inline_plan(
            self.percentage.as_ref(),
            None,
            self.interval.as_ref(),
            self.duration.as_ref(),
        )
    }

    /// Check the declaration
    ///
    /// # Errors
    /// - `ModuleError::MissingPlan` with neither percentage nor plan ref
    /// - `ModuleError::TooManyPlanRefs` for more than one plan ref
    /// - `ModuleError::InvalidInlinePlan` when the inline fields are invalid
    pub fn validate(&self) -> Result<(), ModuleError> {
        require_single_source(&self.plan_refs, self.inline_plan().as_ref(), "load")
    }
}

/// Split the duty period into busy and idle time
fn duty_cycle(percentage: f64) -> (Duration, Duration) {
    let busy = DUTY_PERIOD.mul_f64(percentage.clamp(0.0, 100.0) / 100.0);
    (busy, DUTY_PERIOD.saturating_sub(busy))
}

fn burn(stop: &AtomicBool, busy: Duration, idle: Duration) {
    while !stop.load(Ordering::Relaxed) {
        let begin = Instant::now();
        while begin.elapsed() < busy {
            std::hint::spin_loop();
        }
        std::thread::sleep(idle);
    }
}

/// Runtime CPU loader
#[derive(Debug)]
pub struct CpuLoader {
    config: CpuLoadConfig,
    cores: usize,
    active: Mutex<Option<Arc<AtomicBool>>>,
    assignments: PlanAssignments,
}

impl CpuLoader {
    /// Create from a declaration, loading every core
    ///
    /// # Errors
    /// See [`CpuLoadConfig::validate`].
    pub fn new(config: CpuLoadConfig) -> Result<Self, ModuleError> {
        config.validate()?;
        Ok(Self {
            config,
            cores: num_cpus::get(),
            active: Mutex::new(None),
            assignments: PlanAssignments::new(),
        })
    }

    /// Limit the number of workers
    #[must_use]
    pub fn with_cores(mut self, cores: usize) -> Self {
        self.cores = cores.max(1);
        self
    }

    /// Workers started per tick
    #[inline]
    #[must_use]
    pub fn cores(&self) -> usize {
        self.cores
    }

    /// Whether workers are currently running
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Plans this loader is attached to
    #[must_use]
    pub fn assignments(&self) -> &PlanAssignments {
        &self.assignments
    }

    /// Start the workers; no-op while already running
    pub fn start(&self, percentage: f64) {
        let mut active = self.active.lock();
        if active.is_some() {
            return;
        }

        let stop = Arc::new(AtomicBool::new(false));
        let (busy, idle) = duty_cycle(percentage);
        debug!(percentage, cores = self.cores, ?busy, "starting cpu load");

        if !busy.is_zero() {
            for core in 0..self.cores {
                let stop = Arc::clone(&stop);
                let spawned = std::thread::Builder::new()
                    .name(format!("cpu-load-{core}"))
                    .spawn(move || burn(&stop, busy, idle));
                if let Err(e) = spawned {
                    warn!(core, error = %e, "failed to spawn cpu load worker");
                }
            }
        }
        *active = Some(stop);
    }

    /// Signal the workers to stop; no-op when idle
    pub fn stop(&self) {
        if let Some(stop) = self.active.lock().take() {
            stop.store(true, Ordering::Relaxed);
            debug!("stopped cpu load");
        }
    }
}

impl Drop for CpuLoader {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Plannable for CpuLoader {
    fn name(&self) -> String {
        CPU_MANAGER.to_string()
    }

    fn desired_plan_names(&self) -> Vec<String> {
        self.config.plan_refs.clone()
    }

    fn make_inline_plan(&self) -> Option<PlanSpec> {
        self.config.inline_plan()
    }

    fn make_default_plan(&self) -> Option<PlanSpec> {
        None
    }

    fn assign_plan(&self, plan: PlanHandle) {
        self.assignments.push(plan);
    }

    fn cycle_hooks(self: Arc<Self>) -> CycleHooks {
        let loader = Arc::clone(&self);
        CycleHooks::new()
            .with_pre_sleep(move |cycle| {
                loader.start(cycle.value.percentage);
                PlanSignal::Continue
            })
            .with_post_sleep(move |_| {
                self.stop();
                PlanSignal::Continue
            })
    }
}
