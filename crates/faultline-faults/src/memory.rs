//! Memory leaker
//!
//! Pre-sleep allocates and touches the tick's size; post-sleep frees it.

use crate::error::ModuleError;
use crate::plan_source::{inline_plan, require_single_source};
use faultline_fluent::{ByteSize, DurationSpec, SizeSpec};
use faultline_planner::{
    CycleHooks, PlanAssignments, PlanHandle, PlanSignal, PlanSpec, Plannable,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Identity of the memory leaker
pub const MEMORY_LEAKER: &str = "memory-leaker";

const FILL_BYTE: u8 = 0xA5;

/// Memory leak declaration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryLeakConfig {
    /// A single named plan to follow
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plan_refs: Vec<String>,
    /// Bytes held during each tick
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<SizeSpec>,
    /// Tick interval
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<DurationSpec>,
    /// Total duration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<DurationSpec>,
}

impl MemoryLeakConfig {
    fn inline_plan(&self) -> Option<PlanSpec> {
        inline_plan(
            None,
            self.size.as_ref(),
            self.interval.as_ref(),
            self.duration.as_ref(),
        )
    }

    /// Check the declaration
    ///
    /// # Errors
    /// Same rules as the CPU loader, with `size` as the inline field.
    pub fn validate(&self) -> Result<(), ModuleError> {
        require_single_source(&self.plan_refs, self.inline_plan().as_ref(), "leak")
    }
}

/// Runtime memory leaker
#[derive(Debug)]
pub struct MemoryLeaker {
    config: MemoryLeakConfig,
    leaked: Mutex<Vec<u8>>,
    assignments: PlanAssignments,
}

impl MemoryLeaker {
    /// Create from a declaration
    ///
    /// # Errors
    /// See [`MemoryLeakConfig::validate`].
    pub fn new(config: MemoryLeakConfig) -> Result<Self, ModuleError> {
        config.validate()?;
        Ok(Self {
            config,
            leaked: Mutex::new(Vec::new()),
            assignments: PlanAssignments::new(),
        })
    }

    /// Bytes currently held
    #[must_use]
    pub fn leaked_bytes(&self) -> usize {
        self.leaked.lock().len()
    }

    /// Plans this leaker is attached to
    #[must_use]
    pub fn assignments(&self) -> &PlanAssignments {
        &self.assignments
    }

    /// Allocate and touch `size` bytes; no-op while already holding memory
    pub fn start_leaking(&self, size: ByteSize) {
        let mut leaked = self.leaked.lock();
        if !leaked.is_empty() {
            return;
        }

        let Ok(len) = usize::try_from(size.bytes()) else {
            warn!(%size, "leak size does not fit in memory");
            return;
        };

        let mut buffer = Vec::new();
        if let Err(e) = buffer.try_reserve_exact(len) {
            warn!(%size, error = %e, "failed to allocate leak");
            return;
        }
        buffer.resize(len, FILL_BYTE);
        debug!(%size, "leaking memory");
        *leaked = buffer;
    }

    /// Release held memory
    pub fn stop_leaking(&self) {
        let released = std::mem::take(&mut *self.leaked.lock());
        if !released.is_empty() {
            debug!(bytes = released.len(), "released leaked memory");
        }
    }
}

impl Plannable for MemoryLeaker {
    fn name(&self) -> String {
        MEMORY_LEAKER.to_string()
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
        let leaker = Arc::clone(&self);
        CycleHooks::new()
            .with_pre_sleep(move |cycle| {
                leaker.start_leaking(cycle.value.size);
                PlanSignal::Continue
            })
            .with_post_sleep(move |_| {
                self.stop_leaking();
                PlanSignal::Continue
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaker(yaml: &str) -> MemoryLeaker {
        MemoryLeaker::new(serde_yaml::from_str(yaml).unwrap()).unwrap()
    }

    #[test]
    fn leak_cycle_allocates_then_frees() {
        let leaker = leaker("size: 2Mi\ninterval: 10ms\n");
        leaker.start_leaking(ByteSize::mib(2));
        assert_eq!(leaker.leaked_bytes(), 2 * 1024 * 1024);

        leaker.start_leaking(ByteSize::mib(8));
        assert_eq!(leaker.leaked_bytes(), 2 * 1024 * 1024);

        leaker.stop_leaking();
        leaker.stop_leaking();
        assert_eq!(leaker.leaked_bytes(), 0);
    }

    #[test]
    fn size_is_the_inline_field() {
        let err = MemoryLeaker::new(serde_yaml::from_str("interval: 1s\n").unwrap()).unwrap_err();
        assert_eq!(err.to_string(), "no leak specification or plan refs is set");

        let plan = leaker("size: 1Ki, 2Ki\n").make_inline_plan().unwrap();
        assert_eq!(plan.phase.size.unwrap().snapshot_len(), 2);
        assert!(plan.phase.percentage.is_none());
    }
}
