//! Per-tick values and the hook contract exposed to fault modules

use faultline_fluent::ByteSize;
use rand::Rng;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// The signal a plan publishes on one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleValue {
    /// Percentage in `0..=100`
    pub percentage: f64,
    /// Size in bytes
    pub size: ByteSize,
    /// Fresh Bernoulli draw: `true` with probability `percentage / 100`
    pub outcome: bool,
}

impl CycleValue {
    /// Build a value, drawing its outcome from `rng`
    pub fn draw<R: Rng + ?Sized>(percentage: f64, size: ByteSize, rng: &mut R) -> Self {
        let outcome = rng.gen::<f64>() < percentage / 100.0;
        Self {
            percentage,
            size,
            outcome,
        }
    }
}

/// Snapshot handed to hooks
#[derive(Debug, Clone)]
pub struct Cycle {
    /// Index of the running phase
    pub phase: usize,
    /// Zero-based tick counter across the whole plan
    pub tick: u64,
    /// Value published for this tick
    pub value: CycleValue,
    /// When the tick began
    pub started_at: Instant,
    /// Time since `started_at` when the hook was invoked
    pub elapsed: Duration,
}

/// Hook verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlanSignal {
    /// Keep going
    #[default]
    Continue,
    /// Stop the whole plan immediately
    Terminate,
}

/// A lifecycle hook; runs inline on the plan's task
pub type HookFn = Box<dyn FnMut(&Cycle) -> PlanSignal + Send>;

/// PreSleep / PostSleep hooks of one plannable
#[derive(Default)]
pub struct CycleHooks {
    /// Invoked after the value is published, before the interval sleep
    pub pre_sleep: Option<HookFn>,
    /// Invoked after the interval sleep
    pub post_sleep: Option<HookFn>,
}

impl CycleHooks {
    /// No hooks
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pre-sleep hook
    #[must_use]
    pub fn with_pre_sleep(
        mut self,
        hook: impl FnMut(&Cycle) -> PlanSignal + Send + 'static,
    ) -> Self {
        self.pre_sleep = Some(Box::new(hook));
        self
    }

    /// Set the post-sleep hook
    #[must_use]
    pub fn with_post_sleep(
        mut self,
        hook: impl FnMut(&Cycle) -> PlanSignal + Send + 'static,
    ) -> Self {
        self.post_sleep = Some(Box::new(hook));
        self
    }
}

impl fmt::Debug for CycleHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CycleHooks")
            .field("pre_sleep", &self.pre_sleep.is_some())
            .field("post_sleep", &self.post_sleep.is_some())
            .finish()
    }
}
