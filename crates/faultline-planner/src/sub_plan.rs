//! Phase resolution
//!
//! A [`SubPlan`] is resolved exactly once: its percentage and size
//! specifications are snapshotted and zipped into a repeating sequence,
//! its interval and duration each take a single draw, and the duration is
//! converted into a cycle budget of `floor(duration / interval)` ticks.

use crate::error::PlanError;
use crate::spec::PhaseSpec;
use faultline_fluent::ByteSize;
use rand::Rng;
use std::time::Duration;

/// How many ticks a phase may still run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleBudget {
    /// Fixed number of ticks
    Finite {
        /// Ticks granted by the duration
        total: u64,
        /// Ticks consumed so far
        used: u64,
    },
    /// No duration: run until terminated
    Endless,
}

impl CycleBudget {
    fn from_duration(duration: Duration, interval: Duration) -> Self {
        // A zero interval pauses the plan after its first tick anyway.
        let total = if interval.is_zero() {
            1
        } else {
            u64::try_from(duration.as_nanos() / interval.as_nanos()).unwrap_or(u64::MAX)
        };
        Self::Finite { total, used: 0 }
    }

    /// Take one tick; `false` once exhausted
    pub fn consume(&mut self) -> bool {
        match self {
            Self::Endless => true,
            Self::Finite { total, used } => {
                if *used >= *total {
                    false
                } else {
                    *used += 1;
                    true
                }
            }
        }
    }

    /// Ticks granted, `None` when endless
    #[must_use]
    pub fn total(&self) -> Option<u64> {
        match self {
            Self::Finite { total, .. } => Some(*total),
            Self::Endless => None,
        }
    }
}

/// Frozen outcome of resolving one phase
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    values: Vec<(f64, ByteSize)>,
    interval: Duration,
    budget: CycleBudget,
}

impl Resolution {
    /// Repeating `(percentage, size)` sequence, never empty
    #[inline]
    #[must_use]
    pub fn values(&self) -> &[(f64, ByteSize)] {
        &self.values
    }

    /// Pair for the n-th tick of the phase, wrapping around
    #[must_use]
    pub fn value_at(&self, tick: usize) -> (f64, ByteSize) {
        self.values[tick % self.values.len()]
    }

    /// Sleep between hooks
    #[inline]
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Remaining budget
    #[inline]
    #[must_use]
    pub fn budget(&self) -> CycleBudget {
        self.budget
    }
}

/// One phase of a plan, resolved lazily and then cached
#[derive(Debug, Clone)]
pub struct SubPlan {
    index: usize,
    spec: PhaseSpec,
    resolution: Option<Resolution>,
}

impl SubPlan {
    /// Wrap a phase declaration
    #[must_use]
    pub fn new(index: usize, spec: PhaseSpec) -> Self {
        Self {
            index,
            spec,
            resolution: None,
        }
    }

    /// Position within the plan
    #[inline]
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Declaration this phase was built from
    #[inline]
    #[must_use]
    pub fn spec(&self) -> &PhaseSpec {
        &self.spec
    }

    /// Resolution, once prepared
    #[inline]
    #[must_use]
    pub fn resolution(&self) -> Option<&Resolution> {
        self.resolution.as_ref()
    }

    /// Resolve the phase; later calls return the cached result
    ///
    /// # Errors
    /// Returns `PlanError::SequenceLengthMismatch` when percentage and size
    /// snapshots disagree in length.
    pub fn prepare<R: Rng + ?Sized>(
        &mut self,
        default_interval: Duration,
        rng: &mut R,
    ) -> Result<&Resolution, PlanError> {
        let resolution = match self.resolution.take() {
            Some(cached) => cached,
            None => self.resolve(default_interval, rng)?,
        };
        Ok(&*self.resolution.insert(resolution))
    }

    fn resolve<R: Rng + ?Sized>(
        &self,
        default_interval: Duration,
        rng: &mut R,
    ) -> Result<Resolution, PlanError> {
        let percentages = self
            .spec
            .percentage
            .as_ref()
            .map(|spec| spec.snapshot(rng))
            .unwrap_or_default();
        let sizes = self
            .spec
            .size
            .as_ref()
            .map(|spec| spec.snapshot(rng))
            .unwrap_or_default();

        if !percentages.is_empty() && !sizes.is_empty() && percentages.len() != sizes.len() {
            return Err(PlanError::SequenceLengthMismatch {
                phase: self.index,
                percentage: percentages.len(),
                size: sizes.len(),
            });
        }

        let len = percentages.len().max(sizes.len()).max(1);
        let values = (0..len)
            .map(|i| {
                (
                    percentages.get(i).copied().unwrap_or(0.0),
                    sizes.get(i).copied().unwrap_or(ByteSize::ZERO),
                )
            })
            .collect();

        let interval = self
            .spec
            .interval
            .as_ref()
            .map_or(default_interval, |spec| spec.draw_with(rng));

        let budget = match &self.spec.duration {
            Some(spec) => CycleBudget::from_duration(spec.draw_with(rng), interval),
            None => CycleBudget::Endless,
        };

        Ok(Resolution {
            values,
            interval,
            budget,
        })
    }

    /// Consume one tick of the phase budget; `false` when the phase is over
    /// or was never prepared
    pub fn consume_cycle(&mut self) -> bool {
        self.resolution
            .as_mut()
            .is_some_and(|resolution| resolution.budget.consume())
    }
}
