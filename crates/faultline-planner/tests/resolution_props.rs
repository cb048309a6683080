//! Resolution properties over generated phases

use faultline_fluent::{DurationSpec, FloatSpec};
use faultline_planner::{CycleBudget, PhaseSpec, SubPlan};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;

fn resolve(spec: PhaseSpec, seed: u64) -> faultline_planner::Resolution {
    let mut rng = StdRng::seed_from_u64(seed);
    SubPlan::new(0, spec)
        .prepare(Duration::from_secs(1), &mut rng)
        .unwrap()
        .clone()
}

proptest! {
    #[test]
    fn budget_is_floor_of_duration_over_interval(interval in 1u64..500, duration in 0u64..10_000) {
        let spec = PhaseSpec::default()
            .with_interval(DurationSpec::exactly(Duration::from_millis(interval)))
            .with_duration(DurationSpec::exactly(Duration::from_millis(duration)));
        let budget = resolve(spec, 0).budget();
        prop_assert_eq!(budget.total(), Some(duration / interval));
    }

    #[test]
    fn list_replays_as_a_ring(values in prop::collection::vec(0u8..=100, 1..8), ticks in 1usize..40) {
        let list: Vec<f64> = values.iter().map(|v| f64::from(*v)).collect();
        let spec = PhaseSpec::default().with_percentage(FloatSpec::list(list.clone()).unwrap());
        let resolution = resolve(spec, 0);
        for tick in 0..ticks {
            prop_assert_eq!(resolution.value_at(tick).0, list[tick % list.len()]);
        }
    }

    #[test]
    fn range_is_frozen_within_bounds(a in 0.0f64..100.0, b in 0.0f64..100.0, seed in any::<u64>()) {
        let spec = PhaseSpec::default().with_percentage(FloatSpec::between(a, b));
        let resolution = resolve(spec, seed);
        prop_assert_eq!(resolution.values().len(), 1);
        let (percentage, _) = resolution.value_at(0);
        prop_assert!(percentage >= a.min(b) && percentage <= a.max(b));
        prop_assert_eq!(resolution.value_at(7).0, percentage);
    }

    #[test]
    fn missing_duration_is_endless(interval in 1u64..1000) {
        let spec = PhaseSpec::default()
            .with_interval(DurationSpec::exactly(Duration::from_millis(interval)));
        prop_assert_eq!(resolve(spec, 0).budget(), CycleBudget::Endless);
    }
}
