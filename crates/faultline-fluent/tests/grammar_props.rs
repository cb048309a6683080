use faultline_fluent::{ByteSize, DurationSpec, FloatSpec, SizeSpec, SpecKind};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;

proptest! {
    #[test]
    fn exact_value_never_varies(v in -1.0e6f64..1.0e6, seed in any::<u64>()) {
        let spec: FloatSpec = v.to_string().parse().unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..8 {
            prop_assert_eq!(spec.draw_with(&mut rng), v);
        }
        prop_assert_eq!(spec.snapshot(&mut rng), vec![v]);
    }

    #[test]
    fn between_bounds_ignore_input_order(a in 0u32..10_000, b in 0u32..10_000, seed in any::<u64>()) {
        let spec: FloatSpec = format!("{a} to {b}").parse().unwrap();
        let (lo, hi) = (f64::from(a.min(b)), f64::from(a.max(b)));
        prop_assert_eq!(spec.range(), Some((lo, hi)));

        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..8 {
            let v = spec.draw_with(&mut rng);
            prop_assert!(v >= lo && v <= hi);
        }
    }

    #[test]
    fn size_between_bounds_ignore_input_order(a in 0u64..1 << 40, b in 0u64..1 << 40, seed in any::<u64>()) {
        let spec: SizeSpec = format!("{b} to {a}").parse().unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        let snap = spec.snapshot(&mut rng);
        prop_assert_eq!(snap.len(), 1);
        prop_assert!(snap[0] >= ByteSize(a.min(b)) && snap[0] <= ByteSize(a.max(b)));
    }

    #[test]
    fn list_snapshot_is_literal(values in prop::collection::vec(0u16..1000, 2..12)) {
        let text = values.iter().map(ToString::to_string).collect::<Vec<_>>().join(",");
        let spec: FloatSpec = text.parse().unwrap();
        let expected: Vec<f64> = values.iter().copied().map(f64::from).collect();

        prop_assert_eq!(spec.kind(), &SpecKind::List(expected.clone()));
        prop_assert_eq!(spec.snapshot_len(), expected.len());
        prop_assert_eq!(spec.snapshot(&mut StdRng::seed_from_u64(0)), expected);
    }

    #[test]
    fn millisecond_durations_parse(ms in 1u64..100_000) {
        let spec: DurationSpec = format!("{ms}ms").parse().unwrap();
        prop_assert_eq!(spec.draw(), Duration::from_millis(ms));
    }

    #[test]
    fn parser_never_panics(input in ".{0,40}") {
        let _ = FloatSpec::parse(&input);
        let _ = DurationSpec::parse(&input);
        let _ = SizeSpec::parse(&input);
    }
}
