//! Monitor exactness against the sorting oracle.

use proptest::prelude::*;

use super::check_against_oracle;
use crate::RollingQuantile;

fn uniform(len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.0..1.0f64, len)
}

fn with_gaps(len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(
        prop_oneof![9 => 0.0..1.0f64, 1 => Just(f64::NAN)],
        len,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(3))]

    #[test]
    fn tracks_the_sorting_oracle(inputs in uniform(10_000)) {
        for &(window, portion) in &[(3, 1), (31, 15), (3001, 1500)] {
            check_against_oracle(window, portion, &inputs);
        }
    }

    #[test]
    fn tracks_off_center_quantiles(inputs in uniform(2_000)) {
        for &(window, portion) in &[(31, 3), (31, 28), (10, 0), (10, 9)] {
            check_against_oracle(window, portion, &inputs);
        }
    }

    #[test]
    fn tolerates_missing_samples(inputs in with_gaps(2_000)) {
        for &(window, portion) in &[(5, 2), (31, 7)] {
            check_against_oracle(window, portion, &inputs);
        }
    }
}

#[test]
fn warm_up_follows_the_proportional_target() {
    // The documented seed trajectory: prefix order statistics while the
    // window fills, then the exact rolling median.
    check_against_oracle(5, 2, &[4.0, 2.0, 3.0, 2.5, 4.5, 3.5, 2.7, 3.9, 3.8, 3.1]);
}

#[test]
fn nan_updates_never_grow_the_heaps() {
    let mut monitor = RollingQuantile::new(7, 3).unwrap();
    for entry in [5.0, 1.0, 4.0, 2.0, 3.0, 6.0, 0.5] {
        monitor.update(entry);
    }
    let (left, right) = monitor.heap_lens();
    assert_eq!(left + right + 1, 7);

    // A gap expires the oldest sample and replaces it with nothing.
    monitor.update(f64::NAN);
    let (left_after, right_after) = monitor.heap_lens();
    assert_eq!(left + right, left_after + right_after + 1);
    assert_eq!(monitor.len(), 6);
    assert!(monitor.verify());
}

#[test]
fn a_constant_stream_reports_the_constant() {
    let mut monitor = RollingQuantile::new(9, 4).unwrap();
    for _ in 0..40 {
        assert_eq!(monitor.update(2.5), 2.5);
        assert!(monitor.verify());
    }
}

#[test]
fn ties_are_handled_as_multiset_ranks() {
    check_against_oracle(
        7,
        3,
        &[1.0, 2.0, 2.0, 2.0, 3.0, 2.0, 2.0, 1.0, 2.0, 3.0, 2.0, 2.0],
    );
}
