//! Whole-crate scenarios: exactness against a sorting oracle, missing-value
//! behavior, subsample gating, determinism, and construction rejection.

mod quantile;

use std::collections::VecDeque;

use crate::RollingQuantile;

/// Replay `inputs` through an independently sorted window and check the
/// monitor's output, live count, and invariants at every step.
///
/// During warm-up the monitor keeps the left heap at the proportional
/// target `portion * live / window`, so the expected output is always the
/// `(target + 1)`-th smallest of the live samples, saturated or not.
pub(crate) fn check_against_oracle(window: usize, portion: usize, inputs: &[f64]) {
    let mut monitor = RollingQuantile::new(window, portion).unwrap();
    let mut recent: VecDeque<f64> = VecDeque::with_capacity(window + 1);
    let mut sorted: Vec<f64> = Vec::with_capacity(window);

    for (step, &entry) in inputs.iter().enumerate() {
        let out = monitor.update(entry);

        recent.push_back(entry);
        if recent.len() > window {
            let gone = recent.pop_front().unwrap();
            if !gone.is_nan() {
                let at = sorted.partition_point(|&v| v < gone);
                sorted.remove(at);
            }
        }
        if !entry.is_nan() {
            let at = sorted.partition_point(|&v| v <= entry);
            sorted.insert(at, entry);
        }

        assert!(monitor.verify(), "invariants broken at step {step}");
        assert_eq!(monitor.len(), sorted.len(), "live count wrong at step {step}");
        if sorted.is_empty() {
            assert!(out.is_nan(), "output from an empty window at step {step}");
        } else {
            let expected = sorted[portion * sorted.len() / window];
            assert_eq!(out, expected, "order statistic wrong at step {step}");
        }
        if sorted.len() == window {
            assert_eq!(
                monitor.heap_lens().0,
                portion,
                "left heap off target at step {step}"
            );
        }
    }
}
