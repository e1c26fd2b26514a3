//! One pipeline stage: quantile monitor, optional high-pass differencing,
//! and a subsample gate.

use snafu::ensure;

use crate::error::{
    EmptyWindowSnafu, PortionTooLargeSnafu, RankOutOfWindowSnafu, StageError, ZeroSubsampleSnafu,
};
use crate::quantile::{Interpolation, RollingQuantile};

/// Stage output flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mode {
    /// Emit the quantile estimate itself.
    LowPass,
    /// Emit the middle of the raw window minus the quantile estimate.
    ///
    /// The raw stream must not contain NaNs in this mode; put a low-pass
    /// stage in front to smooth gaps away first.
    HighPass,
}

/// Descriptor for one cascade stage.
///
/// Plain data: build them up front, hand them to
/// [`Pipeline::new`](crate::Pipeline::new), and the pipeline validates the
/// whole chain before allocating anything.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StageSpec {
    /// Number of most-recent samples in the stage's window.
    pub window: usize,
    /// Samples kept strictly below the pivot; the stage tracks the
    /// `(portion + 1)`-th smallest of its window. Ignored when an enabled
    /// interpolation descriptor derives it instead.
    pub portion: usize,
    /// Emit every `subsample`-th output and stall the rest.
    pub subsample: usize,
    /// Low-pass or high-pass behavior.
    pub mode: Mode,
    /// Optional continuous-quantile blend.
    pub interpolation: Option<Interpolation>,
}

impl StageSpec {
    /// A smoothing stage that emits the quantile itself.
    #[must_use]
    pub const fn low_pass(window: usize, portion: usize) -> Self {
        Self {
            window,
            portion,
            subsample: 1,
            mode: Mode::LowPass,
            interpolation: None,
        }
    }

    /// A differencing stage that emits raw-middle minus quantile.
    #[must_use]
    pub const fn high_pass(window: usize, portion: usize) -> Self {
        Self {
            window,
            portion,
            subsample: 1,
            mode: Mode::HighPass,
            interpolation: None,
        }
    }

    /// Emit only every `rate`-th output.
    #[must_use]
    pub const fn with_subsample(mut self, rate: usize) -> Self {
        self.subsample = rate;
        self
    }

    /// Blend the estimate continuously around the quantile `q`.
    #[must_use]
    pub const fn with_interpolation(mut self, q: f64, alpha: f64, beta: f64) -> Self {
        self.interpolation = Some(Interpolation::new(q, alpha, beta));
        self
    }

    /// Check the descriptor without allocating anything.
    pub fn validate(&self) -> Result<(), StageError> {
        ensure!(self.subsample >= 1, ZeroSubsampleSnafu);
        ensure!(self.window > 0, EmptyWindowSnafu);
        match self.interpolation {
            Some(interp) if !interp.is_disabled() => {
                interp.validate()?;
                let target = interp.target(self.window);
                let rank = target.floor() - 1.0;
                ensure!(
                    rank >= 0.0 && rank < self.window as f64,
                    RankOutOfWindowSnafu { rank: target, window: self.window }
                );
            }
            Some(interp) => {
                interp.validate()?;
                ensure!(
                    self.portion < self.window,
                    PortionTooLargeSnafu { portion: self.portion, window: self.window }
                );
            }
            None => {
                ensure!(
                    self.portion < self.window,
                    PortionTooLargeSnafu { portion: self.portion, window: self.window }
                );
            }
        }
        Ok(())
    }
}

/// Raw-sample ring that reports the middle of the current window.
///
/// `head` points right after the latest entry. Before the ring first wraps,
/// the middle of what has been filled so far (`entries[head / 2]`) stands in
/// for the true middle, so warm-up lag is asymmetric; once full, the slot
/// just right of center is used, which biases even windows younger.
#[derive(Debug)]
struct MiddleRing {
    entries: Box<[f64]>,
    head: usize,
    full: bool,
}

impl MiddleRing {
    fn new(window: usize) -> Self {
        Self {
            entries: vec![f64::NAN; window].into_boxed_slice(),
            head: 0,
            full: false,
        }
    }

    fn push(&mut self, value: f64) {
        if self.head == self.entries.len() {
            self.full = true;
            self.head = 0;
        }
        self.entries[self.head] = value;
        self.head += 1;
    }

    fn middle(&self) -> f64 {
        if !self.full {
            return self.entries[self.head / 2];
        }
        let len = self.entries.len();
        let half = len / 2 + len % 2;
        self.entries[(self.head + len - half) % len]
    }
}

/// One stage of a filter pipeline.
#[derive(Debug)]
pub(crate) struct Cascade {
    monitor: RollingQuantile,
    subsample: usize,
    clock: usize,
    middle: Option<MiddleRing>,
}

impl Cascade {
    pub(crate) fn new(spec: &StageSpec) -> Result<Self, StageError> {
        spec.validate()?;
        let monitor = match spec.interpolation {
            Some(interp) if !interp.is_disabled() => {
                RollingQuantile::with_interpolation(spec.window, interp)?
            }
            _ => RollingQuantile::new(spec.window, spec.portion)?,
        };
        let middle = match spec.mode {
            Mode::HighPass => Some(MiddleRing::new(spec.window)),
            Mode::LowPass => None,
        };
        Ok(Self {
            monitor,
            subsample: spec.subsample,
            clock: 0,
            middle,
        })
    }

    /// Consume one sample; `None` while the subsample gate is stalling.
    pub(crate) fn step(&mut self, entry: f64) -> Option<f64> {
        let quantile = self.monitor.update(entry);
        let out = match &mut self.middle {
            Some(ring) => {
                ring.push(entry);
                ring.middle() - quantile
            }
            None => quantile,
        };
        self.clock += 1;
        if self.clock < self.subsample {
            return None;
        }
        self.clock = 0;
        Some(out)
    }

    pub(crate) fn verify(&self) -> bool {
        self.monitor.verify()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn middle_ring_warms_up_from_the_filled_half() {
        let mut ring = MiddleRing::new(5);
        ring.push(10.0);
        assert_eq!(ring.middle(), 10.0);
        ring.push(20.0);
        assert_eq!(ring.middle(), 20.0);
        ring.push(30.0);
        assert_eq!(ring.middle(), 20.0);
        ring.push(40.0);
        ring.push(50.0);
        assert_eq!(ring.middle(), 30.0);
        // Once wrapped: always the sample floor(5 / 2) steps old.
        ring.push(60.0);
        assert_eq!(ring.middle(), 40.0);
        ring.push(70.0);
        assert_eq!(ring.middle(), 50.0);
    }

    #[test]
    fn even_windows_pick_the_younger_of_the_two_middles() {
        let mut ring = MiddleRing::new(4);
        for value in [1.0, 2.0, 3.0, 4.0] {
            ring.push(value);
        }
        assert_eq!(ring.middle(), 3.0);
        ring.push(5.0);
        assert_eq!(ring.middle(), 4.0);
    }

    #[test]
    fn high_pass_subtracts_the_quantile_from_the_raw_middle() {
        let spec = StageSpec::high_pass(3, 1);
        let mut stage = Cascade::new(&spec).unwrap();
        let outputs: Vec<f64> = [1.0, 5.0, 2.0, 8.0, 3.0]
            .into_iter()
            .map(|x| stage.step(x).unwrap())
            .collect();
        assert_eq!(outputs, [0.0, 4.0, 3.0, -3.0, 5.0]);
        assert!(stage.verify());
    }

    #[test]
    fn subsample_gate_stalls_between_emissions() {
        let spec = StageSpec::low_pass(3, 1).with_subsample(3);
        let mut stage = Cascade::new(&spec).unwrap();
        let fired: Vec<bool> = (0..9)
            .map(|i| stage.step(i as f64).is_some())
            .collect();
        assert_eq!(
            fired,
            [false, false, true, false, false, true, false, false, true]
        );
    }

    #[test]
    fn validate_matches_construction() {
        let bad = StageSpec::low_pass(5, 2).with_subsample(0);
        assert_eq!(bad.validate().unwrap_err(), StageError::ZeroSubsample);
        assert!(Cascade::new(&bad).is_err());

        let sentinel = StageSpec::low_pass(5, 2).with_interpolation(f64::NAN, 0.0, 0.0);
        assert!(sentinel.validate().is_ok());
        let stage = Cascade::new(&sentinel).unwrap();
        assert_eq!(stage.monitor.portion(), 2);
    }
}
