//! Exact rolling quantile over a sliding window.
//!
//! The monitor partitions the window around a distinguished pivot sample:
//! everything at or below it sits in a max-heap on the left, everything at
//! or above it in a min-heap on the right, and a shared age ring schedules
//! expiry by arrival order. Keeping the left side at its proportional size
//! target puts the tracked order statistic in the pivot slot itself, so an
//! update is a constant number of heap operations.

use log::trace;
use snafu::ensure;

use crate::error::{
    EmptyWindowSnafu, InterpolationRangeSnafu, PortionTooLargeSnafu, RankOutOfWindowSnafu,
    StageError,
};
use crate::heap::{Heap, HeapMode, Slot};
use crate::ring::{AgeRing, Side, SlotLoc};

/// Continuous-quantile blend parameters.
///
/// `q` is the target quantile; `alpha` and `beta` pick the plotting
/// position, giving the target rank `alpha + q * (window + 1 - alpha -
/// beta)` counted from 1. The estimate blends the pivot with the adjacent
/// heap root by the rank's fractional part.
///
/// A NaN `q` is the "no interpolation" sentinel and validates successfully;
/// otherwise all three parameters must lie in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Interpolation {
    /// Target quantile.
    pub q: f64,
    /// Lower plotting-position parameter.
    pub alpha: f64,
    /// Upper plotting-position parameter.
    pub beta: f64,
}

impl Interpolation {
    /// Describe the quantile `q` with plotting position `(alpha, beta)`.
    #[must_use]
    pub const fn new(q: f64, alpha: f64, beta: f64) -> Self {
        Self { q, alpha, beta }
    }

    /// True when `q` is the NaN sentinel disabling interpolation.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.q.is_nan()
    }

    pub(crate) fn validate(&self) -> Result<(), StageError> {
        let unit = |x: f64| (0.0..=1.0).contains(&x);
        ensure!(
            (self.q.is_nan() || unit(self.q)) && unit(self.alpha) && unit(self.beta),
            InterpolationRangeSnafu
        );
        Ok(())
    }

    /// Target rank within a window, counted from 1.
    pub(crate) fn target(&self, window: usize) -> f64 {
        window as f64 * self.q + self.alpha + self.q * (1.0 - self.alpha - self.beta)
    }
}

/// Streaming order-statistic monitor.
///
/// `update` consumes one sample per call and returns the current estimate
/// of the `(portion + 1)`-th smallest of the most recent `window` samples.
/// NaN input means "no observation this step": the window still ages, so a
/// gap eventually scrolls out like any sample would.
///
/// # Example
///
/// ```
/// use midstream::RollingQuantile;
///
/// let mut median = RollingQuantile::new(3, 1).unwrap();
/// let outputs: Vec<f64> = [9.0, 1.0, 5.0, 7.0]
///     .into_iter()
///     .map(|x| median.update(x))
///     .collect();
/// assert_eq!(outputs, [9.0, 1.0, 5.0, 5.0]);
/// ```
#[derive(Debug)]
pub struct RollingQuantile {
    ring: AgeRing,
    left: Heap,
    right: Heap,
    pivot: Slot,
    window: usize,
    portion: usize,
    updates: u64,
    interp: Option<Interpolation>,
}

impl RollingQuantile {
    /// Track the `(portion + 1)`-th smallest over a window.
    ///
    /// `(portion + 0.5) / window` is the quantile this approximates; a
    /// median over an odd window is `portion = (window - 1) / 2`.
    pub fn new(window: usize, portion: usize) -> Result<Self, StageError> {
        ensure!(window > 0, EmptyWindowSnafu);
        ensure!(portion < window, PortionTooLargeSnafu { portion, window });
        Ok(Self {
            ring: AgeRing::new(window),
            left: Heap::new(Side::Left, HeapMode::Max, portion + 1),
            right: Heap::new(Side::Right, HeapMode::Min, window - portion),
            pivot: Slot::VACANT,
            window,
            portion,
            updates: 0,
            interp: None,
        })
    }

    /// Track the continuous quantile described by `interp`.
    ///
    /// The portion is derived from the interpolation target so the blend
    /// only ever needs the pivot and one adjacent heap root. Rejected when
    /// the derived rank falls outside the window (including the NaN
    /// sentinel, which has no rank at all).
    pub fn with_interpolation(window: usize, interp: Interpolation) -> Result<Self, StageError> {
        interp.validate()?;
        ensure!(window > 0, EmptyWindowSnafu);
        let target = interp.target(window);
        let rank = target.floor() - 1.0;
        ensure!(
            rank >= 0.0 && rank < window as f64,
            RankOutOfWindowSnafu { rank: target, window }
        );
        let mut monitor = Self::new(window, rank as usize)?;
        monitor.interp = Some(interp);
        Ok(monitor)
    }

    /// Consume one sample and return the current quantile estimate.
    pub fn update(&mut self, entry: f64) -> f64 {
        self.updates += 1;
        // The loop re-runs at most once: only when the expired sample was
        // the pivot and no heap could replace it, i.e. the window drained
        // to nothing and the monitor starts over from bootstrap.
        loop {
            self.ring.advance();

            if self.pivot.is_vacant() {
                if entry.is_nan() {
                    return f64::NAN;
                }
                self.pivot.value = entry;
                let cell = self.ring.register(SlotLoc::Pivot);
                self.pivot.cell = Some(cell);
                return entry;
            }

            match self.ring.take_expired() {
                None => {}
                Some(SlotLoc::Heap(Side::Left, index)) => {
                    self.left.remove(index, &mut self.ring);
                }
                Some(SlotLoc::Heap(Side::Right, index)) => {
                    self.right.remove(index, &mut self.ring);
                }
                Some(SlotLoc::Pivot) => {
                    // The pivot's own cell just left the ring.
                    self.pivot.cell = None;
                    if !self.right.is_empty() {
                        self.right.pop_into(&mut self.pivot, &mut self.ring);
                    } else if !self.left.is_empty() {
                        self.left.pop_into(&mut self.pivot, &mut self.ring);
                    } else {
                        trace!("window drained; quantile monitor restarts from bootstrap");
                        self.pivot = Slot::VACANT;
                        continue;
                    }
                }
            }

            if !entry.is_nan() {
                if entry <= self.pivot.value {
                    let index = self.left.push(entry, None, &mut self.ring);
                    let cell = self.ring.register(SlotLoc::Heap(Side::Left, index));
                    self.left.link(index, cell);
                } else {
                    let index = self.right.push(entry, None, &mut self.ring);
                    let cell = self.ring.register(SlotLoc::Heap(Side::Right, index));
                    self.right.link(index, cell);
                }
            }

            self.rebalance();
            return self.report();
        }
    }

    /// Restore the proportional size target by rotating samples through the
    /// pivot slot. Each round moves exactly one sample; in steady state at
    /// most one round is needed.
    fn rebalance(&mut self) {
        loop {
            let total = self.left.len() + self.right.len() + 1;
            let target = self.portion * total / self.window;
            if self.left.len() == target {
                return;
            }
            let mut expelled = Slot::VACANT;
            if self.left.len() < target {
                self.right.pop_into(&mut expelled, &mut self.ring);
                if !self.pivot.is_vacant() {
                    self.left.push(self.pivot.value, self.pivot.cell, &mut self.ring);
                }
            } else {
                self.left.pop_into(&mut expelled, &mut self.ring);
                if !self.pivot.is_vacant() {
                    self.right.push(self.pivot.value, self.pivot.cell, &mut self.ring);
                }
            }
            self.pivot = expelled;
        }
    }

    fn report(&self) -> f64 {
        match self.interp {
            None => self.pivot.value,
            Some(interp) => self.interpolate(interp),
        }
    }

    fn interpolate(&self, interp: Interpolation) -> f64 {
        let target = interp.target(self.window);
        let gamma = target - target.floor();
        let index = target.floor() as i64 - 1;
        let rank = self.portion as i64;
        if index == rank {
            match self.right.peek() {
                Some(above) => (1.0 - gamma) * self.pivot.value + gamma * above,
                None => self.pivot.value,
            }
        } else if index == rank - 1 {
            match self.left.peek() {
                Some(below) => (1.0 - gamma) * below + gamma * self.pivot.value,
                None => self.pivot.value,
            }
        } else {
            // The portion was not derived from this descriptor.
            f64::NAN
        }
    }

    /// Current estimate without consuming a sample. NaN before the first
    /// real observation.
    #[must_use]
    pub fn value(&self) -> f64 {
        if self.pivot.is_vacant() {
            return f64::NAN;
        }
        self.report()
    }

    /// Window capacity in samples.
    #[must_use]
    pub fn window(&self) -> usize {
        self.window
    }

    /// Number of samples kept strictly below the pivot once saturated.
    #[must_use]
    pub fn portion(&self) -> usize {
        self.portion
    }

    /// Live (non-NaN) samples currently in the window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// True when no sample is held at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.len() == 0
    }

    /// True once the monitor has seen a full window's worth of updates.
    #[must_use]
    pub fn is_saturated(&self) -> bool {
        self.updates >= self.window as u64
    }

    /// Updates consumed so far, NaNs included.
    #[must_use]
    pub fn updates(&self) -> u64 {
        self.updates
    }

    #[cfg(test)]
    pub(crate) fn heap_lens(&self) -> (usize, usize) {
        (self.left.len(), self.right.len())
    }

    /// Check every internal invariant: heap order on both sides, ordering
    /// across the pivot, the proportional size balance, and the two-way
    /// agreement between ring cells and slot back-references.
    #[must_use]
    pub fn verify(&self) -> bool {
        if !self.left.verify() || !self.right.verify() {
            return false;
        }
        let total = self.left.len() + self.right.len() + 1;
        if self.left.len() != self.portion * total / self.window {
            return false;
        }
        if !self.pivot.is_vacant() {
            if let Some(below) = self.left.peek() {
                if below > self.pivot.value {
                    return false;
                }
            }
            if let Some(above) = self.right.peek() {
                if above < self.pivot.value {
                    return false;
                }
            }
        }

        if self.ring.capacity() != self.window {
            return false;
        }
        let held = self.left.len() + self.right.len() + usize::from(!self.pivot.is_vacant());
        if held != self.ring.len() {
            return false;
        }
        // Every occupied cell names a live slot that names it back.
        for (cell, loc) in self.ring.occupied() {
            let backref = match loc {
                SlotLoc::Heap(Side::Left, index) if index < self.left.len() => {
                    self.left.slot(index).cell
                }
                SlotLoc::Heap(Side::Right, index) if index < self.right.len() => {
                    self.right.slot(index).cell
                }
                SlotLoc::Pivot if !self.pivot.is_vacant() => self.pivot.cell,
                _ => return false,
            };
            if backref != Some(cell) {
                return false;
            }
        }
        true
    }
}
