//! Ordered chain of cascade stages.

use core::fmt;

use log::debug;
use snafu::ResultExt;

use crate::cascade::{Cascade, StageSpec};
use crate::error::{BuildError, BuildSnafu};

/// A chain of cascade filters fed one sample at a time.
///
/// Each input trickles down the chain: every stage updates its monitor,
/// applies its low- or high-pass shaping, and ticks its subsample clock. A
/// stage whose clock has not fired stalls the rest of the chain for that
/// step and the pipeline emits NaN.
///
/// A pipeline is a single-owner resource: updates are strictly serial and
/// define each window's notion of age. Independent pipelines can run on
/// separate threads without coordination.
///
/// # Example
///
/// ```
/// use midstream::{Pipeline, StageSpec};
///
/// let mut pipeline = Pipeline::new([StageSpec::low_pass(5, 2)]).unwrap();
/// let smoothed = pipeline.feed_slice(&[4.0, 2.0, 3.0, 2.5, 4.5]);
/// assert_eq!(smoothed, [4.0, 2.0, 3.0, 2.5, 3.0]);
/// ```
#[derive(Debug)]
pub struct Pipeline {
    stages: Vec<Cascade>,
    stride: usize,
    lag: f64,
}

impl Pipeline {
    /// Build a pipeline from stage descriptors.
    ///
    /// Every descriptor is validated before any stage is allocated; a bad
    /// one rejects the whole pipeline with its position attached.
    pub fn new<I>(specs: I) -> Result<Self, BuildError>
    where
        I: IntoIterator<Item = StageSpec>,
    {
        let specs: Vec<StageSpec> = specs.into_iter().collect();
        for (index, spec) in specs.iter().enumerate() {
            spec.validate().context(BuildSnafu { index })?;
        }

        let mut stride = 1usize;
        let mut lag = 0.0;
        let mut stages = Vec::with_capacity(specs.len());
        for (index, spec) in specs.iter().enumerate() {
            lag += 0.5 * (spec.window * stride) as f64;
            stride *= spec.subsample;
            stages.push(Cascade::new(spec).context(BuildSnafu { index })?);
        }
        debug!(
            "pipeline ready: {} cascades, stride {stride}, lag {lag}",
            stages.len()
        );
        Ok(Self { stages, stride, lag })
    }

    /// Feed one sample through the chain.
    ///
    /// NaN output means "no emission this step": either a subsample gate
    /// stalled or a NaN flowed through. Tell them apart with
    /// [`f64::is_nan`] on the input if it matters.
    pub fn feed(&mut self, entry: f64) -> f64 {
        let mut trickle = entry;
        for stage in &mut self.stages {
            match stage.step(trickle) {
                Some(out) => trickle = out,
                None => return f64::NAN,
            }
        }
        trickle
    }

    /// Feed a whole slice, returning one output per input.
    ///
    /// Exactly equivalent to calling [`feed`](Self::feed) element by
    /// element in index order.
    #[must_use]
    pub fn feed_slice(&mut self, entries: &[f64]) -> Vec<f64> {
        entries.iter().map(|&entry| self.feed(entry)).collect()
    }

    /// Total stride between emissions, in input samples: the product of
    /// every stage's subsample rate.
    #[must_use]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Effective lag between output and input for a balanced filter, in
    /// input samples: half of each stage's window, scaled by the stride
    /// accumulated in front of it.
    #[must_use]
    pub fn lag(&self) -> f64 {
        self.lag
    }

    /// Number of cascade stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// True when the pipeline has no stages (and feeds pass through).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Check every stage's internal invariants.
    #[must_use]
    pub fn verify(&self) -> bool {
        self.stages.iter().all(Cascade::verify)
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pipeline(<{} cascades>)", self.stages.len())
    }
}
