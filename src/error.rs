//! Construction-rejection errors.
//!
//! Descriptor problems are reported at construction time and never later:
//! feeding a well-formed pipeline cannot fail, NaN outputs mean "no emission
//! this step", and internal invariant breakage asserts instead of returning.

use snafu::Snafu;

/// Why a single stage descriptor was rejected.
#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum StageError {
    /// The window must hold at least one sample.
    #[snafu(display("window must hold at least one sample"))]
    EmptyWindow,

    /// The portion must leave room for the pivot inside the window.
    #[snafu(display("portion {portion} must be smaller than window {window}"))]
    PortionTooLarge {
        /// Requested number of samples below the pivot.
        portion: usize,
        /// Window the portion was requested for.
        window: usize,
    },

    /// A subsample rate of zero would never emit.
    #[snafu(display("subsample rate must be at least 1"))]
    ZeroSubsample,

    /// Interpolation parameters must all be probabilities.
    #[snafu(display("interpolation parameters must lie in [0, 1]"))]
    InterpolationRange,

    /// The interpolated target rank must land inside the window.
    #[snafu(display("interpolated rank {rank:.3} falls outside window {window}"))]
    RankOutOfWindow {
        /// Target rank derived from the interpolation parameters.
        rank: f64,
        /// Window the rank was derived for.
        window: usize,
    },
}

/// A pipeline descriptor was rejected before any stage was allocated.
#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
#[snafu(display("stage {index}: {source}"))]
pub struct BuildError {
    index: usize,
    source: StageError,
}

impl BuildError {
    /// Position of the offending stage descriptor.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// The per-stage rejection reason.
    #[must_use]
    pub fn reason(&self) -> &StageError {
        &self.source
    }
}
