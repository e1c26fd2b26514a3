//! Exact rolling quantiles over sliding windows, composable into cascaded
//! filter pipelines.
//!
//! A [`RollingQuantile`] tracks an exact order statistic (median, 90th
//! percentile, anything by rank) over the most recent `window` samples of
//! an unbounded stream, in `O(log window)` per update. Two complementary
//! heaps partition the window around a pivot sample while an age ring
//! expires the oldest entry wherever the heaps have carried it; NaN inputs
//! count as missing observations that age through the window without ever
//! entering a heap.
//!
//! A [`Pipeline`] chains these monitors into cascaded stages, each
//! optionally high-pass (raw minus smoothed) and each free to subsample its
//! output so later stages run at lower rates.
//!
//! # Example
//!
//! ```
//! use midstream::{Pipeline, StageSpec};
//!
//! let mut pipeline = Pipeline::new([
//!     StageSpec::low_pass(5, 2),
//!     StageSpec::high_pass(3, 1).with_subsample(2),
//! ])
//! .unwrap();
//!
//! for x in [4.0, 2.0, 3.0, 2.5, 4.5, 3.5] {
//!     let y = pipeline.feed(x);
//!     if !y.is_nan() {
//!         // every 2nd step carries the band-passed sample
//!     }
//! }
//! assert!(pipeline.verify());
//! ```

#![warn(missing_docs)]

mod cascade;
mod error;
mod heap;
mod pipeline;
mod quantile;
mod ring;

#[cfg(test)]
mod tests;

pub use cascade::{Mode, StageSpec};
pub use error::{BuildError, StageError};
pub use pipeline::Pipeline;
pub use quantile::{Interpolation, RollingQuantile};
