//! 4D binning: for every trace of one survey, find the trace of another
//! survey that minimises the source/receiver dissimilarity `dsr`.
//!
//! The matcher works on [`Coords`] tables extracted from the two input
//! files, locally sorted by source x. Each rank publishes its coordinates
//! as a window; only ranks whose source-x ranges can possibly contain a
//! match within `dsr_max` are visited, and within each visit the candidate
//! ranges are trimmed by source x before the select kernel runs.
mod coords;
mod io;
mod kernel;

pub use coords::{Coords, ALIGN};
pub use io::{get_coords, output_non_monotonic};
pub use kernel::{calc_4dbin, dsr, init_update, update};

/// Options for a 4D binning run.
#[derive(Debug, Clone, Copy)]
pub struct FourDOptions {
    /// Log per-rank ranges and per-visit timings.
    pub verbose: bool,
    /// Persist the achieved `dsr` into the output trace headers.
    pub print_dsr: bool,
    /// Also extract inline/crossline numbers.
    pub ixline: bool,
}

impl Default for FourDOptions {
    fn default() -> Self {
        FourDOptions {
            verbose: false,
            print_dsr: true,
            ixline: false,
        }
    }
}
