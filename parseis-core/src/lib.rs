//! This library is the foundation for the `parseis` workspace. It holds the
//! structures and codecs that the parallel SEG-Y engines and the trace
//! operators are built from: the error and status types, the number and text
//! codecs, the declarative trace-header rules with their columnar metadata
//! container, and the per-trace signal kernels.
//!
//! Everything in this crate is rank-agnostic: nothing here communicates.
//! The parallel substrate lives in `parseis-comm`, the file engines in
//! `parseis-in` and `parseis-out`, and the distributed operators in
//! `parseis-ops`.
#![allow(clippy::derive_partial_eq_without_eq)]
extern crate encoding8;
extern crate fnv;
extern crate ibmfloat;
extern crate log;
extern crate num;
#[macro_use]
extern crate num_derive;
extern crate num_traits;

#[cfg(feature = "serde")]
extern crate serde;

pub mod enums;
pub mod errors;
pub mod metadata;
pub mod number_encoding;
pub mod report;
pub mod rules;
pub mod segy;
pub mod signal;
pub mod text_encoding;

pub use errors::ParseisError;

pub use enums::*;
pub use metadata::{PackedRow, TraceMetadata};
pub use report::{LogEntry, Report, Status};
pub use rules::{RuleEntry, RuleSet, TraceKey};

pub const TEXT_HEADER_LEN: usize = 3200;
pub const BIN_HEADER_LEN: usize = 400;
pub const REEL_HEADER_LEN: usize = 3600;
pub const TRACE_HEADER_LEN: usize = 240;
