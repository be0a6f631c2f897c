//! Per-trace signal kernels: taper, mute and automatic gain control.
//!
//! Every kernel works in place on one trace's samples and is independent of
//! any other trace, so callers are free to batch them however the I/O
//! batching falls.
mod agc;
mod gain;
mod mute;
mod taper;

pub use agc::agc;
pub use gain::{
    mean_abs_gain, median_gain, rectangular_rms_gain, triangular_rms_gain, GainFunction,
};
pub use mute::mute;
pub use taper::{cosine_square_taper, cosine_taper, linear_taper, taper, TaperFunction};
