//! Automatic gain control.
//!
//! Gain is computed per sample over a sliding window of the original
//! signal, then applied in one pass, so earlier scaling never feeds into a
//! later window.
use super::gain::GainFunction;

/// Normalise a signal's amplitude with a sliding window.
///
/// Sample `j` is scaled over the window `[j - w/2, j - w/2 + w)`, clipped
/// against the ends of the signal; the gain function receives the
/// effective (possibly smaller) window and the position of the current
/// sample within it.
pub fn agc(signal: &mut [f32], gain_function: GainFunction, window: usize, target_amplitude: f32) {
    let ns = signal.len();
    if ns == 0 || window == 0 {
        return;
    }
    let half = window / 2;

    let original = signal.to_vec();
    for (j, s) in signal.iter_mut().enumerate() {
        let start = j.saturating_sub(half);
        let end = std::cmp::min(ns, j + (window - half));
        let len = end - start;
        let center = j - start;
        *s = original[j] * gain_function(&original[start..end], len, target_amplitude, center);
    }
}
