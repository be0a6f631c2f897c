//! Muting of the ends of a signal.
use super::taper::TaperFunction;

/// Zero the outer regions of a signal and taper into the live middle.
///
/// The layout, from the front: `mute_begin` zeroed samples, `taper_begin`
/// tapered samples, the untouched middle, `taper_end` tapered samples and
/// `mute_end` zeroed samples. The four lengths must fit inside the signal.
pub fn mute(
    signal: &mut [f32],
    taper_function: TaperFunction,
    mute_begin: usize,
    taper_begin: usize,
    mute_end: usize,
    taper_end: usize,
) {
    let ns = signal.len();
    assert!(ns > mute_begin + taper_begin);
    assert!(ns > taper_end + mute_end);

    for s in signal.iter_mut().take(mute_begin) {
        *s = 0.0;
    }

    for j in mute_begin..mute_begin + taper_begin {
        signal[j] *= taper_function((j - mute_begin) as f32, taper_begin as f32);
    }

    for j in ns - taper_end - mute_end..ns - mute_end {
        signal[j] *= taper_function((ns - (j + 1) - mute_end) as f32, taper_end as f32);
    }

    for s in signal.iter_mut().skip(ns - mute_end) {
        *s = 0.0;
    }
}
