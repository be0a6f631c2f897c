// Copyright (C) 2024 by GiGa infosystems
//! The gain statistics used by automatic gain control.

/// A gain statistic: `g(window, window_size, target_amplitude,
/// window_center)` returning the factor that normalises the window.
///
/// A window of pure zeros yields a factor of 0 rather than a division by
/// zero; zero samples never count toward an average's denominator.
pub type GainFunction = fn(&[f32], usize, f32, usize) -> f32;

fn non_zero(v: f32) -> bool {
    v.abs() > 0.0
}

pub fn rectangular_rms_gain(
    signal: &[f32],
    window_size: usize,
    target_amplitude: f32,
    _window_center: usize,
) -> f32 {
    let mut amp = 0.0f32;
    for &s in &signal[..window_size] {
        amp += s * s;
    }
    if !non_zero(amp) {
        return 0.0;
    }
    let num = signal[..window_size].iter().filter(|&&s| non_zero(s)).count();
    target_amplitude / (amp / std::cmp::max(1, num) as f32).sqrt()
}

pub fn triangular_rms_gain(
    signal: &[f32],
    window_size: usize,
    target_amplitude: f32,
    window_center: usize,
) -> f32 {
    // The window may have been clipped against either end of the trace, so
    // the center is not necessarily central; whichever side is wider is the
    // half-width of the full triangle.
    let left_width = window_center;
    let right_width = (window_size - 1).saturating_sub(window_center);
    let half_width = std::cmp::max(left_width, right_width) as f32;

    let mut amp = 0.0f32;
    for (j, &s) in signal[..window_size].iter().enumerate() {
        let distance = if j > window_center {
            j - window_center
        } else {
            window_center - j
        } as f32;
        let scaling = if half_width > 0.0 {
            1.0 - distance / half_width
        } else {
            1.0
        };
        let scaled = s * scaling;
        amp += scaled * scaled;
    }
    if !non_zero(amp) {
        return 0.0;
    }
    let num = signal[..window_size].iter().filter(|&&s| non_zero(s)).count();
    target_amplitude / (amp / std::cmp::max(1, num) as f32).sqrt()
}

pub fn mean_abs_gain(
    signal: &[f32],
    window_size: usize,
    target_amplitude: f32,
    _window_center: usize,
) -> f32 {
    let amp: f32 = signal[..window_size].iter().sum();
    if !non_zero(amp) {
        return 0.0;
    }
    let num = signal[..window_size].iter().filter(|&&s| non_zero(s)).count();
    target_amplitude / (amp.abs() / std::cmp::max(1, num) as f32)
}

pub fn median_gain(
    signal: &[f32],
    window_size: usize,
    target_amplitude: f32,
    _window_center: usize,
) -> f32 {
    let mut tmp = signal[..window_size].to_vec();
    tmp.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let amp = if window_size % 2 == 0 {
        // The upper-middle pair. A two-sample window has no pair above
        // the middle and degenerates to its upper sample.
        let upper = std::cmp::min(window_size / 2 + 1, window_size - 1);
        (tmp[window_size / 2] + tmp[upper]) / 2.0
    } else {
        tmp[window_size / 2]
    };
    if !non_zero(amp) {
        return 0.0;
    }
    target_amplitude / amp
}
