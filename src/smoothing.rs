//! Level conversion, range mapping and smoothing utilities

/// Convert linear amplitude to decibels full scale.
///
/// Silence maps to negative infinity rather than a floor value, so callers
/// can tell "no signal" apart from "very quiet".
pub fn amplitude_to_db(amplitude: f32) -> f32 {
    if amplitude == 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * amplitude.abs().log10()
    }
}

/// Convert decibels to linear amplitude
pub fn db_to_amplitude(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

/// Root mean square of a block, every sample weighted equally.
/// An empty block has an RMS of zero.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_squares / samples.len() as f64).sqrt() as f32
}

/// Position of `value` within `[min, max]` as a fraction in `[0, 1]`,
/// clamping the input to its range first.
pub fn normalize(value: f32, min: f32, max: f32) -> f32 {
    (value.clamp(min, max) - min) / (max - min)
}

/// One step of exponential smoothing. `factor` in [0, 1]; higher follows `target` faster.
pub fn smooth(current: f32, target: f32, factor: f32) -> f32 {
    current * (1.0 - factor) + target * factor
}

/// Per-step coefficient of a one-pole approach with time constant
/// `time_constant` seconds, stepped `rate` times per second.
///
/// Stepping `v += coeff * (target - v)` at `rate` reproduces
/// `target + (v0 - target) * exp(-t / time_constant)`.
pub fn one_pole_coefficient(time_constant: f32, rate: f32) -> f32 {
    if time_constant <= 0.0 || rate <= 0.0 {
        return 1.0;
    }
    1.0 - (-1.0 / (time_constant * rate)).exp()
}
