//! Mapping from ambient loudness to a playback gain target

use crate::constants::policy::{MAX_DB, MIN_DB, UNITY_GAIN};
use crate::sampler::LoudnessSample;
use crate::settings::Configuration;
use crate::smoothing::normalize;

/// Playback gain multiplier, always finite and at least unity
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct GainTarget(f32);

impl GainTarget {
    pub const UNITY: GainTarget = GainTarget(UNITY_GAIN);

    /// Build a target from a raw multiplier. Non-finite values are rejected,
    /// anything below unity is raised to unity.
    pub fn new(value: f32) -> Option<Self> {
        value.is_finite().then(|| GainTarget(value.max(UNITY_GAIN)))
    }

    pub fn value(self) -> f32 {
        self.0
    }
}

/// Gain to apply for `sample` under `config`.
///
/// `None` means "leave the current gain alone": no signal was measured, which
/// says more about the sampler than about the room.
pub fn compute_target_gain(sample: LoudnessSample, config: &Configuration) -> Option<GainTarget> {
    if !config.enabled {
        return Some(GainTarget::UNITY);
    }
    if sample == f32::NEG_INFINITY || sample.is_nan() {
        return None;
    }

    // Scale the normalized level by sensitivity before adding unity, so a
    // full-scale room lands on exactly `1.0 + sensitivity`.
    let position = normalize(sample, MIN_DB, MAX_DB);
    GainTarget::new(position * config.sensitivity + UNITY_GAIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled(sensitivity: f32) -> Configuration {
        Configuration {
            enabled: true,
            sensitivity,
            ..Configuration::default()
        }
    }

    fn gain(sample: f32, config: &Configuration) -> f32 {
        compute_target_gain(sample, config).unwrap().value()
    }

    #[test]
    fn test_quiet_room_clamps_to_unity() {
        let config = enabled(1.5);
        for sample in [-70.5, -80.0, -120.0, -1000.0] {
            assert_eq!(gain(sample, &config), 1.0);
        }
    }

    #[test]
    fn test_loud_room_clamps_to_full_boost() {
        for step in 0..=250 {
            let sensitivity = 0.5 + step as f32 * 0.01;
            let config = enabled(sensitivity);
            for sample in [-19.9, -10.0, 0.0] {
                assert_eq!(
                    gain(sample, &config),
                    1.0 + sensitivity,
                    "sensitivity {} at {} dB",
                    sensitivity,
                    sample
                );
            }
        }
    }

    #[test]
    fn test_midpoint() {
        assert!((gain(-45.0, &enabled(1.5)) - 1.75).abs() < 1e-6);
    }

    #[test]
    fn test_monotonic_in_loudness() {
        let config = enabled(2.0);
        let mut previous = 0.0;
        let mut sample = -90.0;
        while sample <= 0.0 {
            let g = gain(sample, &config);
            assert!(g >= previous, "gain fell at {} dB", sample);
            previous = g;
            sample += 0.25;
        }
    }

    #[test]
    fn test_disabled_always_resets_to_unity() {
        let config = Configuration {
            enabled: false,
            sensitivity: 3.0,
            ..Configuration::default()
        };
        for sample in [f32::NEG_INFINITY, -90.0, -45.0, 0.0, f32::NAN] {
            assert_eq!(compute_target_gain(sample, &config), Some(GainTarget::UNITY));
        }
    }

    #[test]
    fn test_silence_skips_actuation() {
        assert_eq!(compute_target_gain(f32::NEG_INFINITY, &enabled(1.5)), None);
        assert_eq!(compute_target_gain(f32::NAN, &enabled(1.5)), None);
    }

    #[test]
    fn test_gain_target_rejects_invalid_values() {
        assert_eq!(GainTarget::new(f32::INFINITY), None);
        assert_eq!(GainTarget::new(f32::NAN), None);
        assert_eq!(GainTarget::new(0.2), Some(GainTarget::UNITY));
        assert_eq!(GainTarget::new(2.0).map(GainTarget::value), Some(2.0));
    }
}
