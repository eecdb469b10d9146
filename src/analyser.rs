//! Shared time-domain analysis buffer fed by the capture callback

use crate::constants::audio::{FFT_SIZE, SMOOTHING_TIME_CONSTANT};
use crate::smoothing::{amplitude_to_db, rms, smooth};
use std::borrow::Cow;
use std::sync::{Arc, Mutex};

struct AnalyserState {
    ring: Vec<f32>,
    write_pos: usize,
    smoothed_rms: f32,
}

/// Keeps the most recent `fft_size` mono samples of the capture stream.
///
/// Cloning is cheap; the capture callback holds one clone and writes into it,
/// the sampler holds another and reads.
#[derive(Clone)]
pub struct Analyser {
    state: Arc<Mutex<AnalyserState>>,
    fft_size: usize,
    smoothing_time_constant: f32,
}

impl Analyser {
    /// Create an analyser with the given window size and smoothing constant
    pub fn new(fft_size: usize, smoothing_time_constant: f32) -> Self {
        let fft_size = fft_size.max(1);
        Self {
            state: Arc::new(Mutex::new(AnalyserState {
                ring: vec![0.0; fft_size],
                write_pos: 0,
                smoothed_rms: 0.0,
            })),
            fft_size,
            smoothing_time_constant: smoothing_time_constant.clamp(0.0, 1.0),
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Append a block of mono samples, overwriting the oldest ones.
    /// Non-finite samples are stored as silence.
    pub fn push(&self, block: &[f32]) {
        if block.is_empty() {
            return;
        }
        let block: Cow<[f32]> = if block.iter().all(|s| s.is_finite()) {
            Cow::Borrowed(block)
        } else {
            Cow::Owned(
                block
                    .iter()
                    .map(|&s| if s.is_finite() { s } else { 0.0 })
                    .collect(),
            )
        };
        let Ok(mut state) = self.state.lock() else {
            return;
        };

        // Only the tail of an oversized block can survive in the ring.
        let tail = &block[block.len().saturating_sub(self.fft_size)..];
        for &sample in tail {
            let pos = state.write_pos;
            state.ring[pos] = sample;
            state.write_pos = (pos + 1) % self.fft_size;
        }

        let block_rms = rms(&block);
        state.smoothed_rms = smooth(
            block_rms,
            state.smoothed_rms,
            self.smoothing_time_constant,
        );
    }

    /// Copy of the buffered samples, oldest first
    pub fn time_domain_data(&self) -> Vec<f32> {
        let Ok(state) = self.state.lock() else {
            return vec![0.0; self.fft_size];
        };
        let mut out = Vec::with_capacity(self.fft_size);
        out.extend_from_slice(&state.ring[state.write_pos..]);
        out.extend_from_slice(&state.ring[..state.write_pos]);
        out
    }

    /// RMS level of the current buffer in dBFS, never above 0
    pub fn rms_db(&self) -> f32 {
        level_db(rms(&self.time_domain_data()))
    }

    /// Block RMS level smoothed across blocks with the smoothing time constant, in dBFS
    pub fn smoothed_db(&self) -> f32 {
        match self.state.lock() {
            Ok(state) => level_db(state.smoothed_rms),
            Err(_) => f32::NEG_INFINITY,
        }
    }
}

/// Full scale caps the level; anything unmeasurable reads as silence.
fn level_db(rms: f32) -> f32 {
    let db = amplitude_to_db(rms);
    if db.is_nan() { f32::NEG_INFINITY } else { db.min(0.0) }
}

impl Default for Analyser {
    fn default() -> Self {
        Self::new(FFT_SIZE, SMOOTHING_TIME_CONSTANT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_analyser_is_silent() {
        let analyser = Analyser::default();
        assert_eq!(analyser.fft_size(), 2048);
        assert_eq!(analyser.time_domain_data().len(), 2048);
        assert_eq!(analyser.rms_db(), f32::NEG_INFINITY);
        assert_eq!(analyser.smoothed_db(), f32::NEG_INFINITY);
    }

    #[test]
    fn test_ring_keeps_latest_samples_in_order() {
        let analyser = Analyser::new(4, 0.8);
        analyser.push(&[1.0, 2.0, 3.0]);
        analyser.push(&[4.0, 5.0]);
        assert_eq!(analyser.time_domain_data(), vec![2.0, 3.0, 4.0, 5.0]);

        analyser.push(&[6.0, 7.0, 8.0, 9.0, 10.0, 11.0]);
        assert_eq!(analyser.time_domain_data(), vec![8.0, 9.0, 10.0, 11.0]);
    }

    #[test]
    fn test_full_scale_buffer_reads_zero_db() {
        let analyser = Analyser::new(8, 0.8);
        analyser.push(&[1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0]);
        assert!(analyser.rms_db().abs() < 1e-4);
    }

    #[test]
    fn test_over_full_scale_input_caps_at_zero_db() {
        let analyser = Analyser::new(2048, 0.8);
        analyser.push(&[2.0; 2048]);
        assert_eq!(analyser.rms_db(), 0.0);
        assert!(analyser.smoothed_db() <= 0.0);
    }

    #[test]
    fn test_non_finite_samples_read_as_silence() {
        let analyser = Analyser::new(2048, 0.8);
        let mut block = vec![0.1; 2048];
        block[100] = f32::NAN;
        block[200] = f32::INFINITY;
        analyser.push(&block);

        let data = analyser.time_domain_data();
        assert!(data.iter().all(|s| s.is_finite()));
        assert_eq!(data[100], 0.0);

        let db = analyser.rms_db();
        assert!(!db.is_nan());
        assert!((db - amplitude_to_db(0.1)).abs() < 0.1, "level {}", db);
        assert!(!analyser.smoothed_db().is_nan());
    }

    #[test]
    fn test_smoothed_level_lags_behind_jumps() {
        let analyser = Analyser::new(8, 0.8);
        analyser.push(&[0.5; 8]);
        // 0.2 * 0.5 after the first block
        assert!((analyser.smoothed_db() - amplitude_to_db(0.1)).abs() < 1e-3);
        for _ in 0..100 {
            analyser.push(&[0.5; 8]);
        }
        assert!((analyser.smoothed_db() - amplitude_to_db(0.5)).abs() < 1e-3);
    }
}
