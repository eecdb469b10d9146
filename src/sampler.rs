//! Ambient loudness sampling from a live capture device

use crate::analyser::Analyser;
use crate::error::AppResult;

/// Ambient loudness in dBFS, `f32::NEG_INFINITY` when there is no signal
pub type LoudnessSample = f32;

/// Processing requested from the capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
        }
    }
}

/// An open capture session. Dropping it releases the device.
pub trait CaptureSession {
    /// Human readable name of the device being captured
    fn device_name(&self) -> &str;
}

/// Something that can open a capture device and feed it into an analyser
pub trait CaptureBackend {
    fn open(
        &mut self,
        constraints: CaptureConstraints,
        analyser: Analyser,
    ) -> AppResult<Box<dyn CaptureSession>>;
}

struct ActiveCapture {
    session: Box<dyn CaptureSession>,
    analyser: Analyser,
}

/// Owns at most one capture session and reads loudness from it on demand
pub struct LoudnessSampler<B: CaptureBackend> {
    backend: B,
    active: Option<ActiveCapture>,
}

impl<B: CaptureBackend> LoudnessSampler<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            active: None,
        }
    }

    /// Open the capture device. Returns `true` when a session is running,
    /// including when one was already running.
    pub fn start(&mut self) -> bool {
        if self.active.is_some() {
            return true;
        }

        let analyser = Analyser::default();
        match self
            .backend
            .open(CaptureConstraints::default(), analyser.clone())
        {
            Ok(session) => {
                tracing::info!(device = session.device_name(), "Loudness sampler started");
                self.active = Some(ActiveCapture { session, analyser });
                true
            }
            Err(e) => {
                tracing::error!("Loudness sampler failed to start: {}", e);
                false
            }
        }
    }

    /// Release the capture device. Safe to call when not started.
    pub fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            tracing::info!(device = active.session.device_name(), "Loudness sampler stopped");
        }
    }

    pub fn is_started(&self) -> bool {
        self.active.is_some()
    }

    /// RMS loudness of the latest analysis window in dBFS
    pub fn sample(&self) -> LoudnessSample {
        match &self.active {
            Some(active) => active.analyser.rms_db(),
            None => f32::NEG_INFINITY,
        }
    }

    /// Smoothed block loudness in dBFS, steadier than [`Self::sample`]
    pub fn smoothed(&self) -> LoudnessSample {
        match &self.active {
            Some(active) => active.analyser.smoothed_db(),
            None => f32::NEG_INFINITY,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeCapture;
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_sample_without_session_is_silence() {
        let sampler = LoudnessSampler::new(FakeCapture::default());
        assert!(!sampler.is_started());
        assert_eq!(sampler.sample(), f32::NEG_INFINITY);
    }

    #[test]
    fn test_all_zero_buffer_is_negative_infinity() {
        let mut sampler = LoudnessSampler::new(FakeCapture::with_block(vec![0.0; 2048]));
        assert!(sampler.start());
        let db = sampler.sample();
        assert_eq!(db, f32::NEG_INFINITY);
        assert!(!db.is_nan());
    }

    #[test]
    fn test_sample_reports_rms_in_dbfs() {
        let mut sampler = LoudnessSampler::new(FakeCapture::with_block(vec![0.1; 2048]));
        assert!(sampler.start());
        assert!((sampler.sample() + 20.0).abs() < 1e-3);

        // Half the window at full scale: rms = sqrt(0.5)
        let mut block = vec![0.0; 1024];
        block.extend(std::iter::repeat_n(1.0, 1024));
        let mut sampler = LoudnessSampler::new(FakeCapture::with_block(block));
        assert!(sampler.start());
        assert!((sampler.sample() + 3.0103).abs() < 1e-3);
    }

    #[test]
    fn test_sample_is_bounded_and_never_nan() {
        let mut sampler = LoudnessSampler::new(FakeCapture::with_block(vec![2.0; 2048]));
        assert!(sampler.start());
        assert_eq!(sampler.sample(), 0.0);

        let mut block = vec![0.1; 2048];
        block[0] = f32::NAN;
        let mut sampler = LoudnessSampler::new(FakeCapture::with_block(block));
        assert!(sampler.start());
        let db = sampler.sample();
        assert!(!db.is_nan());
        assert!(db < 0.0 && db > -21.0, "level {}", db);
    }

    #[test]
    fn test_start_is_idempotent_and_requests_processing() {
        let capture = FakeCapture::with_block(vec![0.2; 64]);
        let mut sampler = LoudnessSampler::new(capture.clone());
        assert!(sampler.start());
        assert!(sampler.start());
        assert_eq!(capture.opens.load(Ordering::SeqCst), 1);

        let constraints = capture.last_constraints.lock().unwrap().unwrap();
        assert!(constraints.echo_cancellation);
        assert!(constraints.noise_suppression);
    }

    #[test]
    fn test_stop_releases_device_and_is_idempotent() {
        let capture = FakeCapture::with_block(vec![0.2; 64]);
        let mut sampler = LoudnessSampler::new(capture.clone());
        sampler.stop();
        assert_eq!(capture.closes.load(Ordering::SeqCst), 0);

        assert!(sampler.start());
        sampler.stop();
        sampler.stop();
        assert_eq!(capture.closes.load(Ordering::SeqCst), 1);
        assert!(!sampler.is_started());
        assert_eq!(sampler.sample(), f32::NEG_INFINITY);
    }

    #[test]
    fn test_denied_device_reports_failure() {
        let mut sampler = LoudnessSampler::new(FakeCapture::denied());
        assert!(!sampler.start());
        assert!(!sampler.is_started());
        assert_eq!(sampler.sample(), f32::NEG_INFINITY);
    }
}
