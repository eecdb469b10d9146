//! Smoothed gain parameter and the audio-rate stage that applies it

use crate::constants::policy::UNITY_GAIN;
use crate::constants::smoothing::GAIN_TIME_CONSTANT;
use crate::smoothing::one_pole_coefficient;
use rodio::Source;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

#[derive(Debug)]
struct GainState {
    target: AtomicU32,
    time_constant: AtomicU32,
    value: AtomicU32,
}

fn load(cell: &AtomicU32) -> f32 {
    f32::from_bits(cell.load(Ordering::Relaxed))
}

fn store(cell: &AtomicU32, value: f32) {
    cell.store(value.to_bits(), Ordering::Relaxed);
}

/// Gain shared between the actuator (writes targets) and a [`GainStage`]
/// on the audio thread (moves the live value toward the target).
#[derive(Debug, Clone)]
pub struct GainParam {
    state: Arc<GainState>,
}

impl GainParam {
    pub fn new(initial: f32) -> Self {
        Self {
            state: Arc::new(GainState {
                target: AtomicU32::new(initial.to_bits()),
                time_constant: AtomicU32::new(GAIN_TIME_CONSTANT.to_bits()),
                value: AtomicU32::new(initial.to_bits()),
            }),
        }
    }

    /// Approach `target` exponentially from the current value with the given
    /// time constant in seconds
    pub fn set_target_at_time(&self, target: f32, time_constant: f32) {
        store(&self.state.time_constant, time_constant.max(0.0));
        store(&self.state.target, target);
    }

    pub fn target(&self) -> f32 {
        load(&self.state.target)
    }

    pub fn time_constant(&self) -> f32 {
        load(&self.state.time_constant)
    }

    /// Gain currently being applied to the audio
    pub fn value(&self) -> f32 {
        load(&self.state.value)
    }

    fn publish(&self, value: f32) {
        store(&self.state.value, value);
    }
}

impl Default for GainParam {
    fn default() -> Self {
        Self::new(UNITY_GAIN)
    }
}

/// Source wrapper that multiplies every frame by a smoothed [`GainParam`].
///
/// The gain moves once per frame, so all channels of a frame share one value.
pub struct GainStage<S> {
    inner: S,
    param: GainParam,
    current: f32,
    channel: u16,
    coeff: f32,
    coeff_for: f32,
}

impl<S> GainStage<S>
where
    S: Source<Item = f32>,
{
    pub fn new(inner: S, param: GainParam) -> Self {
        let current = param.value();
        Self {
            inner,
            param,
            current,
            channel: 0,
            coeff: 1.0,
            coeff_for: f32::NAN,
        }
    }

    pub fn param(&self) -> &GainParam {
        &self.param
    }

    fn step_gain(&mut self) {
        let time_constant = self.param.time_constant();
        if time_constant != self.coeff_for {
            self.coeff = one_pole_coefficient(time_constant, self.inner.sample_rate() as f32);
            self.coeff_for = time_constant;
        }
        let target = self.param.target();
        self.current += self.coeff * (target - self.current);
        self.param.publish(self.current);
    }
}

impl<S> Iterator for GainStage<S>
where
    S: Source<Item = f32>,
{
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        let sample = self.inner.next()?;
        if self.channel == 0 {
            self.step_gain();
        }
        self.channel = (self.channel + 1) % self.inner.channels().max(1);
        Some(sample * self.current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<S> Source for GainStage<S>
where
    S: Source<Item = f32>,
{
    fn current_frame_len(&self) -> Option<usize> {
        self.inner.current_frame_len()
    }

    fn channels(&self) -> u16 {
        self.inner.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use rodio::Source;
    use std::time::Duration;

    /// Endless constant signal
    pub struct ConstantSource {
        pub value: f32,
        pub sample_rate: u32,
        pub channels: u16,
    }

    impl ConstantSource {
        pub fn new(value: f32, sample_rate: u32, channels: u16) -> Self {
            Self {
                value,
                sample_rate,
                channels,
            }
        }
    }

    impl Iterator for ConstantSource {
        type Item = f32;

        fn next(&mut self) -> Option<f32> {
            Some(self.value)
        }
    }

    impl Source for ConstantSource {
        fn current_frame_len(&self) -> Option<usize> {
            None
        }

        fn channels(&self) -> u16 {
            self.channels
        }

        fn sample_rate(&self) -> u32 {
            self.sample_rate
        }

        fn total_duration(&self) -> Option<Duration> {
            None
        }
    }
}
