//! Capture device handling and stream processing

use crate::analyser::Analyser;
use crate::error::{AppError, AppResult};
use crate::sampler::{CaptureBackend, CaptureConstraints, CaptureSession};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

/// Audio configuration and device information
pub struct AudioConfig {
    pub device_name: String,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Names of every input device the default host exposes
pub fn input_device_names() -> AppResult<Vec<String>> {
    let host = cpal::default_host();
    Ok(host.input_devices()?.filter_map(|d| d.name().ok()).collect())
}

/// Find and configure an audio input device
pub fn setup_audio_device(device_name: Option<&str>) -> AppResult<(cpal::Device, AudioConfig)> {
    let host = cpal::default_host();

    let device = if let Some(name) = device_name {
        host.input_devices()?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| AppError::AudioDevice(format!("Input device '{}' not found", name)))?
    } else {
        host.default_input_device()
            .ok_or_else(|| AppError::AudioDevice("No default input device available".to_string()))?
    };

    let device_name = device.name()?;

    let config_range = device
        .supported_input_configs()?
        .find(|c| c.sample_format() == cpal::SampleFormat::F32)
        .ok_or_else(|| AppError::AudioDevice("No f32 input config supported".to_string()))?;

    let preferred = crate::constants::audio::PREFERRED_SAMPLE_RATE;
    let sample_rate = if config_range.min_sample_rate().0 <= preferred
        && config_range.max_sample_rate().0 >= preferred
    {
        preferred
    } else {
        config_range.min_sample_rate().0
    };

    let audio_config = AudioConfig {
        device_name,
        sample_rate,
        channels: config_range.channels().max(1),
    };

    Ok((device, audio_config))
}

/// Build an audio input stream with the given callback
pub fn build_audio_stream<F>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    data_callback: F,
) -> AppResult<cpal::Stream>
where
    F: FnMut(&[f32], &cpal::InputCallbackInfo) + Send + 'static,
{
    let stream = device.build_input_stream(
        config,
        data_callback,
        |err| tracing::error!("Capture stream error: {}", err),
        None,
    )?;

    Ok(stream)
}

/// Capture callback that downmixes interleaved frames to mono and feeds the analyser
pub fn create_audio_callback(
    analyser: Analyser,
    channels: u16,
) -> impl FnMut(&[f32], &cpal::InputCallbackInfo) + Send + 'static {
    let channels = channels.max(1) as usize;
    let mut mono = Vec::new();
    move |data: &[f32], _: &cpal::InputCallbackInfo| {
        mono.clear();
        mono.extend(
            data.chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32),
        );
        analyser.push(&mono);
    }
}

/// Capture backend on top of the default cpal host
#[derive(Debug, Clone, Default)]
pub struct CpalCapture {
    device_name: Option<String>,
}

impl CpalCapture {
    pub fn new(device_name: Option<String>) -> Self {
        Self { device_name }
    }
}

struct CpalSession {
    device_name: String,
    _stream: cpal::Stream,
}

impl CaptureSession for CpalSession {
    fn device_name(&self) -> &str {
        &self.device_name
    }
}

impl CaptureBackend for CpalCapture {
    fn open(
        &mut self,
        constraints: CaptureConstraints,
        analyser: Analyser,
    ) -> AppResult<Box<dyn CaptureSession>> {
        let (device, audio_config) = setup_audio_device(self.device_name.as_deref())?;

        // cpal hands us the raw device signal; echo cancellation and noise
        // suppression only happen where the OS input path provides them.
        tracing::debug!(
            echo_cancellation = constraints.echo_cancellation,
            noise_suppression = constraints.noise_suppression,
            "Requested capture processing is left to the host input path"
        );

        let config = cpal::StreamConfig {
            channels: audio_config.channels,
            sample_rate: cpal::SampleRate(audio_config.sample_rate),
            buffer_size: crate::constants::audio::BUFFER_SIZE,
        };

        let callback = create_audio_callback(analyser, audio_config.channels);
        let stream = build_audio_stream(&device, &config, callback)?;
        stream.play()?;

        tracing::debug!(
            device = %audio_config.device_name,
            sample_rate = audio_config.sample_rate,
            channels = audio_config.channels,
            "Capture stream running"
        );

        Ok(Box::new(CpalSession {
            device_name: audio_config.device_name,
            _stream: stream,
        }))
    }
}
