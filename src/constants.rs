//! Application constants and configuration values

/// Ambient loudness analysis constants
pub mod audio {
    /// Number of time-domain samples the analyser keeps
    pub const FFT_SIZE: usize = 2048;
    /// Analyser smoothing time constant (0 = no smoothing, 1 = frozen)
    pub const SMOOTHING_TIME_CONSTANT: f32 = 0.8;
    /// Buffer size for audio streams
    pub const BUFFER_SIZE: cpal::BufferSize = cpal::BufferSize::Default;
    /// Preferred capture sample rate
    pub const PREFERRED_SAMPLE_RATE: u32 = 44_100;
}

/// Loudness to gain mapping constants
pub mod policy {
    /// Ambient level at or below which no boost is applied (dBFS)
    pub const MIN_DB: f32 = -70.0;
    /// Ambient level at or above which the full boost is applied (dBFS)
    pub const MAX_DB: f32 = -20.0;
    /// Gain applied when adaptive control is off
    pub const UNITY_GAIN: f32 = 1.0;
}

/// Per-domain settings constants
pub mod settings {
    /// Sentinel domain used when no domain can be resolved
    pub const DEFAULT_DOMAIN: &str = "default";
    /// Prefix of every storage key
    pub const KEY_PREFIX: &str = "settings_";
    pub const DEFAULT_ENABLED: bool = false;
    pub const DEFAULT_SENSITIVITY: f32 = 1.5;
    pub const DEFAULT_EQUALIZATION: bool = true;
    /// Lowest sensitivity accepted
    pub const MIN_SENSITIVITY: f32 = 0.5;
    /// Highest sensitivity accepted
    pub const MAX_SENSITIVITY: f32 = 3.0;
    /// Settings file name inside the config directory
    pub const FILE_NAME: &str = "settings.json";
    /// Application directory name inside the platform config dir
    pub const APP_DIR: &str = "adaptive-volume";
}

/// Gain smoothing constants
pub mod smoothing {
    /// Time constant of the exponential approach to a new gain (seconds)
    pub const GAIN_TIME_CONSTANT: f32 = 0.05;
}

/// Control loop timing
pub mod timing {
    /// Default sampling period in milliseconds
    pub const DEFAULT_TICK_INTERVAL_MS: u64 = 6_000;
    /// Shortest sampling period accepted
    pub const MIN_TICK_INTERVAL_MS: u64 = 100;
    /// How often the page context checks for media that finished playing
    pub const ENDED_SWEEP_INTERVAL_MS: u64 = 500;
    /// Capacity of the message channel between contexts
    pub const CHANNEL_CAPACITY: usize = 32;
}
