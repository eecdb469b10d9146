//! Adaptive media volume driven by ambient loudness.
//!
//! A control context samples the microphone, maps loudness to a gain target
//! and sends it to a page context, which smooths that gain onto every media
//! stream it tracks.

pub mod actuator;
pub mod analyser;
pub mod app;
pub mod audio;
pub mod config;
pub mod constants;
pub mod control;
pub mod dom;
pub mod domain;
pub mod error;
pub mod gain;
pub mod logging;
pub mod messages;
pub mod page;
pub mod playback;
pub mod policy;
pub mod sampler;
pub mod settings;
pub mod smoothing;
