//! rodio playback graphs for media files

use crate::actuator::{PlaybackBackend, PlaybackGraph};
use crate::dom::MediaElement;
use crate::error::{AppError, AppResult};
use crate::gain::{GainParam, GainStage};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::fs::File;
use std::io::BufReader;

/// Plays media files on the default output device.
/// Not `Send`: lives on the page context's thread.
pub struct RodioPlayback {
    _stream: OutputStream,
    handle: OutputStreamHandle,
}

impl RodioPlayback {
    /// Open the default audio output
    pub fn new() -> AppResult<Self> {
        let (stream, handle) = OutputStream::try_default()?;
        Ok(Self {
            _stream: stream,
            handle,
        })
    }
}

/// A file decoding into its own sink through a gain stage
pub struct SinkGraph {
    sink: Sink,
}

impl PlaybackGraph for SinkGraph {
    fn close(&mut self) {
        self.sink.stop();
    }

    fn has_ended(&self) -> bool {
        self.sink.empty()
    }
}

impl PlaybackBackend for RodioPlayback {
    type Graph = SinkGraph;

    fn connect(&mut self, element: &MediaElement, gain: GainParam) -> AppResult<SinkGraph> {
        let path = element
            .src
            .as_ref()
            .ok_or_else(|| AppError::Playback(format!("element {} has no source", element.id.0)))?;

        let file = File::open(path)
            .map_err(|e| AppError::Playback(format!("Cannot open '{}': {}", path.display(), e)))?;
        let source = Decoder::new(BufReader::new(file))?.convert_samples::<f32>();

        let sink = Sink::try_new(&self.handle)?;
        sink.append(GainStage::new(source, gain));
        sink.play();

        tracing::info!(element = element.id.0, path = %path.display(), "Playing media");
        Ok(SinkGraph { sink })
    }
}
