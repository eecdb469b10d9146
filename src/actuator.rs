//! Registry of live media streams and smoothed gain application

use crate::constants::smoothing::GAIN_TIME_CONSTANT;
use crate::dom::{Document, ElementId, MediaElement, Mutation};
use crate::error::AppResult;
use crate::gain::GainParam;
use crate::policy::GainTarget;
use std::collections::HashMap;

/// An element's signal path: source → gain stage → output
pub trait PlaybackGraph {
    /// Stop the source and release the graph's audio resources
    fn close(&mut self);

    /// Whether the source has played to its end
    fn has_ended(&self) -> bool {
        false
    }
}

/// Builds playback graphs for media elements
pub trait PlaybackBackend {
    type Graph: PlaybackGraph;

    /// Wire `element` through a gain stage driven by `gain`
    fn connect(&mut self, element: &MediaElement, gain: GainParam) -> AppResult<Self::Graph>;
}

/// One media element wired into the gain-control graph.
/// Dropping it closes the graph.
pub struct TrackedStream<G: PlaybackGraph> {
    element: MediaElement,
    gain: GainParam,
    graph: G,
}

impl<G: PlaybackGraph> TrackedStream<G> {
    pub fn element(&self) -> &MediaElement {
        &self.element
    }

    /// Gain currently reaching the output
    pub fn current_gain(&self) -> f32 {
        self.gain.value()
    }

    /// Gain the stream is moving toward
    pub fn target_gain(&self) -> f32 {
        self.gain.target()
    }
}

impl<G: PlaybackGraph> Drop for TrackedStream<G> {
    fn drop(&mut self) {
        self.graph.close();
    }
}

/// Applies gain targets to every tracked media stream
pub struct GainActuator<B: PlaybackBackend> {
    backend: B,
    streams: HashMap<ElementId, TrackedStream<B::Graph>>,
    time_constant: f32,
    last_target: GainTarget,
}

impl<B: PlaybackBackend> GainActuator<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            streams: HashMap::new(),
            time_constant: GAIN_TIME_CONSTANT,
            last_target: GainTarget::UNITY,
        }
    }

    /// Track `element`. Returns `false` when it already was tracked or its
    /// graph could not be built.
    pub fn attach(&mut self, element: &MediaElement) -> bool {
        if self.streams.contains_key(&element.id) {
            return false;
        }

        let gain = GainParam::default();
        let graph = match self.backend.connect(element, gain.clone()) {
            Ok(graph) => graph,
            Err(e) => {
                tracing::error!(element = element.id.0, "Error setting up media element: {}", e);
                return false;
            }
        };

        // Late arrivals glide to the gain everyone else already has.
        gain.set_target_at_time(self.last_target.value(), self.time_constant);

        tracing::debug!(element = element.id.0, kind = ?element.kind, "Attached gain stage");
        self.streams.insert(
            element.id,
            TrackedStream {
                element: element.clone(),
                gain,
                graph,
            },
        );
        true
    }

    /// Stop tracking `id` and close its graph
    pub fn detach(&mut self, id: ElementId) -> bool {
        match self.streams.remove(&id) {
            Some(stream) => {
                tracing::debug!(element = id.0, "Released media element");
                drop(stream);
                true
            }
            None => false,
        }
    }

    /// Attach every media element already in `document`
    pub fn discover(&mut self, document: &Document) -> usize {
        let attached = document
            .query_media()
            .into_iter()
            .filter(|element| self.attach(element))
            .count();
        tracing::info!(attached, "Initial media scan complete");
        attached
    }

    /// Follow one batch of document changes. Removals are handled before
    /// additions so content swapped in a single batch ends up tracked once.
    pub fn handle_mutation(&mut self, mutation: &Mutation) {
        for node in &mutation.removed {
            for element in node.media_elements() {
                self.detach(element.id);
            }
        }
        for node in &mutation.added {
            for element in node.media_elements() {
                self.attach(element);
            }
        }
    }

    /// Move every stream toward `target` with the smoothing time constant
    pub fn apply_gain(&mut self, target: GainTarget) {
        self.last_target = target;
        for stream in self.streams.values() {
            stream
                .gain
                .set_target_at_time(target.value(), self.time_constant);
        }
        tracing::debug!(target = target.value(), streams = self.streams.len(), "Applied gain");
    }

    /// Ids of streams whose source has finished
    pub fn ended(&self) -> Vec<ElementId> {
        self.streams
            .iter()
            .filter(|(_, stream)| stream.graph.has_ended())
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn get(&self, id: ElementId) -> Option<&TrackedStream<B::Graph>> {
        self.streams.get(&id)
    }

    pub fn is_tracked(&self, id: ElementId) -> bool {
        self.streams.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn last_target(&self) -> GainTarget {
        self.last_target
    }
}
