//! Page context: owns the document and the gain actuator

use crate::actuator::{GainActuator, PlaybackBackend};
use crate::constants::timing::ENDED_SWEEP_INTERVAL_MS;
use crate::dom::{Document, DocumentEdit, MutationReceiver};
use crate::messages::{Ack, Message, MessageReceiver};
use crate::policy::GainTarget;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

/// Sending half for page edits
pub type EditSender = mpsc::UnboundedSender<DocumentEdit>;

/// The page-embedded side of the loop. Receives `SET_VOLUME` and keeps the
/// actuator in sync with the document.
pub struct PageContext<B: PlaybackBackend> {
    actuator: GainActuator<B>,
    document: Document,
    mutations: MutationReceiver,
    inbox: MessageReceiver,
    edits: mpsc::UnboundedReceiver<DocumentEdit>,
    edit_tx: EditSender,
    sweep_interval: Duration,
}

impl<B: PlaybackBackend> PageContext<B> {
    pub fn new(backend: B, mut document: Document, inbox: MessageReceiver) -> Self {
        let mutations = document.observe();
        let (edit_tx, edits) = mpsc::unbounded_channel();
        Self {
            actuator: GainActuator::new(backend),
            document,
            mutations,
            inbox,
            edits,
            edit_tx,
            sweep_interval: Duration::from_millis(ENDED_SWEEP_INTERVAL_MS),
        }
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Channel for changing the document while the context runs
    pub fn edit_sender(&self) -> EditSender {
        self.edit_tx.clone()
    }

    pub fn actuator(&self) -> &GainActuator<B> {
        &self.actuator
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// React to one message from the control context
    pub fn handle_message(&mut self, message: &Message) -> Ack {
        match message {
            Message::SetVolume { volume } => match GainTarget::new(*volume) {
                Some(target) => {
                    // Media added since the last drain should get this gain too.
                    self.sync_mutations();
                    tracing::info!("Setting volume to {:.2}", target.value());
                    self.actuator.apply_gain(target);
                    Ack::OK
                }
                None => {
                    tracing::warn!(volume, "Rejected invalid volume");
                    Ack::REJECTED
                }
            },
            other => {
                tracing::debug!(message = ?other, "Page context ignores message");
                Ack::REJECTED
            }
        }
    }

    /// Feed every pending document mutation to the actuator
    pub fn sync_mutations(&mut self) {
        while let Ok(mutation) = self.mutations.try_recv() {
            self.actuator.handle_mutation(&mutation);
        }
    }

    /// Remove media that finished playing; their removal releases the streams
    pub fn sweep_ended(&mut self) {
        for id in self.actuator.ended() {
            tracing::debug!(element = id.0, "Media ended");
            self.document.remove(id);
        }
        self.sync_mutations();
    }

    /// Serve until the control context goes away, then hand the context back
    pub async fn run(mut self) -> Self {
        self.actuator.discover(&self.document);

        let mut sweep = tokio::time::interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            // Document changes go first so a gain update reaches media
            // that was already on the page when it was sent.
            tokio::select! {
                biased;
                Some(edit) = self.edits.recv() => {
                    self.document.apply(edit);
                }
                Some(mutation) = self.mutations.recv() => {
                    self.actuator.handle_mutation(&mutation);
                }
                incoming = self.inbox.recv() => {
                    let Some(incoming) = incoming else { break };
                    let (message, responder) = incoming.into_parts();
                    let ack = self.handle_message(&message);
                    responder.respond(ack);
                }
                _ = sweep.tick() => {
                    self.sweep_ended();
                }
            }
        }

        tracing::info!(streams = self.actuator.len(), "Page context stopped");
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::testing::FakePlayback;
    use crate::dom::{ElementId, MediaKind, Node};
    use crate::messages;

    fn page(document: Document) -> (PageContext<FakePlayback>, FakePlayback) {
        let playback = FakePlayback::default();
        let (_tx, rx) = messages::channel(4);
        (PageContext::new(playback.clone(), document, rx), playback)
    }

    #[test]
    fn test_set_volume_applies_to_new_media() {
        let (mut page, playback) = page(Document::new(Vec::new()));
        page.document_mut()
            .insert(Node::media(1, MediaKind::Video, None));

        let ack = page.handle_message(&Message::SetVolume { volume: 2.0 });
        assert_eq!(ack, Ack::OK);
        assert_eq!(playback.param(ElementId(1)).target(), 2.0);
    }

    #[test]
    fn test_invalid_volume_is_rejected() {
        let (mut page, _) = page(Document::new(vec![Node::media(1, MediaKind::Audio, None)]));
        assert_eq!(
            page.handle_message(&Message::SetVolume { volume: f32::NAN }),
            Ack::REJECTED
        );
        assert_eq!(
            page.handle_message(&Message::ToggleExtension { is_enabled: true }),
            Ack::REJECTED
        );
    }

    #[test]
    fn test_sweep_removes_ended_media() {
        let (mut page, playback) = page(Document::new(vec![
            Node::media(1, MediaKind::Audio, None),
            Node::media(2, MediaKind::Audio, None),
        ]));
        page.actuator.discover(&page.document);
        playback.ended.lock().unwrap().insert(ElementId(1));

        page.sweep_ended();
        assert!(!page.actuator().is_tracked(ElementId(1)));
        assert!(page.actuator().is_tracked(ElementId(2)));
        assert_eq!(page.document().query_media().len(), 1);
        assert_eq!(playback.closed(), vec![ElementId(1)]);
    }

    #[tokio::test]
    async fn test_run_serves_until_control_disconnects() {
        let playback = FakePlayback::default();
        let (tx, rx) = messages::channel(4);
        let document = Document::new(vec![Node::media(1, MediaKind::Audio, None)]);
        let page = PageContext::new(playback.clone(), document, rx);
        let edits = page.edit_sender();
        let handle = tokio::spawn(page.run());

        edits
            .send(DocumentEdit::Insert(Node::container(
                5,
                vec![Node::media(6, MediaKind::Video, None)],
            )))
            .unwrap();
        assert_eq!(tx.send(Message::SetVolume { volume: 1.6 }).await.unwrap(), Ack::OK);

        drop(tx);
        let page = handle.await.unwrap();
        assert_eq!(page.actuator().len(), 2);
        assert_eq!(page.actuator().last_target().value(), 1.6);
        assert_eq!(playback.param(ElementId(1)).target(), 1.6);
    }
}
