//! Control context: owns the capture session and drives the sampling loop

use crate::constants::settings::DEFAULT_DOMAIN;
use crate::constants::timing::DEFAULT_TICK_INTERVAL_MS;
use crate::domain::resolve_domain;
use crate::messages::{Ack, Message, MessageReceiver, MessageSender};
use crate::policy::{GainTarget, compute_target_gain};
use crate::sampler::{CaptureBackend, LoudnessSampler};
use crate::settings::{Configuration, SettingsStore};
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Source of the URL whose settings apply right now
pub trait ActiveTab {
    fn active_url(&self) -> Option<String>;
}

/// A tab that always shows the same URL
#[derive(Debug, Clone, Default)]
pub struct FixedTab(pub Option<String>);

impl ActiveTab for FixedTab {
    fn active_url(&self) -> Option<String> {
        self.0.clone()
    }
}

/// What one tick of the loop did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Sampling is off
    Inactive,
    /// No page to adjust
    NoTab,
    /// The active domain has adaptive volume off; unity was sent
    Reset,
    /// No signal from the microphone; nothing sent
    Silent,
    /// A boosted gain was sent
    Dispatched(GainTarget),
}

/// The privileged side of the loop: sample → policy → `SET_VOLUME`
pub struct ControlContext<C: CaptureBackend, S: SettingsStore, T: ActiveTab> {
    sampler: LoudnessSampler<C>,
    store: S,
    tab: T,
    page: MessageSender,
    inbox: MessageReceiver,
    tick_interval: Duration,
    enabled: bool,
    current: Option<(String, Configuration)>,
}

impl<C: CaptureBackend, S: SettingsStore, T: ActiveTab> ControlContext<C, S, T> {
    pub fn new(capture: C, store: S, tab: T, page: MessageSender, inbox: MessageReceiver) -> Self {
        Self {
            sampler: LoudnessSampler::new(capture),
            store,
            tab,
            page,
            inbox,
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            enabled: false,
            current: None,
        }
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn sampler(&self) -> &LoudnessSampler<C> {
        &self.sampler
    }

    /// Settings cached by the last tick, with their domain
    pub fn current_settings(&self) -> Option<(&str, &Configuration)> {
        self.current.as_ref().map(|(domain, config)| (domain.as_str(), config))
    }

    /// Begin sampling. `false` when the microphone could not be opened.
    pub fn start(&mut self) -> bool {
        if self.sampler.start() {
            self.enabled = true;
            tracing::info!("Adaptive volume started");
            true
        } else {
            tracing::error!("Failed to start audio capture. Microphone access might be denied.");
            false
        }
    }

    /// Stop sampling and put the page back to unity gain
    pub async fn stop(&mut self) {
        self.sampler.stop();
        self.enabled = false;
        tracing::info!("Adaptive volume stopped");
        self.dispatch(GainTarget::UNITY).await;
    }

    /// Sample the room and send the resulting gain to the page
    pub async fn tick(&mut self) -> TickOutcome {
        if !self.enabled {
            return TickOutcome::Inactive;
        }
        let Some(url) = self.tab.active_url() else {
            return TickOutcome::NoTab;
        };

        let domain = resolve_domain(&url);
        let config = self.store.get_settings(&domain);
        self.current = Some((domain, config));

        if !config.enabled {
            self.dispatch(GainTarget::UNITY).await;
            return TickOutcome::Reset;
        }

        let ambient_db = self.sampler.sample();
        let Some(target) = compute_target_gain(ambient_db, &config) else {
            tracing::debug!("No ambient signal, leaving gain unchanged");
            return TickOutcome::Silent;
        };

        tracing::info!(
            "Ambient: {:.2}dB -> Target volume: {:.2}x",
            ambient_db,
            target.value()
        );
        self.dispatch(target).await;
        TickOutcome::Dispatched(target)
    }

    /// React to a message addressed to the control context
    pub async fn handle_message(&mut self, message: &Message) -> Ack {
        match message {
            Message::ToggleExtension { is_enabled: true } => Ack {
                success: self.start(),
            },
            Message::ToggleExtension { is_enabled: false } => {
                self.stop().await;
                Ack::OK
            }
            Message::SettingsChanged { domain } => {
                self.refresh_settings(domain).await;
                Ack::OK
            }
            Message::SetVolume { .. } => Ack::REJECTED,
        }
    }

    async fn refresh_settings(&mut self, domain: &str) {
        let Some((current_domain, _)) = &self.current else {
            return;
        };
        if current_domain != domain {
            return;
        }

        let config = self.store.get_settings(domain);
        tracing::debug!(domain, ?config, "Reloaded settings");
        self.current = Some((domain.to_string(), config));
        if self.enabled && !config.enabled {
            self.dispatch(GainTarget::UNITY).await;
        }
    }

    async fn dispatch(&self, target: GainTarget) {
        let message = Message::SetVolume {
            volume: target.value(),
        };
        match self.page.send(message).await {
            Ok(ack) if !ack.success => {
                tracing::warn!(volume = target.value(), "Page rejected volume")
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Could not reach page: {}", e),
        }
    }

    /// Run until every sender of the control inbox is gone
    pub async fn run(mut self) -> Self {
        if self.store.get_settings(DEFAULT_DOMAIN).enabled {
            self.start();
        }

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            // A tick runs to completion inside its arm, so ticks never
            // overlap and a toggle waits for the in-flight dispatch.
            tokio::select! {
                biased;
                incoming = self.inbox.recv() => {
                    let Some(incoming) = incoming else { break };
                    let (message, responder) = incoming.into_parts();
                    let ack = self.handle_message(&message).await;
                    responder.respond(ack);
                }
                _ = ticker.tick(), if self.enabled => {
                    self.tick().await;
                }
            }
        }

        if self.enabled {
            self.stop().await;
        }
        self
    }
}
