//! Main application logic and orchestration

use crate::audio::CpalCapture;
use crate::config::{MeasureConfig, RunConfig, open_store};
use crate::constants::settings::DEFAULT_DOMAIN;
use crate::constants::timing::CHANNEL_CAPACITY;
use crate::control::{ControlContext, FixedTab};
use crate::dom::{Document, DocumentEdit, ElementId, MediaKind, Node};
use crate::domain::resolve_domain;
use crate::error::{AppError, AppResult};
use crate::messages::{self, Message, MessageSender};
use crate::page::{EditSender, PageContext};
use crate::playback::RodioPlayback;
use crate::policy::{GainTarget, compute_target_gain};
use crate::sampler::LoudnessSampler;
use crate::settings::{Configuration, SettingsStore};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::LocalSet;

/// Exit codes for the application
#[derive(Debug, Clone, Copy)]
pub enum ExitCode {
    UserExit = 1, // User pressed Ctrl+C
    Error = 2,    // Actual application error
}

/// Result type that includes user exit information
pub type AppRunResult = Result<(), AppError>;

/// Extended result that tracks exit reason
pub struct RunResult {
    pub result: AppRunResult,
    pub exit_code: ExitCode,
}

impl RunResult {
    fn error(e: AppError) -> Self {
        RunResult {
            result: Err(e),
            exit_code: ExitCode::Error,
        }
    }
}

/// Main application struct
pub struct App {
    config: RunConfig,
}

impl App {
    pub fn new_with_config(config: RunConfig) -> Self {
        App { config }
    }

    /// Run the control and page contexts until Ctrl+C.
    ///
    /// Both contexts live on one thread: the capture stream and the audio
    /// output are not `Send`.
    pub async fn run(self) -> RunResult {
        LocalSet::new().run_until(self.run_local()).await
    }

    async fn run_local(self) -> RunResult {
        let store = match open_store(self.config.settings_path.clone()) {
            Ok(store) => store,
            Err(e) => return RunResult::error(e),
        };
        tracing::info!(path = %store.path().display(), "Using settings file");

        let playback = match RodioPlayback::new() {
            Ok(playback) => playback,
            Err(e) => return RunResult::error(e),
        };

        let nodes: Vec<Node> = self
            .config
            .media
            .iter()
            .enumerate()
            .map(|(i, path)| Node::media(i as u64, MediaKind::from_path(path), Some(path.clone())))
            .collect();
        let next_id = nodes.len() as u64;

        let (page_tx, page_rx) = messages::channel(CHANNEL_CAPACITY);
        let (control_tx, control_rx) = messages::channel(CHANNEL_CAPACITY);

        let page = PageContext::new(playback, Document::new(nodes), page_rx);
        let edits = page.edit_sender();

        let control = ControlContext::new(
            CpalCapture::new(self.config.device_name.clone()),
            store,
            FixedTab(self.config.url.clone()),
            page_tx,
            control_rx,
        )
        .with_tick_interval(self.config.tick_interval);

        let page_task = tokio::task::spawn_local(page.run());
        let control_task = tokio::task::spawn_local(control.run());

        if self.config.enable_on_start {
            toggle(&control_tx, true).await;
        }

        let console = tokio::task::spawn_local(read_console(control_tx.clone(), edits, next_id));
        tracing::info!("Commands: add <file>, remove <id>, enable, disable. Ctrl+C to quit.");

        let exit_code = match tokio::signal::ctrl_c().await {
            Ok(()) => ExitCode::UserExit,
            Err(e) => {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
                ExitCode::Error
            }
        };

        // Closing the control inbox stops sampling and resets the page to
        // unity; the page stops once the control context is gone.
        console.abort();
        drop(control_tx);
        if let Err(e) = control_task.await {
            tracing::error!("Control context failed: {}", e);
        }
        match page_task.await {
            Ok(page) => drop(page),
            Err(e) => tracing::error!("Page context failed: {}", e),
        }

        RunResult {
            result: Ok(()),
            exit_code,
        }
    }
}

async fn toggle(control: &MessageSender, is_enabled: bool) {
    match control.send(Message::ToggleExtension { is_enabled }).await {
        Ok(ack) if ack.success => {}
        Ok(_) => tracing::error!("Could not start: microphone unavailable or access denied"),
        Err(e) => tracing::error!("Control context unreachable: {}", e),
    }
}

/// A line typed on the console while running
#[derive(Debug, Clone, PartialEq)]
enum ConsoleCommand {
    Add(PathBuf),
    Remove(ElementId),
    Enable,
    Disable,
}

fn parse_command(line: &str) -> Option<ConsoleCommand> {
    let line = line.trim();
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    match word {
        "add" if !rest.is_empty() => Some(ConsoleCommand::Add(PathBuf::from(rest))),
        "remove" => rest.parse().ok().map(|id| ConsoleCommand::Remove(ElementId(id))),
        "enable" => Some(ConsoleCommand::Enable),
        "disable" => Some(ConsoleCommand::Disable),
        _ => None,
    }
}

async fn read_console(control: MessageSender, edits: EditSender, mut next_id: u64) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let Some(command) = parse_command(&line) else {
            if !line.trim().is_empty() {
                tracing::warn!("Unknown command: {}", line.trim());
            }
            continue;
        };
        match command {
            ConsoleCommand::Add(path) => {
                let node = Node::media(next_id, MediaKind::from_path(&path), Some(path));
                tracing::info!(element = next_id, "Adding media");
                next_id += 1;
                if edits.send(DocumentEdit::Insert(node)).is_err() {
                    break;
                }
            }
            ConsoleCommand::Remove(id) => {
                if edits.send(DocumentEdit::Remove(id)).is_err() {
                    break;
                }
            }
            ConsoleCommand::Enable => toggle(&control, true).await,
            ConsoleCommand::Disable => toggle(&control, false).await,
        }
    }
}

/// Result of the `measure` command
#[derive(Debug, Clone)]
pub struct Measurement {
    pub domain: String,
    pub config: Configuration,
    /// Mean of the non-silent readings, in dBFS
    pub average_db: f32,
    /// Loudest reading, in dBFS
    pub max_db: f32,
    /// Smoothed level at the end of the measurement, in dBFS
    pub smoothed_db: f32,
    /// What the policy picks for the average level, `None` for silence
    pub gain: Option<GainTarget>,
}

/// Sample the room for the configured duration
pub async fn measure(config: MeasureConfig) -> AppResult<Measurement> {
    let store = open_store(config.settings_path.clone())?;
    let domain = config
        .url
        .as_deref()
        .map(resolve_domain)
        .unwrap_or_else(|| DEFAULT_DOMAIN.to_string());
    let settings = store.get_settings(&domain);

    let mut sampler = LoudnessSampler::new(CpalCapture::new(config.device_name.clone()));
    if !sampler.start() {
        return Err(AppError::AudioDevice("Could not start audio capture".to_string()));
    }

    let mut readings = Vec::new();
    let mut ticker = tokio::time::interval(Duration::from_millis(250));
    let deadline = tokio::time::Instant::now() + config.duration;
    // The first tick completes immediately; let the buffer fill first.
    ticker.tick().await;
    while tokio::time::Instant::now() < deadline {
        ticker.tick().await;
        readings.push(sampler.sample());
    }
    let smoothed_db = sampler.smoothed();
    sampler.stop();

    let (average_db, max_db) = summarize(&readings);
    Ok(Measurement {
        gain: compute_target_gain(average_db, &settings),
        domain,
        config: settings,
        average_db,
        max_db,
        smoothed_db,
    })
}

/// Mean and max of the finite readings; silence when there are none
fn summarize(readings: &[f32]) -> (f32, f32) {
    let finite: Vec<f32> = readings.iter().copied().filter(|r| r.is_finite()).collect();
    if finite.is_empty() {
        return (f32::NEG_INFINITY, f32::NEG_INFINITY);
    }
    let average = finite.iter().sum::<f32>() / finite.len() as f32;
    let max = finite.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    (average, max)
}
