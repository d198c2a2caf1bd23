//! The player actor.
//!
//! A single tokio task owns the [`Coordinator`] and is the only writer of
//! playback state. IPC handlers talk to it through a cloneable
//! [`PlayerHandle`]; adapters and timers talk to it through the event
//! channel.

use anyhow::Result;
use common::{EffectsPatch, MediaSource, PlaybackState};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::adapter::SessionEvent;
use super::coordinator::{Coordinator, CoordinatorSettings};
use super::engine::EngineFactory;

/// Requests accepted by the player actor.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    Load { source: MediaSource, autoplay: bool },
    Play,
    Pause,
    TogglePlayPause,
    Seek(f64),
    Skip(f64),
    SetVolume(f32),
    SetEffects(EffectsPatch),
    ResetEffects,
    Close,
    /// Release the backend and stop the actor
    Shutdown,
}

/// Cloneable front door to the player actor.
#[derive(Clone)]
pub struct PlayerHandle {
    commands: mpsc::UnboundedSender<PlayerCommand>,
    state: watch::Receiver<PlaybackState>,
}

impl PlayerHandle {
    /// Queue a command. Returns once queued, not once applied.
    pub fn send(&self, command: PlayerCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| anyhow::anyhow!("player task has stopped"))
    }

    /// Latest published state.
    pub fn state(&self) -> PlaybackState {
        self.state.borrow().clone()
    }

    /// A fresh subscription to state changes.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state.clone()
    }
}

/// Start the player actor on the current tokio runtime.
pub fn spawn(
    factory: Box<dyn EngineFactory>,
    settings: CoordinatorSettings,
) -> (PlayerHandle, JoinHandle<()>) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    let coordinator = Coordinator::new(factory, settings, event_tx);
    let handle = PlayerHandle {
        commands: command_tx,
        state: coordinator.subscribe(),
    };

    let task = tokio::spawn(run(coordinator, command_rx, event_rx));
    (handle, task)
}

async fn run(
    mut coordinator: Coordinator,
    mut commands: mpsc::UnboundedReceiver<PlayerCommand>,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
) {
    log::debug!("Player task started");

    loop {
        tokio::select! {
            command = commands.recv() => {
                match command {
                    Some(PlayerCommand::Shutdown) | None => break,
                    Some(command) => dispatch(&mut coordinator, command),
                }
            }
            Some(event) = events.recv() => {
                coordinator.handle_event(event);
            }
        }
    }

    coordinator.shutdown();
    log::debug!("Player task stopped");
}

fn dispatch(coordinator: &mut Coordinator, command: PlayerCommand) {
    log::debug!(
        "Player command: {:?} (session {})",
        command,
        coordinator.session()
    );

    match command {
        PlayerCommand::Load { source, autoplay } => {
            coordinator.load(source);
            if autoplay {
                coordinator.play();
            }
        }
        PlayerCommand::Play => coordinator.play(),
        PlayerCommand::Pause => coordinator.pause(),
        PlayerCommand::TogglePlayPause => coordinator.toggle_play_pause(),
        PlayerCommand::Seek(secs) => coordinator.seek(secs),
        PlayerCommand::Skip(delta) => coordinator.skip(delta),
        PlayerCommand::SetVolume(level) => coordinator.set_volume(level),
        PlayerCommand::SetEffects(patch) => coordinator.set_effects(&patch),
        PlayerCommand::ResetEffects => coordinator.reset_effects(),
        PlayerCommand::Close => coordinator.close(),
        PlayerCommand::Shutdown => {}
    }
}
