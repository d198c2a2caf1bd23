use anyhow::Result;
use common::{Command, MediaSource, PlaybackState, PlayerError, Response};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{Mutex, watch};

use crate::DaemonState;
use crate::player::{PlayerCommand, PlayerHandle};

pub async fn start(state: Arc<Mutex<DaemonState>>, player: PlayerHandle) -> Result<()> {
    let socket_path = common::get_socket_path();

    // Remove old socket if it exists
    if socket_path.exists() {
        std::fs::remove_file(&socket_path)?;
    }

    let listener = UnixListener::bind(&socket_path)?;
    log::info!("IPC server listening on: {}", socket_path.display());

    serve(listener, state, player).await;

    // Clean up socket
    let _ = std::fs::remove_file(&socket_path);
    log::info!("IPC server stopped");
    Ok(())
}

/// Accept clients until the daemon is asked to exit.
async fn serve(listener: UnixListener, state: Arc<Mutex<DaemonState>>, player: PlayerHandle) {
    loop {
        // Check if we should exit
        if state.lock().await.should_exit {
            break;
        }

        // Accept connections with timeout
        let accept_result =
            tokio::time::timeout(std::time::Duration::from_millis(100), listener.accept()).await;

        match accept_result {
            Ok(Ok((stream, _addr))) => {
                let state = state.clone();
                let player = player.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, state, player).await {
                        log::error!("Error handling client: {}", e);
                    }
                });
            }
            Ok(Err(e)) => {
                log::error!("Error accepting connection: {}", e);
            }
            Err(_) => {
                // Timeout, continue loop to check exit condition
                continue;
            }
        }
    }
}

async fn handle_client(
    stream: UnixStream,
    state: Arc<Mutex<DaemonState>>,
    player: PlayerHandle,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    while reader.read_line(&mut line).await? > 0 {
        let response = match serde_json::from_str::<Command>(&line) {
            // Watch takes over the connection until the client goes away
            Ok(Command::Watch) => return stream_state(player.subscribe(), &mut writer).await,
            Ok(command) => handle_command(command, &state, &player).await,
            Err(e) => {
                log::warn!("Invalid command: {}", e);
                Response::Error(PlayerError::Ipc(format!("Invalid command: {}", e)))
            }
        };

        write_response(&mut writer, &response).await?;
        line.clear();
    }

    Ok(())
}

async fn write_response<W: AsyncWrite + Unpin>(writer: &mut W, response: &Response) -> Result<()> {
    let response_json = serde_json::to_string(response)?;
    writer.write_all(response_json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Send the current state, then one line per published change. Ends when
/// the client disconnects or the player stops.
async fn stream_state<W: AsyncWrite + Unpin>(
    mut rx: watch::Receiver<PlaybackState>,
    writer: &mut W,
) -> Result<()> {
    log::debug!("Client subscribed to playback state");

    loop {
        let snapshot = rx.borrow_and_update().clone();
        if let Err(e) = write_response(writer, &Response::State(snapshot)).await {
            log::debug!("Watch client went away: {}", e);
            return Ok(());
        }
        if rx.changed().await.is_err() {
            return Ok(());
        }
    }
}

fn send(player: &PlayerHandle, command: PlayerCommand) -> Response {
    match player.send(command) {
        Ok(()) => Response::Ok,
        Err(e) => Response::Error(PlayerError::Backend(e.to_string())),
    }
}

/// Expand `~` and check that local files exist. URIs are passed through.
fn resolve_source(raw: &str) -> Result<MediaSource, PlayerError> {
    let expanded = shellexpand::tilde(raw.trim());
    let source = MediaSource::new(expanded.as_ref())?;

    if source.scheme().is_none() && !Path::new(source.locator()).exists() {
        return Err(PlayerError::NotFound(format!(
            "Media file not found: {}",
            source.locator()
        )));
    }

    Ok(source)
}

async fn handle_command(
    command: Command,
    state: &Arc<Mutex<DaemonState>>,
    player: &PlayerHandle,
) -> Response {
    log::debug!("Handling command: {:?}", command);

    match command {
        Command::Ping => Response::Pong,

        Command::Status => Response::State(player.state()),

        Command::Load { source, paused } => {
            let source = match resolve_source(&source) {
                Ok(source) => source,
                Err(e) => {
                    log::warn!("Rejected load: {}", e);
                    return Response::Error(e);
                }
            };

            log::info!("Opening {}{}", source, if paused { " (paused)" } else { "" });
            state.lock().await.recent.record(&source);
            send(
                player,
                PlayerCommand::Load {
                    source,
                    autoplay: !paused,
                },
            )
        }

        Command::Play => send(player, PlayerCommand::Play),
        Command::Pause => send(player, PlayerCommand::Pause),
        Command::TogglePlayPause => send(player, PlayerCommand::TogglePlayPause),

        Command::Seek { seconds } => {
            if !seconds.is_finite() {
                return Response::Error(PlayerError::Ipc(format!(
                    "Invalid seek position: {}",
                    seconds
                )));
            }
            send(player, PlayerCommand::Seek(seconds))
        }

        Command::SkipForward { seconds } | Command::SkipBackward { seconds }
            if seconds.is_some_and(|s| !s.is_finite() || s < 0.0) =>
        {
            Response::Error(PlayerError::Ipc(format!(
                "Invalid skip step: {:?}",
                seconds
            )))
        }

        Command::SkipForward { seconds } => {
            let step = match seconds {
                Some(step) => step,
                None => state.lock().await.skip_secs,
            };
            send(player, PlayerCommand::Skip(step))
        }

        Command::SkipBackward { seconds } => {
            let step = match seconds {
                Some(step) => step,
                None => state.lock().await.skip_secs,
            };
            send(player, PlayerCommand::Skip(-step))
        }

        Command::SetVolume { level } => {
            if !level.is_finite() {
                return Response::Error(PlayerError::Ipc(format!("Invalid volume: {}", level)));
            }
            send(player, PlayerCommand::SetVolume(level))
        }

        Command::SetEffects { patch } => send(player, PlayerCommand::SetEffects(patch)),
        Command::ResetEffects => send(player, PlayerCommand::ResetEffects),
        Command::Close => send(player, PlayerCommand::Close),

        Command::RecentStreams => Response::Recent(state.lock().await.recent.list()),

        // Handled by the connection loop
        Command::Watch => Response::Ok,

        Command::Kill => {
            log::info!("Received kill command");
            state.lock().await.should_exit = true;
            Response::Ok
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::player::{self, CoordinatorSettings};
    use crate::player::testing::FakeEngines;
    use common::{BackendKind, EffectsPatch, PlayerPhase};
    use std::time::Duration;
    use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};

    struct Harness {
        state: Arc<Mutex<DaemonState>>,
        player: PlayerHandle,
        engines: FakeEngines,
        socket: std::path::PathBuf,
        _dir: tempfile::TempDir,
    }

    async fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("wave.sock");
        let listener = UnixListener::bind(&socket).unwrap();

        let engines = FakeEngines::new();
        let (player, _task) =
            player::spawn(Box::new(engines.clone()), CoordinatorSettings::default());
        let state = Arc::new(Mutex::new(DaemonState::new(&Config::default())));

        tokio::spawn(serve(listener, state.clone(), player.clone()));

        Harness {
            state,
            player,
            engines,
            socket,
            _dir: dir,
        }
    }

    struct Client {
        reader: BufReader<OwnedReadHalf>,
        writer: OwnedWriteHalf,
    }

    impl Client {
        async fn connect(path: &Path) -> Self {
            let stream = UnixStream::connect(path).await.unwrap();
            let (reader, writer) = stream.into_split();
            Self {
                reader: BufReader::new(reader),
                writer,
            }
        }

        async fn send(&mut self, command: &Command) -> Response {
            let mut json = serde_json::to_string(command).unwrap();
            json.push('\n');
            self.writer.write_all(json.as_bytes()).await.unwrap();
            self.read().await
        }

        async fn read(&mut self) -> Response {
            let mut line = String::new();
            tokio::time::timeout(Duration::from_secs(2), self.reader.read_line(&mut line))
                .await
                .expect("timed out waiting for response")
                .unwrap();
            serde_json::from_str(&line).unwrap()
        }
    }

    async fn wait_for(
        player: &PlayerHandle,
        predicate: impl Fn(&PlaybackState) -> bool,
    ) -> PlaybackState {
        let mut rx = player.subscribe();
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| predicate(s)))
            .await
            .expect("timed out waiting for state")
            .unwrap()
            .clone()
    }

    #[tokio::test]
    async fn test_ping_and_status() {
        let h = harness().await;
        let mut client = Client::connect(&h.socket).await;

        assert_eq!(client.send(&Command::Ping).await, Response::Pong);
        match client.send(&Command::Status).await {
            Response::State(state) => {
                assert_eq!(state.phase, PlayerPhase::Idle);
                assert_eq!(state.volume, 1.0);
            }
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_load_stream_plays_and_is_remembered() {
        let h = harness().await;
        let mut client = Client::connect(&h.socket).await;

        let response = client
            .send(&Command::Load {
                source: "rtsp://camera.local/live".to_string(),
                paused: false,
            })
            .await;
        assert_eq!(response, Response::Ok);

        let state = wait_for(&h.player, |s| s.is_playing).await;
        assert_eq!(state.backend_kind, Some(BackendKind::Universal));
        assert_eq!(
            h.engines.universal(0).locator().as_deref(),
            Some("rtsp://camera.local/live")
        );

        assert_eq!(
            client.send(&Command::RecentStreams).await,
            Response::Recent(vec!["rtsp://camera.local/live".to_string()])
        );
    }

    #[tokio::test]
    async fn test_load_paused_local_file() {
        let h = harness().await;
        let media = tempfile::Builder::new().suffix(".mp4").tempfile().unwrap();
        let mut client = Client::connect(&h.socket).await;

        let response = client
            .send(&Command::Load {
                source: media.path().display().to_string(),
                paused: true,
            })
            .await;
        assert_eq!(response, Response::Ok);

        let state = wait_for(&h.player, |s| s.has_active_backend).await;
        assert_eq!(state.backend_kind, Some(BackendKind::Native));
        assert!(!state.is_playing);

        // Local files are not stream history
        assert_eq!(
            client.send(&Command::RecentStreams).await,
            Response::Recent(Vec::new())
        );
    }

    #[tokio::test]
    async fn test_load_missing_file_is_rejected() {
        let h = harness().await;
        let mut client = Client::connect(&h.socket).await;

        let response = client
            .send(&Command::Load {
                source: "/definitely/not/here.mkv".to_string(),
                paused: false,
            })
            .await;
        assert!(matches!(response, Response::Error(PlayerError::NotFound(_))));

        let response = client
            .send(&Command::Load {
                source: "   ".to_string(),
                paused: false,
            })
            .await;
        assert!(matches!(
            response,
            Response::Error(PlayerError::InvalidSource(_))
        ));
        assert_eq!(h.engines.probe().live(), 0);
    }

    #[tokio::test]
    async fn test_skip_uses_configured_step() {
        let h = harness().await;
        h.state.lock().await.skip_secs = 15.0;
        let mut client = Client::connect(&h.socket).await;

        client
            .send(&Command::Load {
                source: "https://cdn.example.com/clip.mp4".to_string(),
                paused: true,
            })
            .await;
        client.send(&Command::Seek { seconds: 30.0 }).await;
        client.send(&Command::SkipForward { seconds: None }).await;
        wait_for(&h.player, |s| s.current_time_secs == 45.0).await;

        client
            .send(&Command::SkipBackward { seconds: Some(5.0) })
            .await;
        wait_for(&h.player, |s| s.current_time_secs == 40.0).await;

        let response = client
            .send(&Command::SkipForward {
                seconds: Some(-3.0),
            })
            .await;
        assert!(matches!(response, Response::Error(PlayerError::Ipc(_))));
    }

    #[tokio::test]
    async fn test_volume_and_effects() {
        let h = harness().await;
        let mut client = Client::connect(&h.socket).await;

        assert_eq!(
            client.send(&Command::SetVolume { level: 0.4 }).await,
            Response::Ok
        );
        assert!(matches!(
            client.send(&Command::SetVolume { level: f32::NAN }).await,
            Response::Error(_)
        ));
        client
            .send(&Command::SetEffects {
                patch: EffectsPatch {
                    contrast: Some(9.0),
                    ..Default::default()
                },
            })
            .await;

        let state = wait_for(&h.player, |s| s.effects.contrast == 4.0).await;
        assert_eq!(state.volume, 0.4);

        client.send(&Command::ResetEffects).await;
        wait_for(&h.player, |s| s.effects.contrast == 1.0).await;
    }

    #[tokio::test]
    async fn test_invalid_json() {
        let h = harness().await;
        let mut client = Client::connect(&h.socket).await;

        client.writer.write_all(b"{\"Nope\":1}\n").await.unwrap();
        assert!(matches!(
            client.read().await,
            Response::Error(PlayerError::Ipc(_))
        ));

        // The connection survives a bad line
        assert_eq!(client.send(&Command::Ping).await, Response::Pong);
    }

    #[tokio::test]
    async fn test_watch_streams_changes() {
        let h = harness().await;
        let mut watcher = Client::connect(&h.socket).await;
        let mut control = Client::connect(&h.socket).await;

        match watcher.send(&Command::Watch).await {
            Response::State(state) => assert_eq!(state.phase, PlayerPhase::Idle),
            other => panic!("unexpected response {:?}", other),
        }

        control.send(&Command::SetVolume { level: 0.2 }).await;
        loop {
            match watcher.read().await {
                Response::State(state) if state.volume == 0.2 => break,
                Response::State(_) => continue,
                other => panic!("unexpected response {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_kill_sets_exit_flag() {
        let h = harness().await;
        let mut client = Client::connect(&h.socket).await;

        assert_eq!(client.send(&Command::Kill).await, Response::Ok);
        assert!(h.state.lock().await.should_exit);
    }
}
