mod config;
mod ipc_server;
mod macros;
mod player;
mod recent;

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::player::{CoordinatorSettings, PlayerCommand};
use crate::recent::RecentStreams;

#[tokio::main]
async fn main() -> Result<()> {
    // Config is read first so its log level can seed the logger; RUST_LOG
    // still takes precedence.
    let loaded = config::Config::load();

    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let (Ok(cfg), None) = (&loaded, std::env::var_os("RUST_LOG")) {
        logger.filter_level(cfg.log_level_filter());
    }
    logger.init();

    log::info!("Starting Wave playback daemon v{}", env!("CARGO_PKG_VERSION"));

    let config_path = config::Config::default_config_path()?;
    log::info!("Looking for config at: {}", config_path.display());

    let config = match loaded {
        Ok(cfg) => {
            log::info!("✓ Configuration loaded successfully");
            log::info!("    - Log level: {}", cfg.general.log_level);
            log::info!(
                "    - Tick interval: {}ms, load timeout: {}s",
                cfg.playback.tick_interval_ms,
                cfg.playback.load_timeout_secs
            );
            log::info!(
                "    - Initial volume: {:.2}, skip step: {}s",
                cfg.playback.initial_volume,
                cfg.playback.skip_secs
            );
            cfg
        }
        Err(e) => {
            log::warn!("Failed to load config: {:#}. Using defaults.", e);
            config::Config::default()
        }
    };

    #[cfg(not(feature = "video"))]
    log::warn!("Built without the `video` feature; every load will fail");

    // Start the player actor
    let (player, player_task) = player::spawn(
        player::default_factory(),
        CoordinatorSettings::from(&config.playback),
    );

    let state = Arc::new(Mutex::new(DaemonState::new(&config)));

    // Start IPC server
    let ipc_state = state.clone();
    let ipc_player = player.clone();
    let ipc_handle = tokio::spawn(async move {
        if let Err(e) = ipc_server::start(ipc_state, ipc_player).await {
            log::error!("IPC server error: {}", e);
        }
    });

    // Set up signal handlers
    let signal_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_signal().await {
            log::error!("Signal handling unavailable: {}", e);
            return;
        }
        signal_state.lock().await.should_exit = true;
    });

    // The IPC server returns once should_exit is set (Kill or a signal)
    if let Err(e) = ipc_handle.await {
        log::error!("IPC task failed: {}", e);
    }

    log::info!("Daemon shutting down");
    if player.send(PlayerCommand::Shutdown).is_ok() {
        if let Err(e) = player_task.await {
            log::error!("Player task failed: {}", e);
        }
    }

    Ok(())
}

async fn wait_for_signal() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            log::info!("Received SIGTERM, shutting down...");
        }
        _ = sigint.recv() => {
            log::info!("Received SIGINT, shutting down...");
        }
    }

    Ok(())
}

/// Shared daemon state
pub struct DaemonState {
    pub should_exit: bool,
    /// Default step for skip commands
    pub skip_secs: f64,
    pub recent: RecentStreams,
}

impl DaemonState {
    fn new(config: &config::Config) -> Self {
        Self {
            should_exit: false,
            skip_secs: config.playback.skip_secs,
            recent: RecentStreams::new(config.streams.max_recent),
        }
    }
}
