//! aquaclima-voice: voice-command daemon for the AquaClima garden rig
//!
//! This daemon provides:
//! - A speech session manager (start/stop, auto-restart, glow indicator)
//! - A command interpreter mapping phrases to pump control
//! - IPC server standing in for the mic button and push-to-talk key
//!
//! Pump commands go to the rig's realtime database; spoken replies go
//! to the configured text-to-speech program.

mod config;
mod engine;
mod events;
mod interpreter;
mod ipc;
mod lifecycle;
mod pump;
mod session;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::events::VoiceEvent;
use crate::interpreter::CommandInterpreter;
use crate::ipc::Server;
use crate::lifecycle::ShutdownSignal;
use crate::pump::{FirebasePump, PumpControl};
use crate::session::{Control, SessionManager, SessionOptions};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "aquaclima-voice starting"
    );

    // Load configuration
    let config = Config::load()?;
    info!(
        ?config.socket_path,
        auto_restart = config.auto_restart,
        wake_mode = ?config.wake_mode,
        "configuration loaded"
    );
    config.ensure_dirs()?;

    // Create shutdown signal handler
    let mut shutdown = ShutdownSignal::new()?;

    // Channels for inter-component communication
    // Speech engine -> session manager
    let (engine_tx, engine_rx) = mpsc::channel(32);
    // IPC server -> session manager
    let (control_tx, control_rx) = mpsc::channel::<Control>(32);
    // Session manager -> command interpreter
    let (transcript_tx, transcript_rx) = mpsc::channel(8);
    // Session manager and interpreter -> IPC server
    let (event_tx, _event_rx) = broadcast::channel::<VoiceEvent>(64);

    let recognizer = match engine::recognizer(config.recognizer, &config.locale, engine_tx) {
        Ok(recognizer) => {
            info!(kind = ?config.recognizer, locale = %config.locale, "speech recognizer ready");
            Some(recognizer)
        }
        Err(e) => {
            error!(%e, "speech recognizer unavailable");
            warn!("continuing without voice control - session triggers will be rejected");
            None
        }
    };
    let voice_available = recognizer.is_some();

    let pump = config.firebase_url.as_deref().map(|url| {
        info!(url, "pump controller configured");
        Arc::new(FirebasePump::new(url, config.http_timeout)) as Arc<dyn PumpControl>
    });

    let commands = Arc::new(CommandInterpreter::new(
        config.wake_word()?,
        engine::speaker(config.tts_command.as_deref()),
        pump,
        config.voice.clone(),
    ));

    let mut session = SessionManager::new(
        recognizer,
        SessionOptions::from(&config),
        transcript_tx,
        event_tx.clone(),
    );

    // Create IPC server with event subscription
    let server = Server::new(&config.socket_path, control_tx.clone(), event_tx.clone())?;
    server.set_voice_available(voice_available).await;

    // Subscribe before anything is published so the status view is complete
    let mut status_rx = event_tx.subscribe();

    if !voice_available {
        let _ = event_tx.send(VoiceEvent::VoiceUnavailable);
    } else if config.auto_restart {
        // Always-listening starts without waiting for a trigger
        control_tx.send(Control::Start).await?;
    }

    info!("daemon initialized, entering main loop");

    // Main event loop
    tokio::select! {
        // Run the session manager (engine callbacks and triggers)
        _ = session.run(engine_rx, control_rx) => {
            info!("session manager exited");
        }

        // Run the interpreter (transcripts to pump commands)
        _ = interpreter::serve(commands, transcript_rx, event_tx.clone()) => {
            info!("command interpreter exited");
        }

        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Keep the IPC server's status view in sync
        _ = async {
            loop {
                match status_rx.recv().await {
                    Ok(event) => server.apply_event(&event).await,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "status receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        } => {
            info!("status tracker exited");
        }

        // Wait for shutdown signal
        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!(
        state = %session.state(),
        restart_pending = session.restart_pending(),
        "shutting down..."
    );

    server.shutdown().await;

    info!("aquaclima-voice stopped");

    Ok(())
}
