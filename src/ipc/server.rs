//! Unix domain socket server for IPC
//!
//! Provides request-response communication for status and session
//! triggers, plus push notifications of voice events to subscribed
//! clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, error, info, warn};

use crate::events::VoiceEvent;
use crate::session::{Control, SessionState};

use super::protocol::{AssistantStatus, Notification, Request, Response};

const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    state: Arc<RwLock<ServerState>>,
    control_tx: mpsc::Sender<Control>,
    shutdown_tx: broadcast::Sender<()>,
    /// Source of voice events for subscribed clients
    event_tx: broadcast::Sender<VoiceEvent>,
}

/// Shared server state
struct ServerState {
    status: AssistantStatus,
    start_time: std::time::Instant,
}

/// One decoded frame from a client
type Frame = std::result::Result<Request, serde_json::Error>;

impl Server {
    /// Create a new IPC server that can push voice events to subscribers
    pub fn new(
        socket_path: &Path,
        control_tx: mpsc::Sender<Control>,
        event_tx: broadcast::Sender<VoiceEvent>,
    ) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path)
                .context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path)
            .context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        let state = Arc::new(RwLock::new(ServerState {
            status: AssistantStatus::default(),
            start_time: std::time::Instant::now(),
        }));

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            state,
            control_tx,
            shutdown_tx,
            event_tx,
        })
    }

    /// Record whether a speech engine is available
    pub async fn set_voice_available(&self, available: bool) {
        self.state.write().await.status.voice_available = available;
    }

    /// Fold a voice event into the status snapshot
    pub async fn apply_event(&self, event: &VoiceEvent) {
        let mut server_state = self.state.write().await;
        let status = &mut server_state.status;

        match event {
            VoiceEvent::ListeningStarted => status.state = SessionState::Listening,
            VoiceEvent::ListeningEnded { .. } => status.state = SessionState::Idle,
            VoiceEvent::TranscriptReceived { text, .. } => {
                status.last_transcript = Some(text.clone());
            }
            VoiceEvent::IntentDispatched { intent } => status.last_intent = Some(*intent),
            VoiceEvent::VoiceUnavailable => status.voice_available = false,
            VoiceEvent::IndicatorPulse { .. }
            | VoiceEvent::RecognitionError { .. }
            | VoiceEvent::RestartScheduled { .. } => return,
        }

        debug!(state = %status.state, "IPC server: status updated");
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref()
            .context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let state = Arc::clone(&self.state);
                    let control_tx = self.control_tx.clone();
                    let event_tx = self.event_tx.clone();
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, state, control_tx, event_tx) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    async fn handle_client(
        stream: UnixStream,
        state: Arc<RwLock<ServerState>>,
        control_tx: mpsc::Sender<Control>,
        event_tx: broadcast::Sender<VoiceEvent>,
    ) -> Result<()> {
        let (reader, mut writer) = stream.into_split();

        // Reads happen on their own task so a half-read frame is never
        // dropped while waiting on events
        let (frame_tx, mut frame_rx) = mpsc::channel::<Frame>(8);
        let read_task = tokio::spawn(async move {
            if let Err(e) = read_frames(reader, frame_tx).await {
                warn!(?e, "client read error");
            }
        });

        let mut events: Option<broadcast::Receiver<VoiceEvent>> = None;

        let result = loop {
            tokio::select! {
                frame = frame_rx.recv() => {
                    let response = match frame {
                        Some(Ok(request)) => {
                            debug!(?request, "received request");
                            if request == Request::Subscribe && events.is_none() {
                                events = Some(event_tx.subscribe());
                                debug!("client subscribed to notifications");
                            }
                            Self::process_request(request, &state, &control_tx).await
                        }
                        Some(Err(e)) => {
                            debug!(?e, "malformed request");
                            Response::error("bad_request", e.to_string())
                        }
                        None => break Ok(()),
                    };

                    if let Err(e) = send_message(&mut writer, &response).await {
                        break Err(e);
                    }
                }

                event = next_event(&mut events), if events.is_some() => match event {
                    Ok(event) => {
                        if let Err(e) = send_message(&mut writer, &Notification::Event { event }).await {
                            break Err(e);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "subscriber lagged, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        events = None;
                    }
                },
            }
        };

        read_task.abort();
        result
    }

    /// Process a request and return a response
    async fn process_request(
        request: Request,
        state: &Arc<RwLock<ServerState>>,
        control_tx: &mpsc::Sender<Control>,
    ) -> Response {
        match request {
            Request::Ping => Response::Pong,

            Request::GetStatus => {
                let mut state = state.write().await;
                state.status.uptime_secs = state.start_time.elapsed().as_secs();
                Response::Status(state.status.clone())
            }

            Request::Subscribe => Response::Subscribed,

            Request::Start => Self::forward(Control::Start, state, control_tx).await,
            Request::Stop => Self::forward(Control::Stop, state, control_tx).await,
            Request::Toggle => Self::forward(Control::Toggle, state, control_tx).await,
            Request::PushToTalk { pressed } => {
                Self::forward(Control::PushToTalk { pressed }, state, control_tx).await
            }
        }
    }

    /// Queue a trigger for the session manager
    async fn forward(
        control: Control,
        state: &Arc<RwLock<ServerState>>,
        control_tx: &mpsc::Sender<Control>,
    ) -> Response {
        if !state.read().await.status.voice_available {
            return Response::error("voice_unavailable", "no speech engine is available");
        }

        match control_tx.send(control).await {
            Ok(()) => {
                info!(?control, "session trigger via IPC");
                Response::Ack
            }
            Err(_) => Response::error("session_closed", "session manager is not running"),
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

/// Decode length-prefixed requests until the client disconnects
async fn read_frames<R: AsyncRead + Unpin>(mut reader: R, frame_tx: mpsc::Sender<Frame>) -> Result<()> {
    let mut len_buf = [0u8; 4];

    loop {
        // Read message length (4-byte little-endian)
        match reader.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                debug!("client disconnected");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_le_bytes(len_buf) as usize;
        if len > MAX_MESSAGE_LEN {
            warn!(len, "message too large, disconnecting");
            return Ok(());
        }

        let mut msg_buf = vec![0u8; len];
        reader.read_exact(&mut msg_buf).await?;

        if frame_tx.send(serde_json::from_slice(&msg_buf)).await.is_err() {
            return Ok(());
        }
    }
}

/// Send a length-prefixed JSON message
async fn send_message<W, T>(writer: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let msg_bytes = serde_json::to_vec(msg)?;
    let msg_len = (msg_bytes.len() as u32).to_le_bytes();

    writer.write_all(&msg_len).await?;
    writer.write_all(&msg_bytes).await?;

    Ok(())
}

async fn next_event(
    events: &mut Option<broadcast::Receiver<VoiceEvent>>,
) -> std::result::Result<VoiceEvent, broadcast::error::RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
