//! Core session manager implementation
//!
//! Handles transitions between Idle and Listening based on speech engine
//! callbacks and manual triggers, drives the glow indicator and
//! schedules automatic restarts in the always-listening variant.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::engine::{EngineEvent, RecognizerError, SpeechRecognizer, Transcript};
use crate::events::VoiceEvent;

use super::indicator::GlowIndicator;

/// The two possible states of a recognition session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No capture in progress
    #[default]
    Idle,
    /// The engine is capturing audio
    Listening,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Listening => write!(f, "Listening"),
        }
    }
}

/// Manual triggers from the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Control {
    /// Begin listening
    Start,
    /// End listening early
    Stop,
    /// Mic button: start when idle, stop when listening
    Toggle,
    /// Push-to-talk key went down or up
    PushToTalk { pressed: bool },
}

/// Timing and restart behavior of a session manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Delay before restarting after a session ends; `None` disables
    /// always-listening
    pub auto_restart: Option<Duration>,
    /// Period of the glow indicator
    pub indicator_interval: Duration,
    /// An explicit stop holds off auto-restart until the next explicit start
    pub stop_suspends_restart: bool,
}

impl From<&Config> for SessionOptions {
    fn from(config: &Config) -> Self {
        Self {
            auto_restart: config.auto_restart.then_some(config.restart_delay),
            indicator_interval: config.indicator_interval,
            stop_suspends_restart: config.stop_suspends_restart,
        }
    }
}

/// Owns the recognition lifecycle
pub struct SessionManager {
    /// Current state
    state: SessionState,
    /// Speech engine, absent when the platform has none
    recognizer: Option<Box<dyn SpeechRecognizer>>,
    /// A start was requested and `Started` has not arrived yet
    start_pending: bool,
    indicator: GlowIndicator,
    auto_restart: Option<Duration>,
    /// Deadline of the pending automatic restart
    restart_at: Option<Instant>,
    stop_suspends_restart: bool,
    /// Set by an explicit stop when `stop_suspends_restart`; cleared by
    /// the next explicit start
    restart_suspended: bool,
    listening_since: Option<Instant>,
    transcript_tx: mpsc::Sender<Transcript>,
    event_tx: broadcast::Sender<VoiceEvent>,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(
        recognizer: Option<Box<dyn SpeechRecognizer>>,
        options: SessionOptions,
        transcript_tx: mpsc::Sender<Transcript>,
        event_tx: broadcast::Sender<VoiceEvent>,
    ) -> Self {
        Self {
            state: SessionState::Idle,
            recognizer,
            start_pending: false,
            indicator: GlowIndicator::new(options.indicator_interval, event_tx.clone()),
            auto_restart: options.auto_restart,
            restart_at: None,
            stop_suspends_restart: options.stop_suspends_restart,
            restart_suspended: false,
            listening_since: None,
            transcript_tx,
            event_tx,
        }
    }

    /// Get the current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Check whether an automatic restart is scheduled
    pub fn restart_pending(&self) -> bool {
        self.restart_at.is_some()
    }

    /// Run the session manager, processing engine callbacks, manual
    /// triggers and scheduled restarts
    pub async fn run(
        &mut self,
        mut engine_rx: mpsc::Receiver<EngineEvent>,
        mut control_rx: mpsc::Receiver<Control>,
    ) {
        info!(
            auto_restart = self.auto_restart.is_some(),
            voice_available = self.recognizer.is_some(),
            "session manager started in Idle state"
        );

        let mut engine_open = true;

        loop {
            let restart_at = self.restart_at;

            tokio::select! {
                event = engine_rx.recv(), if engine_open => match event {
                    Some(event) => self.handle_engine_event(event),
                    None => {
                        debug!("speech engine channel closed");
                        engine_open = false;
                    }
                },

                control = control_rx.recv() => match control {
                    Some(control) => self.handle_control(control),
                    None => break,
                },

                _ = wait_until(restart_at) => {
                    self.restart_at = None;
                    info!("restarting recognition");
                    self.request_start();
                }
            }
        }

        self.indicator.stop();
        info!("session manager stopped");
    }

    /// Handle a manual trigger
    fn handle_control(&mut self, control: Control) {
        debug!(?control, state = %self.state, "control received");

        match control {
            Control::Start => {
                self.restart_suspended = false;
                self.restart_at = None;
                self.request_start();
            }
            Control::Stop => {
                if self.auto_restart.is_some() && self.stop_suspends_restart {
                    self.restart_suspended = true;
                    self.restart_at = None;
                }
                self.request_stop();
            }
            Control::Toggle => {
                if self.is_active() {
                    self.handle_control(Control::Stop);
                } else {
                    self.handle_control(Control::Start);
                }
            }
            Control::PushToTalk { pressed: true } => {
                if !self.is_active() {
                    self.handle_control(Control::Start);
                }
            }
            Control::PushToTalk { pressed: false } => {
                if self.state == SessionState::Listening {
                    self.handle_control(Control::Stop);
                }
            }
        }
    }

    /// Handle a callback from the speech engine
    fn handle_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Started => {
                self.start_pending = false;
                if self.state == SessionState::Listening {
                    debug!("engine reported start while already listening");
                    return;
                }
                self.transition_to(SessionState::Listening);
                self.indicator.start();
            }
            EngineEvent::Result(transcript) => {
                self.forward_transcript(transcript);
            }
            EngineEvent::Error(message) => {
                warn!(error = %message, "speech recognition error");
                self.emit(VoiceEvent::RecognitionError { message });
            }
            EngineEvent::Ended => {
                self.start_pending = false;
                if self.state == SessionState::Listening {
                    self.transition_to(SessionState::Idle);
                }
                self.indicator.stop();
                self.schedule_restart();
            }
        }
    }

    /// True while listening or waiting for the engine to start
    fn is_active(&self) -> bool {
        self.state == SessionState::Listening || self.start_pending
    }

    /// Ask the engine to start, unless a session is already active
    fn request_start(&mut self) {
        if self.is_active() {
            debug!(state = %self.state, "session already active, start ignored");
            return;
        }

        let Some(recognizer) = self.recognizer.as_mut() else {
            debug!("voice control unavailable, start ignored");
            return;
        };

        match recognizer.start() {
            Ok(()) => {
                self.start_pending = true;
                debug!("recognition start requested");
            }
            Err(RecognizerError::Unavailable) => {
                warn!("speech engine is gone, voice control disabled");
                self.recognizer = None;
                self.restart_at = None;
                self.emit(VoiceEvent::VoiceUnavailable);
            }
            Err(e) => {
                warn!(error = %e, "recognition start failed");
            }
        }
    }

    /// Ask the engine to stop, unless nothing is active
    fn request_stop(&mut self) {
        if !self.is_active() {
            debug!("no active session, stop ignored");
            return;
        }

        if let Some(recognizer) = self.recognizer.as_mut() {
            recognizer.stop();
            debug!("recognition stop requested");
        }
    }

    fn schedule_restart(&mut self) {
        let Some(delay) = self.auto_restart else {
            return;
        };

        if self.restart_suspended {
            debug!("auto-restart suspended by explicit stop");
            return;
        }

        if self.recognizer.is_none() {
            return;
        }

        self.restart_at = Some(Instant::now() + delay);
        info!(delay_ms = delay.as_millis() as u64, "recognition ended, restart scheduled");
        self.emit(VoiceEvent::RestartScheduled {
            delay_ms: delay.as_millis() as u64,
        });
    }

    fn forward_transcript(&mut self, transcript: Transcript) {
        info!(
            text = transcript.text(),
            confidence = format_args!("{:.2}", transcript.confidence()),
            "heard"
        );

        self.emit(VoiceEvent::TranscriptReceived {
            text: transcript.text().to_string(),
            confidence: transcript.confidence(),
        });

        match self.transcript_tx.try_send(transcript) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                warn!(text = dropped.text(), "interpreter busy, transcript dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("interpreter channel closed, transcript dropped");
            }
        }
    }

    /// Perform a state transition
    fn transition_to(&mut self, new_state: SessionState) {
        let old_state = self.state;
        let duration_ms = self
            .listening_since
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);

        info!(
            from = %old_state,
            to = %new_state,
            duration_ms = duration_ms,
            "session transition"
        );

        self.state = new_state;
        self.listening_since = match new_state {
            SessionState::Listening => Some(Instant::now()),
            SessionState::Idle => None,
        };

        let event = match new_state {
            SessionState::Listening => VoiceEvent::ListeningStarted,
            SessionState::Idle => VoiceEvent::ListeningEnded { duration_ms },
        };
        self.emit(event);
    }

    fn emit(&self, event: VoiceEvent) {
        debug!(%event, "emitting event");
        let _ = self.event_tx.send(event);
    }
}

/// Resolve at the deadline, or never when there is none
async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
