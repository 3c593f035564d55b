//! Events module for voice session transitions
//!
//! Provides structured event types for listening start/end, indicator
//! pulses, transcripts and dispatched intents. Events are broadcast to
//! the IPC server and to subscribed clients.

use serde::{Deserialize, Serialize};

use crate::interpreter::Intent;
use crate::session::GlowPhase;

/// Events emitted by the session manager and the interpreter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VoiceEvent {
    /// The speech engine began capturing audio
    ListeningStarted,

    /// The speech engine stopped capturing audio
    ListeningEnded {
        /// Duration in milliseconds that the session was listening
        duration_ms: u64,
    },

    /// One phase of the listening indicator glow
    IndicatorPulse { phase: GlowPhase },

    /// A finalized transcript arrived from the engine
    TranscriptReceived { text: String, confidence: f32 },

    /// The interpreter classified and dispatched a transcript
    IntentDispatched { intent: Intent },

    /// The engine reported a failure mid-session
    RecognitionError { message: String },

    /// An automatic restart was scheduled after a session ended
    RestartScheduled { delay_ms: u64 },

    /// No speech engine is available; voice control is inert
    VoiceUnavailable,
}

impl std::fmt::Display for VoiceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoiceEvent::ListeningStarted => write!(f, "LISTENING_STARTED"),
            VoiceEvent::ListeningEnded { duration_ms } => {
                write!(f, "LISTENING_ENDED ({}ms)", duration_ms)
            }
            VoiceEvent::IndicatorPulse { phase } => write!(f, "INDICATOR_PULSE ({:?})", phase),
            VoiceEvent::TranscriptReceived { text, confidence } => {
                write!(f, "TRANSCRIPT_RECEIVED ({:?} @ {:.2})", text, confidence)
            }
            VoiceEvent::IntentDispatched { intent } => write!(f, "INTENT_DISPATCHED ({})", intent),
            VoiceEvent::RecognitionError { message } => {
                write!(f, "RECOGNITION_ERROR ({})", message)
            }
            VoiceEvent::RestartScheduled { delay_ms } => {
                write!(f, "RESTART_SCHEDULED ({}ms)", delay_ms)
            }
            VoiceEvent::VoiceUnavailable => write!(f, "VOICE_UNAVAILABLE"),
        }
    }
}
