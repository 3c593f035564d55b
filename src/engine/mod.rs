//! Speech engine module
//!
//! Defines the contracts the session manager and interpreter consume:
//! a speech recognizer that reports its lifecycle on a channel, and a
//! fire-and-forget text-to-speech speaker. Concrete adapters live in
//! the submodules.

mod console;
mod speaker;

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::RecognizerKind;

pub use console::ConsoleRecognizer;
pub use speaker::{CommandSpeaker, LogSpeaker, Speaker, Utterance, VoiceSettings};

/// A finalized recognition result
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    text: String,
    confidence: f32,
}

impl Transcript {
    /// Create a transcript, normalizing the text to trimmed lower case and
    /// clamping confidence into `[0, 1]`
    pub fn new(text: impl AsRef<str>, confidence: f32) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };

        Self {
            text: text.as_ref().trim().to_lowercase(),
            confidence,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }
}

/// Callbacks delivered by a speech engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Capture has begun
    Started,
    /// A final result for the current session
    Result(Transcript),
    /// The engine failed mid-session
    Error(String),
    /// Capture has ended, with or without a result
    Ended,
}

/// A speech-to-text engine with start/stop control.
///
/// Implementations report `Started`, `Result`, `Error` and `Ended` on the
/// event channel they were built with; `start` and `stop` only request
/// the transition.
pub trait SpeechRecognizer: Send {
    /// Request that the engine begin capturing audio
    fn start(&mut self) -> Result<(), RecognizerError>;

    /// Request that the engine end capture early
    fn stop(&mut self);
}

/// Errors that can occur when driving a speech engine
#[derive(Debug, thiserror::Error)]
pub enum RecognizerError {
    #[error("speech recognition is not available on this system")]
    Unavailable,

    #[error("a recognition session is already active")]
    AlreadyActive,

    #[error("speech engine failure: {0}")]
    Backend(String),
}

/// Build the recognizer selected in configuration
pub fn recognizer(
    kind: RecognizerKind,
    locale: &str,
    event_tx: mpsc::Sender<EngineEvent>,
) -> Result<Box<dyn SpeechRecognizer>, RecognizerError> {
    match kind {
        RecognizerKind::Console => Ok(Box::new(ConsoleRecognizer::spawn(locale, event_tx)?)),
        RecognizerKind::Disabled => Err(RecognizerError::Unavailable),
    }
}

/// Build the speaker selected in configuration
pub fn speaker(tts_command: Option<&str>) -> Arc<dyn Speaker> {
    match tts_command.and_then(CommandSpeaker::parse) {
        Some(command) => Arc::new(command),
        None => Arc::new(LogSpeaker),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_normalizes_text() {
        let transcript = Transcript::new("  Turn ON the Pump ", 0.87);
        assert_eq!(transcript.text(), "turn on the pump");
        assert!((transcript.confidence() - 0.87).abs() < f32::EPSILON);
    }

    #[test]
    fn test_transcript_clamps_confidence() {
        assert_eq!(Transcript::new("x", 1.7).confidence(), 1.0);
        assert_eq!(Transcript::new("x", -0.2).confidence(), 0.0);
        assert_eq!(Transcript::new("x", f32::NAN).confidence(), 0.0);
    }

    #[test]
    fn test_disabled_recognizer_is_unavailable() {
        let (tx, _rx) = mpsc::channel(4);
        let result = recognizer(RecognizerKind::Disabled, "en-IN", tx);
        assert!(matches!(result, Err(RecognizerError::Unavailable)));
    }
}
