//! Console speech recognizer
//!
//! Treats each line typed on stdin as one spoken phrase. A dedicated
//! thread reads stdin; a line only counts as a result while a session is
//! listening, mirroring a single-shot recognition engine. A leading number
//! in `[0, 1]` is taken as the confidence score, e.g. `0.82 pump on`.
//!
//! Once stdin is closed the recognizer reports itself unavailable.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{EngineEvent, RecognizerError, SpeechRecognizer, Transcript};

/// Flags shared between the recognizer and its reader thread
#[derive(Debug)]
struct Capture {
    /// A session is listening for the next phrase
    capturing: AtomicBool,
    /// The reader thread can still deliver phrases
    alive: AtomicBool,
}

/// Recognizer fed by lines on standard input
pub struct ConsoleRecognizer {
    event_tx: mpsc::Sender<EngineEvent>,
    capture: Arc<Capture>,
}

impl ConsoleRecognizer {
    /// Create the recognizer and start its stdin reader thread
    pub fn spawn(locale: &str, event_tx: mpsc::Sender<EngineEvent>) -> Result<Self, RecognizerError> {
        let recognizer = Self::new(event_tx);

        let event_tx = recognizer.event_tx.clone();
        let capture = Arc::clone(&recognizer.capture);

        thread::Builder::new()
            .name("console-recognizer".to_string())
            .spawn(move || {
                info!("console recognizer thread started");
                read_phrases(std::io::stdin().lock(), &event_tx, &capture);
                info!("console recognizer thread stopped");
            })
            .map_err(|e| RecognizerError::Backend(e.to_string()))?;

        info!(locale, "console recognizer ready, type a phrase while listening");
        Ok(recognizer)
    }

    fn new(event_tx: mpsc::Sender<EngineEvent>) -> Self {
        Self {
            event_tx,
            capture: Arc::new(Capture {
                capturing: AtomicBool::new(false),
                alive: AtomicBool::new(true),
            }),
        }
    }

    /// Check whether a session is currently capturing
    pub fn is_capturing(&self) -> bool {
        self.capture.capturing.load(Ordering::SeqCst)
    }
}

impl SpeechRecognizer for ConsoleRecognizer {
    fn start(&mut self) -> Result<(), RecognizerError> {
        if !self.capture.alive.load(Ordering::SeqCst) {
            return Err(RecognizerError::Unavailable);
        }
        if self.is_capturing() {
            return Err(RecognizerError::AlreadyActive);
        }

        // Started must be queued before any result can be
        self.event_tx
            .try_send(EngineEvent::Started)
            .map_err(|e| RecognizerError::Backend(e.to_string()))?;
        self.capture.capturing.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {
        if !self.capture.capturing.swap(false, Ordering::SeqCst) {
            return;
        }

        if self.event_tx.try_send(EngineEvent::Ended).is_err() {
            // Still capturing, so a later stop or phrase can end the session
            self.capture.capturing.store(true, Ordering::SeqCst);
            warn!("failed to report end of capture - channel full or closed");
        }
    }
}

/// Read phrases until EOF, emitting a result and end for each line that
/// arrives while capturing. Marks the capture dead on return.
fn read_phrases<R: BufRead>(reader: R, event_tx: &mpsc::Sender<EngineEvent>, capture: &Capture) {
    deliver_phrases(reader, event_tx, &capture.capturing);
    capture.alive.store(false, Ordering::SeqCst);

    // stdin closed mid-session still ends the session
    if capture.capturing.swap(false, Ordering::SeqCst) {
        let _ = event_tx.blocking_send(EngineEvent::Ended);
    }
}

fn deliver_phrases<R: BufRead>(reader: R, event_tx: &mpsc::Sender<EngineEvent>, capturing: &AtomicBool) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                let _ = event_tx.blocking_send(EngineEvent::Error(e.to_string()));
                break;
            }
        };

        let Some(transcript) = parse_phrase(&line) else {
            continue;
        };

        if !capturing.swap(false, Ordering::SeqCst) {
            debug!(text = transcript.text(), "not listening, phrase dropped");
            continue;
        }

        if event_tx.blocking_send(EngineEvent::Result(transcript)).is_err()
            || event_tx.blocking_send(EngineEvent::Ended).is_err()
        {
            warn!("failed to send recognition result - channel closed?");
            return;
        }
    }
}

/// Parse one typed phrase, with an optional leading confidence score
fn parse_phrase(line: &str) -> Option<Transcript> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if let Some((head, rest)) = line.split_once(char::is_whitespace) {
        if let Ok(confidence) = head.parse::<f32>() {
            if (0.0..=1.0).contains(&confidence) && !rest.trim().is_empty() {
                return Some(Transcript::new(rest, confidence));
            }
        }
    }

    Some(Transcript::new(line, 1.0))
}
