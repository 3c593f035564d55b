//! Intent dispatch
//!
//! Each actionable intent produces one spoken confirmation and exactly
//! one pump call. Pump calls are best-effort: with no pump configured
//! they are skipped, and failures are logged without retry.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::engine::{Speaker, Transcript, Utterance, VoiceSettings};
use crate::events::VoiceEvent;
use crate::pump::{PumpControl, PumpError};

use super::intent::{classify, Intent, WakeWord};

pub const WAKE_REPLY: &str = "Yes, I'm here. What should I do?";
pub const PUMP_ON_REPLY: &str = "Turning pump on.";
pub const PUMP_OFF_REPLY: &str = "Turning pump off.";
pub const AUTO_MODE_REPLY: &str = "Switching to automatic mode.";
pub const STATUS_REPLY: &str = "Checking system status.";
pub const UNKNOWN_REPLY: &str = "Sorry, I didn't catch that. Please repeat.";

/// Classifies transcripts and carries out the resulting intents
pub struct CommandInterpreter {
    wake: WakeWord,
    speaker: Arc<dyn Speaker>,
    pump: Option<Arc<dyn PumpControl>>,
    voice: VoiceSettings,
}

impl CommandInterpreter {
    pub fn new(
        wake: WakeWord,
        speaker: Arc<dyn Speaker>,
        pump: Option<Arc<dyn PumpControl>>,
        voice: VoiceSettings,
    ) -> Self {
        if pump.is_none() {
            info!("no pump controller configured, pump commands will only be acknowledged");
        }

        Self {
            wake,
            speaker,
            pump,
            voice,
        }
    }

    pub fn classify(&self, text: &str) -> Intent {
        classify(&self.wake, text)
    }

    /// Classify and dispatch one transcript
    pub fn handle(&self, transcript: &Transcript) -> Intent {
        let intent = self.classify(transcript.text());
        debug!(
            text = transcript.text(),
            confidence = transcript.confidence(),
            %intent,
            "transcript classified"
        );
        self.dispatch(intent);
        intent
    }

    pub fn dispatch(&self, intent: Intent) {
        match intent {
            Intent::WakeAck => {
                info!("wake word detected");
                self.say(WAKE_REPLY);
            }
            Intent::PumpOn => {
                info!("command: pump on");
                self.say(PUMP_ON_REPLY);
                self.call_pump("set_pump", |pump| pump.set_pump(true, true));
            }
            Intent::PumpOff => {
                info!("command: pump off");
                self.say(PUMP_OFF_REPLY);
                self.call_pump("set_pump", |pump| pump.set_pump(false, true));
            }
            Intent::AutoMode => {
                info!("command: auto mode");
                self.say(AUTO_MODE_REPLY);
                self.call_pump("reset_auto_mode", |pump| pump.reset_auto_mode());
            }
            Intent::StatusQuery => {
                info!("command: status");
                self.say(STATUS_REPLY);
                if let Some(running) = self.call_pump("query_pump_status", |pump| pump.query_pump_status()) {
                    info!(running, "pump status");
                    self.say(status_report(running));
                }
            }
            Intent::Unknown => {
                info!("unknown command");
                self.say(UNKNOWN_REPLY);
            }
        }
    }

    fn say(&self, text: &str) {
        self.speaker.speak(&Utterance::new(text, &self.voice));
    }

    fn call_pump<T>(
        &self,
        operation: &'static str,
        call: impl FnOnce(&dyn PumpControl) -> Result<T, PumpError>,
    ) -> Option<T> {
        let Some(pump) = self.pump.as_deref() else {
            debug!(operation, "no pump controller, call skipped");
            return None;
        };

        match call(pump) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(operation, error = %e, "pump call failed");
                None
            }
        }
    }
}

fn status_report(running: bool) -> &'static str {
    if running {
        "The pump is currently on."
    } else {
        "The pump is currently off."
    }
}

/// Feed transcripts through the interpreter in arrival order.
///
/// Dispatch runs on the blocking pool since pump calls are blocking HTTP.
pub async fn serve(
    interpreter: Arc<CommandInterpreter>,
    mut transcript_rx: mpsc::Receiver<Transcript>,
    event_tx: broadcast::Sender<VoiceEvent>,
) {
    info!("command interpreter started");

    while let Some(transcript) = transcript_rx.recv().await {
        let interpreter = Arc::clone(&interpreter);
        match tokio::task::spawn_blocking(move || interpreter.handle(&transcript)).await {
            Ok(intent) => {
                let _ = event_tx.send(VoiceEvent::IntentDispatched { intent });
            }
            Err(e) => {
                error!(?e, "command dispatch panicked");
            }
        }
    }

    info!("command interpreter stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingSpeaker {
        spoken: Mutex<Vec<String>>,
    }

    impl RecordingSpeaker {
        fn spoken(&self) -> Vec<String> {
            self.spoken.lock().unwrap().clone()
        }
    }

    impl Speaker for RecordingSpeaker {
        fn speak(&self, utterance: &Utterance) {
            self.spoken.lock().unwrap().push(utterance.text.clone());
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum PumpCall {
        Set { on: bool, manual_override: bool },
        ResetAuto,
        QueryStatus,
    }

    #[derive(Default)]
    struct RecordingPump {
        calls: Mutex<Vec<PumpCall>>,
        running: bool,
        failing: bool,
    }

    impl RecordingPump {
        fn calls(&self) -> Vec<PumpCall> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: PumpCall) -> Result<(), PumpError> {
            self.calls.lock().unwrap().push(call);
            if self.failing {
                Err(PumpError::Transport("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    impl PumpControl for RecordingPump {
        fn set_pump(&self, on: bool, manual_override: bool) -> Result<(), PumpError> {
            self.record(PumpCall::Set { on, manual_override })
        }

        fn reset_auto_mode(&self) -> Result<(), PumpError> {
            self.record(PumpCall::ResetAuto)
        }

        fn query_pump_status(&self) -> Result<bool, PumpError> {
            self.record(PumpCall::QueryStatus)?;
            Ok(self.running)
        }
    }

    fn interpreter_with(
        pump: RecordingPump,
    ) -> (CommandInterpreter, Arc<RecordingSpeaker>, Arc<RecordingPump>) {
        let speaker = Arc::new(RecordingSpeaker::default());
        let pump = Arc::new(pump);
        let interpreter = CommandInterpreter::new(
            WakeWord::default(),
            speaker.clone(),
            Some(pump.clone()),
            VoiceSettings::default(),
        );
        (interpreter, speaker, pump)
    }

    fn create_interpreter() -> (CommandInterpreter, Arc<RecordingSpeaker>, Arc<RecordingPump>) {
        interpreter_with(RecordingPump::default())
    }

    #[test]
    fn test_pump_off_phrase() {
        let (interpreter, speaker, pump) = create_interpreter();

        let intent = interpreter.handle(&Transcript::new("please turn off the pump now", 0.9));

        assert_eq!(intent, Intent::PumpOff);
        assert_eq!(
            pump.calls(),
            vec![PumpCall::Set {
                on: false,
                manual_override: true
            }]
        );
        assert_eq!(speaker.spoken(), vec![PUMP_OFF_REPLY]);
    }

    #[test]
    fn test_pump_on_phrase() {
        let (interpreter, speaker, pump) = create_interpreter();

        assert_eq!(interpreter.handle(&Transcript::new("start pump", 0.3)), Intent::PumpOn);
        assert_eq!(
            pump.calls(),
            vec![PumpCall::Set {
                on: true,
                manual_override: true
            }]
        );
        assert_eq!(speaker.spoken(), vec![PUMP_ON_REPLY]);
    }

    #[test]
    fn test_wake_word_makes_no_pump_call() {
        let (interpreter, speaker, pump) = create_interpreter();

        assert_eq!(interpreter.handle(&Transcript::new("clima turn off", 1.0)), Intent::WakeAck);
        assert!(pump.calls().is_empty());
        assert_eq!(speaker.spoken(), vec![WAKE_REPLY]);
    }

    #[test]
    fn test_auto_mode() {
        let (interpreter, speaker, pump) = create_interpreter();

        interpreter.dispatch(Intent::AutoMode);
        assert_eq!(pump.calls(), vec![PumpCall::ResetAuto]);
        assert_eq!(speaker.spoken(), vec![AUTO_MODE_REPLY]);
    }

    #[test]
    fn test_status_query_reports_result() {
        let (interpreter, speaker, pump) = interpreter_with(RecordingPump {
            running: true,
            ..Default::default()
        });

        interpreter.dispatch(Intent::StatusQuery);
        assert_eq!(pump.calls(), vec![PumpCall::QueryStatus]);
        assert_eq!(speaker.spoken(), vec![STATUS_REPLY, "The pump is currently on."]);
    }

    #[test]
    fn test_unknown_apologizes() {
        let (interpreter, speaker, pump) = create_interpreter();

        assert_eq!(
            interpreter.handle(&Transcript::new("what's the weather", 0.95)),
            Intent::Unknown
        );
        assert!(pump.calls().is_empty());
        assert_eq!(speaker.spoken(), vec![UNKNOWN_REPLY]);
    }

    #[test]
    fn test_low_confidence_still_dispatches() {
        let (interpreter, _speaker, pump) = create_interpreter();

        interpreter.handle(&Transcript::new("pump on", 0.01));
        assert_eq!(pump.calls().len(), 1);
    }

    #[test]
    fn test_failed_pump_call_is_not_retried() {
        let (interpreter, speaker, pump) = interpreter_with(RecordingPump {
            failing: true,
            ..Default::default()
        });

        interpreter.dispatch(Intent::StatusQuery);
        assert_eq!(pump.calls(), vec![PumpCall::QueryStatus]);
        // Confirmation only, no status report
        assert_eq!(speaker.spoken(), vec![STATUS_REPLY]);
    }

    #[test]
    fn test_missing_pump_is_skipped() {
        let speaker = Arc::new(RecordingSpeaker::default());
        let interpreter = CommandInterpreter::new(
            WakeWord::default(),
            speaker.clone(),
            None,
            VoiceSettings::default(),
        );

        interpreter.dispatch(Intent::PumpOn);
        interpreter.dispatch(Intent::StatusQuery);
        assert_eq!(speaker.spoken(), vec![PUMP_ON_REPLY, STATUS_REPLY]);
    }

    #[tokio::test]
    async fn test_serve_dispatches_in_order() {
        let (interpreter, speaker, _pump) = create_interpreter();
        let (transcript_tx, transcript_rx) = mpsc::channel(4);
        let (event_tx, mut event_rx) = broadcast::channel(8);

        transcript_tx.send(Transcript::new("pump on", 1.0)).await.unwrap();
        transcript_tx.send(Transcript::new("status", 1.0)).await.unwrap();
        drop(transcript_tx);

        serve(Arc::new(interpreter), transcript_rx, event_tx).await;

        assert_eq!(
            event_rx.try_recv().unwrap(),
            VoiceEvent::IntentDispatched { intent: Intent::PumpOn }
        );
        assert_eq!(
            event_rx.try_recv().unwrap(),
            VoiceEvent::IntentDispatched {
                intent: Intent::StatusQuery
            }
        );
        assert_eq!(
            speaker.spoken(),
            vec![PUMP_ON_REPLY, STATUS_REPLY, "The pump is currently off."]
        );
    }
}
