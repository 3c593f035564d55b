//! Text-to-speech output
//!
//! Speech is fire-and-forget: callers never wait for an utterance to
//! finish and failures are only logged.

use std::process::{Command, Stdio};
use std::thread;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Voice parameters applied to every utterance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    /// BCP 47 language tag
    pub lang: String,
    /// Speaking rate, 1.0 is normal
    pub rate: f32,
    /// Voice pitch, 1.0 is normal
    pub pitch: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            lang: "en-US".to_string(),
            rate: 0.95,
            pitch: 1.0,
        }
    }
}

/// A single phrase to be spoken
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub lang: String,
    pub rate: f32,
    pub pitch: f32,
}

impl Utterance {
    pub fn new(text: impl Into<String>, voice: &VoiceSettings) -> Self {
        Self {
            text: text.into(),
            lang: voice.lang.clone(),
            rate: voice.rate,
            pitch: voice.pitch,
        }
    }
}

/// A text-to-speech engine
pub trait Speaker: Send + Sync {
    fn speak(&self, utterance: &Utterance);
}

/// Speaker that writes utterances to the log
pub struct LogSpeaker;

impl Speaker for LogSpeaker {
    fn speak(&self, utterance: &Utterance) {
        info!(
            text = %utterance.text,
            lang = %utterance.lang,
            rate = utterance.rate,
            pitch = utterance.pitch,
            "speaking"
        );
    }
}

/// Words per minute of a TTS program at rate 1.0
const BASE_WPM: f32 = 175.0;

/// Speaker that runs an external TTS program.
///
/// Arguments may carry voice placeholders, substituted per utterance:
/// `{lang}`, `{rate}`, `{pitch}`, `{rate_wpm}` (rate scaled to words per
/// minute) and `{pitch_pct}` (pitch scaled to 0-99, 50 is normal). The text
/// replaces `{text}`, or is appended as the last argument when no argument
/// names it, e.g. `espeak -v {lang} -s {rate_wpm} -p {pitch_pct}`.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpeaker {
    program: String,
    args: Vec<String>,
}

impl CommandSpeaker {
    /// Parse a whitespace-separated command line such as `espeak -v en`
    pub fn parse(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }

    fn command(&self, utterance: &Utterance) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(self.args.iter().map(|arg| expand(arg, utterance)))
            .stdin(Stdio::null())
            .stdout(Stdio::null());
        if !self.args.iter().any(|arg| arg.contains("{text}")) {
            command.arg(&utterance.text);
        }
        command
    }
}

impl Speaker for CommandSpeaker {
    fn speak(&self, utterance: &Utterance) {
        debug!(program = %self.program, text = %utterance.text, "speaking");

        match self.command(utterance).spawn() {
            Ok(mut child) => {
                // Reap the child off-thread so speech never blocks dispatch
                let spawned = thread::Builder::new()
                    .name("tts-reaper".to_string())
                    .spawn(move || {
                        if let Err(e) = child.wait() {
                            warn!(?e, "tts process wait failed");
                        }
                    });
                if let Err(e) = spawned {
                    warn!(?e, "failed to spawn tts reaper thread");
                }
            }
            Err(e) => {
                warn!(?e, program = %self.program, "failed to run tts command");
            }
        }
    }
}

fn expand(arg: &str, utterance: &Utterance) -> String {
    if !arg.contains('{') {
        return arg.to_string();
    }

    let rate_wpm = (utterance.rate * BASE_WPM).round().max(1.0) as u32;
    let pitch_pct = (utterance.pitch * 50.0).round().clamp(0.0, 99.0) as u32;

    arg.replace("{lang}", &utterance.lang)
        .replace("{rate_wpm}", &rate_wpm.to_string())
        .replace("{pitch_pct}", &pitch_pct.to_string())
        .replace("{rate}", &utterance.rate.to_string())
        .replace("{pitch}", &utterance.pitch.to_string())
        .replace("{text}", &utterance.text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_voice() {
        let voice = VoiceSettings::default();
        assert_eq!(voice.lang, "en-US");
        assert!((voice.rate - 0.95).abs() < f32::EPSILON);
        assert_eq!(voice.pitch, 1.0);
    }

    #[test]
    fn test_utterance_takes_voice_settings() {
        let utterance = Utterance::new("Turning pump on.", &VoiceSettings::default());
        assert_eq!(utterance.text, "Turning pump on.");
        assert_eq!(utterance.lang, "en-US");
    }

    #[test]
    fn test_parse_command() {
        let speaker = CommandSpeaker::parse("espeak -v en-us").unwrap();
        assert_eq!(speaker.program, "espeak");
        assert_eq!(speaker.args, vec!["-v", "en-us"]);
        assert!(CommandSpeaker::parse("   ").is_none());
    }

    #[test]
    fn test_command_appends_text() {
        let speaker = CommandSpeaker::parse("say").unwrap();
        let command = speaker.command(&Utterance::new("hello", &VoiceSettings::default()));
        let args: Vec<_> = command.get_args().collect();
        assert_eq!(args, vec!["hello"]);
    }

    #[test]
    fn test_command_maps_voice_settings() {
        let speaker = CommandSpeaker::parse("espeak -v {lang} -s {rate_wpm} -p {pitch_pct}").unwrap();

        let normal = speaker.command(&Utterance::new("hello", &VoiceSettings::default()));
        let args: Vec<_> = normal.get_args().collect();
        assert_eq!(args, vec!["-v", "en-US", "-s", "166", "-p", "50", "hello"]);

        let voice = VoiceSettings {
            lang: "hi-IN".to_string(),
            rate: 2.0,
            pitch: 0.5,
        };
        let tuned = speaker.command(&Utterance::new("hello", &voice));
        let args: Vec<_> = tuned.get_args().collect();
        assert_eq!(args, vec!["-v", "hi-IN", "-s", "350", "-p", "25", "hello"]);
    }

    #[test]
    fn test_command_places_text_placeholder() {
        let speaker = CommandSpeaker::parse("tts --text={text} --lang {lang}").unwrap();
        let command = speaker.command(&Utterance::new("pump on", &VoiceSettings::default()));
        let args: Vec<_> = command.get_args().collect();
        assert_eq!(args, vec!["--text=pump on", "--lang", "en-US"]);
    }
}
