//! Transcript classification
//!
//! Rules are checked in a fixed order and the first match wins. All
//! checks are case-insensitive substring or regex tests, so a phrase
//! containing several trigger words takes the earliest rule.

use regex::Regex;
use serde::{Deserialize, Serialize};

const PUMP_ON_PHRASES: &[&str] = &["turn on", "pump on", "start pump"];
const PUMP_OFF_PHRASES: &[&str] = &["turn off", "pump off", "stop pump"];
const AUTO_MODE_PHRASES: &[&str] = &["auto mode", "automatic"];
const STATUS_PHRASES: &[&str] = &["status"];

/// Name variants recognizers commonly produce for "Clima"
pub const DEFAULT_WAKE_NAMES: &[&str] = &["clima", "cleema", "klima", "climah"];

/// Default wake prefix: any utterance opening with a word starting "cli"
pub const DEFAULT_WAKE_PREFIX: &str = "cli";

/// What a transcript asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// The assistant was addressed by name
    WakeAck,
    PumpOn,
    PumpOff,
    /// Hand control back to the automation
    AutoMode,
    StatusQuery,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::WakeAck => "wake_ack",
            Intent::PumpOn => "pump_on",
            Intent::PumpOff => "pump_off",
            Intent::AutoMode => "auto_mode",
            Intent::StatusQuery => "status_query",
            Intent::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the assistant's name is detected
#[derive(Debug, Clone)]
pub enum WakeWord {
    /// Any of these literal variants appears anywhere in the text
    Names(Vec<String>),
    /// The text opens with a word matching this anchored pattern
    Prefix(Regex),
}

impl WakeWord {
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::Names(
            names
                .into_iter()
                .map(|name| name.as_ref().trim().to_lowercase())
                .filter(|name| !name.is_empty())
                .collect(),
        )
    }

    pub fn prefix(prefix: &str) -> Result<Self, regex::Error> {
        let pattern = format!("^{}[a-z]*", regex::escape(&prefix.trim().to_lowercase()));
        Ok(Self::Prefix(Regex::new(&pattern)?))
    }

    /// Test already-normalized text
    pub fn matches(&self, normalized: &str) -> bool {
        match self {
            WakeWord::Names(names) => names.iter().any(|name| normalized.contains(name.as_str())),
            WakeWord::Prefix(pattern) => pattern.is_match(normalized),
        }
    }
}

impl Default for WakeWord {
    fn default() -> Self {
        Self::names(DEFAULT_WAKE_NAMES)
    }
}

/// Classify a transcript
pub fn classify(wake: &WakeWord, text: &str) -> Intent {
    let normalized = text.trim().to_lowercase();
    let contains_any = |phrases: &[&str]| phrases.iter().any(|p| normalized.contains(p));

    if wake.matches(&normalized) {
        Intent::WakeAck
    } else if contains_any(PUMP_ON_PHRASES) {
        Intent::PumpOn
    } else if contains_any(PUMP_OFF_PHRASES) {
        Intent::PumpOff
    } else if contains_any(AUTO_MODE_PHRASES) {
        Intent::AutoMode
    } else if contains_any(STATUS_PHRASES) {
        Intent::StatusQuery
    } else {
        Intent::Unknown
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn prefix_wake() -> WakeWord {
        WakeWord::prefix(DEFAULT_WAKE_PREFIX).unwrap()
    }

    #[test]
    fn test_wake_word_wins_over_commands() {
        assert_eq!(classify(&WakeWord::default(), "clima turn off"), Intent::WakeAck);
        assert_eq!(classify(&prefix_wake(), "clima turn off"), Intent::WakeAck);
        assert_eq!(classify(&WakeWord::default(), "hey klima pump on"), Intent::WakeAck);
    }

    #[test]
    fn test_name_variants() {
        let wake = WakeWord::default();
        for text in ["Clima", "hey cleema", "KLIMA?", "climah please"] {
            assert_eq!(classify(&wake, text), Intent::WakeAck, "{text}");
        }
    }

    #[test]
    fn test_prefix_is_anchored() {
        let wake = prefix_wake();
        assert_eq!(classify(&wake, "climate report"), Intent::WakeAck);
        // Not at the start, so the command rules apply
        assert_eq!(classify(&wake, "hey clima turn on"), Intent::PumpOn);
    }

    #[test]
    fn test_prefix_escapes_metacharacters() {
        let wake = WakeWord::prefix("c.i").unwrap();
        assert!(wake.matches("c.ima"));
        assert!(!wake.matches("cxima"));
    }

    #[test]
    fn test_commands() {
        let wake = WakeWord::default();
        assert_eq!(classify(&wake, "please turn off the pump now"), Intent::PumpOff);
        assert_eq!(classify(&wake, "Start pump"), Intent::PumpOn);
        assert_eq!(classify(&wake, "stop pump"), Intent::PumpOff);
        assert_eq!(classify(&wake, "go automatic"), Intent::AutoMode);
        assert_eq!(classify(&wake, "auto mode please"), Intent::AutoMode);
        assert_eq!(classify(&wake, "what's the status"), Intent::StatusQuery);
        assert_eq!(classify(&wake, "what's the weather"), Intent::Unknown);
        assert_eq!(classify(&wake, ""), Intent::Unknown);
    }

    #[test]
    fn test_earlier_rule_wins() {
        let wake = WakeWord::default();
        assert_eq!(classify(&wake, "turn off then turn on"), Intent::PumpOn);
        assert_eq!(classify(&wake, "pump off and automatic"), Intent::PumpOff);
        assert_eq!(classify(&wake, "automatic status"), Intent::AutoMode);
    }

    #[test]
    fn test_empty_names_are_dropped() {
        let wake = WakeWord::names(["", "  ", "Nova"]);
        assert!(matches!(&wake, WakeWord::Names(names) if names == &["nova".to_string()]));
        assert_eq!(classify(&wake, "status"), Intent::StatusQuery);
    }

    #[test]
    fn test_intent_display() {
        assert_eq!(Intent::StatusQuery.to_string(), "status_query");
    }

    // Filler built from letters that cannot spell any trigger phrase
    const FILLER: &str = "[xyz ]{0,16}";
    const TRAILING_COMMANDS: &[&str] = &["", " pump on", " turn off", " status"];

    proptest! {
        #[test]
        fn prop_wake_name_always_acknowledged(
            pre in FILLER,
            suf in FILLER,
            name in prop::sample::select(DEFAULT_WAKE_NAMES),
            command in prop::sample::select(TRAILING_COMMANDS),
        ) {
            let text = format!("{pre}{name}{command}{suf}");
            prop_assert_eq!(classify(&WakeWord::default(), &text), Intent::WakeAck);
        }

        #[test]
        fn prop_pump_off_phrase_is_pump_off(pre in FILLER, suf in FILLER) {
            let text = format!("{pre}pump off{suf}");
            prop_assert_eq!(classify(&WakeWord::default(), &text), Intent::PumpOff);
            prop_assert_eq!(classify(&prefix_wake(), &text), Intent::PumpOff);
        }

        #[test]
        fn prop_classification_ignores_case(text in "[a-z ]{0,24}") {
            let wake = WakeWord::default();
            prop_assert_eq!(classify(&wake, &text.to_uppercase()), classify(&wake, &text));
        }
    }
}
