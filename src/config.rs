//! Configuration loading and management
//!
//! Sources, later ones winning: built-in defaults, the optional
//! `config.json` in the data directory, then `AQUACLIMA_*` environment
//! variables.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::engine::VoiceSettings;
use crate::interpreter::{WakeWord, DEFAULT_WAKE_NAMES, DEFAULT_WAKE_PREFIX};

/// Which speech engine to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognizerKind {
    /// Phrases typed on stdin
    Console,
    /// No engine; voice control stays inert
    #[serde(rename = "none")]
    Disabled,
}

impl FromStr for RecognizerKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "console" => Ok(Self::Console),
            "none" | "disabled" => Ok(Self::Disabled),
            other => bail!("unknown recognizer {other:?}, expected console or none"),
        }
    }
}

/// How the wake word is detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WakeMode {
    /// Literal name variants anywhere in the phrase
    Names,
    /// Anchored prefix at the start of the phrase
    Prefix,
}

impl FromStr for WakeMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "names" => Ok(Self::Names),
            "prefix" => Ok(Self::Prefix),
            other => bail!("unknown wake mode {other:?}, expected names or prefix"),
        }
    }
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Realtime database root; no pump controller when absent
    pub firebase_url: Option<String>,

    /// Timeout for each pump controller request
    pub http_timeout: Duration,

    pub recognizer: RecognizerKind,

    /// Recognition locale
    pub locale: String,

    pub wake_mode: WakeMode,
    pub wake_names: Vec<String>,
    pub wake_prefix: String,

    /// Always-listening: restart recognition after each session ends
    pub auto_restart: bool,
    pub restart_delay: Duration,

    /// An explicit stop holds off auto-restart until the next explicit start
    pub stop_suspends_restart: bool,

    /// Period of the listening indicator glow
    pub indicator_interval: Duration,

    /// Text-to-speech voice
    pub voice: VoiceSettings,

    /// External TTS program; speech is only logged when absent
    pub tts_command: Option<String>,
}

/// Optional overrides read from `config.json`
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    socket_path: Option<PathBuf>,
    firebase_url: Option<String>,
    http_timeout_ms: Option<u64>,
    recognizer: Option<RecognizerKind>,
    locale: Option<String>,
    wake_mode: Option<WakeMode>,
    wake_names: Option<Vec<String>>,
    wake_prefix: Option<String>,
    auto_restart: Option<bool>,
    restart_delay_ms: Option<u64>,
    stop_suspends_restart: Option<bool>,
    indicator_interval_ms: Option<u64>,
    voice: Option<VoiceSettings>,
    tts_command: Option<String>,
}

impl Config {
    /// Load configuration from defaults, config file and environment
    pub fn load() -> Result<Self> {
        let home = std::env::var("HOME").context("HOME is not set")?;
        Self::load_from(Path::new(&home), |key| std::env::var(key).ok())
    }

    fn load_from(home: &Path, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::defaults(home);

        let file_path = config.file_path();
        if file_path.exists() {
            let contents = std::fs::read_to_string(&file_path)
                .with_context(|| format!("failed to read {}", file_path.display()))?;
            config
                .apply_file(&contents)
                .with_context(|| format!("invalid config file {}", file_path.display()))?;
        }

        config.apply_env(var)?;
        config.validate()?;
        Ok(config)
    }

    /// Built-in defaults rooted at `home`
    pub fn defaults(home: &Path) -> Self {
        let data_dir = home.join(".local").join("share").join("aquaclima");
        let socket_path = data_dir.join("voice.sock");

        Self {
            socket_path,
            data_dir,
            firebase_url: None,
            http_timeout: Duration::from_secs(5),
            recognizer: RecognizerKind::Console,
            locale: "en-IN".to_string(),
            wake_mode: WakeMode::Names,
            wake_names: DEFAULT_WAKE_NAMES.iter().map(|s| s.to_string()).collect(),
            wake_prefix: DEFAULT_WAKE_PREFIX.to_string(),
            auto_restart: false,
            restart_delay: Duration::from_millis(1200),
            stop_suspends_restart: false,
            indicator_interval: Duration::from_millis(500),
            voice: VoiceSettings::default(),
            tts_command: None,
        }
    }

    /// Location of the optional JSON config file
    pub fn file_path(&self) -> PathBuf {
        self.data_dir.join("config.json")
    }

    fn apply_file(&mut self, contents: &str) -> Result<()> {
        let file: FileConfig = serde_json::from_str(contents)?;

        if let Some(path) = file.socket_path {
            self.socket_path = path;
        }
        if file.firebase_url.is_some() {
            self.firebase_url = file.firebase_url;
        }
        if let Some(ms) = file.http_timeout_ms {
            self.http_timeout = Duration::from_millis(ms);
        }
        if let Some(recognizer) = file.recognizer {
            self.recognizer = recognizer;
        }
        if let Some(locale) = file.locale {
            self.locale = locale;
        }
        if let Some(mode) = file.wake_mode {
            self.wake_mode = mode;
        }
        if let Some(names) = file.wake_names {
            self.wake_names = names;
        }
        if let Some(prefix) = file.wake_prefix {
            self.wake_prefix = prefix;
        }
        if let Some(auto_restart) = file.auto_restart {
            self.auto_restart = auto_restart;
        }
        if let Some(ms) = file.restart_delay_ms {
            self.restart_delay = Duration::from_millis(ms);
        }
        if let Some(suspend) = file.stop_suspends_restart {
            self.stop_suspends_restart = suspend;
        }
        if let Some(ms) = file.indicator_interval_ms {
            self.indicator_interval = Duration::from_millis(ms);
        }
        if let Some(voice) = file.voice {
            self.voice = voice;
        }
        if file.tts_command.is_some() {
            self.tts_command = file.tts_command;
        }

        Ok(())
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = var("AQUACLIMA_FIREBASE_URL") {
            self.firebase_url = Some(url).filter(|url| !url.trim().is_empty());
        }
        if let Some(mode) = var("AQUACLIMA_WAKE_MODE") {
            self.wake_mode = mode.parse()?;
        }
        if let Some(flag) = var("AQUACLIMA_AUTO_RESTART") {
            self.auto_restart = parse_flag(&flag)
                .with_context(|| format!("AQUACLIMA_AUTO_RESTART={flag:?} is not a boolean"))?;
        }
        if let Some(flag) = var("AQUACLIMA_STOP_SUSPENDS_RESTART") {
            self.stop_suspends_restart = parse_flag(&flag).with_context(|| {
                format!("AQUACLIMA_STOP_SUSPENDS_RESTART={flag:?} is not a boolean")
            })?;
        }
        if let Some(recognizer) = var("AQUACLIMA_RECOGNIZER") {
            self.recognizer = recognizer.parse()?;
        }
        if let Some(command) = var("AQUACLIMA_TTS_COMMAND") {
            self.tts_command = Some(command).filter(|c| !c.trim().is_empty());
        }
        if let Some(path) = var("AQUACLIMA_SOCKET") {
            self.socket_path = PathBuf::from(path);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.indicator_interval.is_zero() {
            bail!("indicator interval must be > 0");
        }
        if self.http_timeout.is_zero() {
            bail!("http timeout must be > 0");
        }
        if self.wake_mode == WakeMode::Names && self.wake_names.iter().all(|n| n.trim().is_empty()) {
            bail!("wake mode is names but no wake names are configured");
        }
        if self.wake_mode == WakeMode::Prefix && self.wake_prefix.trim().is_empty() {
            bail!("wake mode is prefix but the wake prefix is empty");
        }
        Ok(())
    }

    /// Build the wake-word matcher for the configured strategy
    pub fn wake_word(&self) -> Result<WakeWord> {
        match self.wake_mode {
            WakeMode::Names => Ok(WakeWord::names(&self.wake_names)),
            WakeMode::Prefix => WakeWord::prefix(&self.wake_prefix)
                .with_context(|| format!("invalid wake prefix {:?}", self.wake_prefix)),
        }
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
