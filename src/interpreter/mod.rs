//! Command interpreter module
//!
//! Turns finalized transcripts into intents and carries them out:
//! spoken confirmations through the speaker, pump changes through the
//! pump controller.

mod dispatcher;
mod intent;

pub use dispatcher::{serve, CommandInterpreter};
pub use intent::{Intent, WakeWord, DEFAULT_WAKE_NAMES, DEFAULT_WAKE_PREFIX};
