//! Session module for the speech recognition lifecycle
//!
//! Provides an explicit two-state machine:
//! - Idle: no capture in progress
//! - Listening: the engine is capturing; the glow indicator pulses
//!
//! In the always-listening variant a session that ends is restarted
//! after a fixed delay.

mod indicator;
mod manager;

pub use indicator::GlowPhase;
pub use manager::{Control, SessionManager, SessionOptions, SessionState};
