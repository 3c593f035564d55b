//! Pump control collaborator
//!
//! The interpreter drives the irrigation pump through this interface.
//! The production implementation talks to the rig's realtime database.

mod firebase;

pub use firebase::FirebasePump;

/// Operations the voice layer may perform on the pump
pub trait PumpControl: Send + Sync {
    /// Switch the pump, optionally taking it out of automatic control
    fn set_pump(&self, on: bool, manual_override: bool) -> Result<(), PumpError>;

    /// Hand control back to the automation
    fn reset_auto_mode(&self) -> Result<(), PumpError>;

    /// Read whether the pump is currently running
    fn query_pump_status(&self) -> Result<bool, PumpError>;
}

/// Errors that can occur talking to the pump controller
#[derive(Debug, thiserror::Error)]
pub enum PumpError {
    #[error("pump controller returned HTTP {0}")]
    Status(u16),

    #[error("pump controller unreachable: {0}")]
    Transport(String),

    #[error("invalid pump controls payload: {0}")]
    Decode(String),
}

impl From<ureq::Error> for PumpError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, _) => PumpError::Status(status),
            ureq::Error::Transport(transport) => PumpError::Transport(transport.to_string()),
        }
    }
}
