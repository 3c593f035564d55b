//! IPC module for daemon-client communication
//!
//! Clients stand in for the dashboard's mic button and push-to-talk key,
//! and may subscribe to voice events to drive their own indicator.

mod protocol;
mod server;

pub use server::Server;
