//! Firebase realtime database pump client
//!
//! The pump is driven through the `controls` record:
//! `{"pump": bool, "manual_override": bool}`. Writes are partial
//! (`PATCH`) so the automation's other fields are left untouched.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{PumpControl, PumpError};

/// Pump controller backed by the Firebase REST API
pub struct FirebasePump {
    agent: ureq::Agent,
    controls_url: String,
}

#[derive(Debug, Default, Deserialize)]
struct Controls {
    #[serde(default)]
    pump: Option<bool>,
}

impl FirebasePump {
    /// Create a client for the database at `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .user_agent(concat!("aquaclima-voice/", env!("CARGO_PKG_VERSION")))
            .build();

        Self {
            agent,
            controls_url: controls_url(base_url),
        }
    }

    fn patch(&self, body: serde_json::Value) -> Result<(), PumpError> {
        debug!(url = %self.controls_url, %body, "updating pump controls");
        self.agent
            .request("PATCH", &self.controls_url)
            .set("Content-Type", "application/json")
            .send_json(body)?;
        Ok(())
    }
}

impl PumpControl for FirebasePump {
    fn set_pump(&self, on: bool, manual_override: bool) -> Result<(), PumpError> {
        self.patch(json!({ "pump": on, "manual_override": manual_override }))
    }

    fn reset_auto_mode(&self) -> Result<(), PumpError> {
        self.patch(json!({ "manual_override": false }))
    }

    fn query_pump_status(&self) -> Result<bool, PumpError> {
        let response = self.agent.get(&self.controls_url).call()?;
        // An empty database answers `null`
        let controls: Option<Controls> = response
            .into_json()
            .map_err(|e| PumpError::Decode(e.to_string()))?;
        Ok(controls.unwrap_or_default().pump.unwrap_or(false))
    }
}

fn controls_url(base_url: &str) -> String {
    format!("{}/controls.json", base_url.trim_end_matches('/'))
}
