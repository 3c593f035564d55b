//! Pulsing "listening" indicator
//!
//! While a session is listening the indicator alternates between a bright
//! and a dim glow at a fixed interval. Phases are published as
//! `VoiceEvent::IndicatorPulse` so any attached UI can mirror them.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::events::VoiceEvent;

/// Visual phase of the indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlowPhase {
    /// Strong glow
    Bright,
    /// Faint glow
    Dim,
    /// Not listening
    Rest,
}

/// Owns the single glow timer task
pub struct GlowIndicator {
    interval: Duration,
    event_tx: broadcast::Sender<VoiceEvent>,
    timer: Option<JoinHandle<()>>,
}

impl GlowIndicator {
    pub fn new(interval: Duration, event_tx: broadcast::Sender<VoiceEvent>) -> Self {
        Self {
            interval,
            event_tx,
            timer: None,
        }
    }

    /// Start pulsing, replacing any running timer
    pub fn start(&mut self) {
        self.cancel_timer();

        let event_tx = self.event_tx.clone();
        let period = self.interval;

        self.timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            let mut bright = true;
            loop {
                ticker.tick().await;
                let phase = if bright { GlowPhase::Bright } else { GlowPhase::Dim };
                let _ = event_tx.send(VoiceEvent::IndicatorPulse { phase });
                bright = !bright;
            }
        }));

        debug!(interval_ms = period.as_millis() as u64, "indicator started");
    }

    /// Stop pulsing and return to the rest phase
    pub fn stop(&mut self) {
        if self.cancel_timer() {
            let _ = self.event_tx.send(VoiceEvent::IndicatorPulse {
                phase: GlowPhase::Rest,
            });
            debug!("indicator stopped");
        }
    }

    /// Check whether a glow timer is running
    #[cfg(test)]
    pub fn is_active(&self) -> bool {
        self.timer.is_some()
    }

    fn cancel_timer(&mut self) -> bool {
        match self.timer.take() {
            Some(timer) => {
                timer.abort();
                true
            }
            None => false,
        }
    }
}

impl Drop for GlowIndicator {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain_phases(rx: &mut broadcast::Receiver<VoiceEvent>) -> Vec<GlowPhase> {
        let mut phases = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let VoiceEvent::IndicatorPulse { phase } = event {
                phases.push(phase);
            }
        }
        phases
    }

    #[tokio::test(start_paused = true)]
    async fn test_indicator_alternates_phases() {
        let (tx, mut rx) = broadcast::channel(32);
        let mut indicator = GlowIndicator::new(Duration::from_millis(500), tx);

        indicator.start();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(
            drain_phases(&mut rx),
            vec![GlowPhase::Bright, GlowPhase::Dim, GlowPhase::Bright]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_keeps_a_single_timer() {
        let (tx, mut rx) = broadcast::channel(32);
        let mut indicator = GlowIndicator::new(Duration::from_millis(500), tx);

        indicator.start();
        indicator.start();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        // Two live timers would double the pulse count
        assert_eq!(drain_phases(&mut rx).len(), 3);
        assert!(indicator.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_rests_and_silences() {
        let (tx, mut rx) = broadcast::channel(32);
        let mut indicator = GlowIndicator::new(Duration::from_millis(500), tx);

        indicator.start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        indicator.stop();
        assert!(!indicator.is_active());

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(drain_phases(&mut rx), vec![GlowPhase::Bright, GlowPhase::Rest]);
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_silent() {
        let (tx, mut rx) = broadcast::channel(4);
        let mut indicator = GlowIndicator::new(Duration::from_millis(500), tx);

        indicator.stop();
        assert!(drain_phases(&mut rx).is_empty());
    }
}
