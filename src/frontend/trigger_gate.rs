//! Display-side trigger acceptance
//!
//! The sampler reports every matching crossing. This gate decides which of
//! them the display acts on: `holdoff` ignores events that arrive too soon
//! after the last accepted one, and `holding` freezes the display after one
//! accepted event until [`TriggerGate::rearm`] is called. Nothing here
//! feeds back into the sampler.

use crate::config::TriggerConfig;
use crate::types::TriggerEvent;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct TriggerGate {
    holding: bool,
    holdoff: Duration,
    last_accepted: Option<Instant>,
    last_event: Option<TriggerEvent>,
    frozen: bool,
    accepted: u64,
    suppressed: u64,
}

impl TriggerGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take holding/holdoff from a trigger configuration and rearm
    pub fn configure(&mut self, config: &TriggerConfig) {
        self.holding = config.holding;
        self.holdoff = config.holdoff;
        self.rearm();
    }

    /// Offer an event observed at `now`; returns whether it was accepted
    pub fn offer(&mut self, event: TriggerEvent, now: Instant) -> bool {
        if self.frozen {
            self.suppressed += 1;
            return false;
        }
        if let Some(last) = self.last_accepted {
            if now.saturating_duration_since(last) < self.holdoff {
                self.suppressed += 1;
                return false;
            }
        }

        self.last_accepted = Some(now);
        self.last_event = Some(event);
        self.accepted += 1;
        if self.holding {
            self.frozen = true;
        }
        true
    }

    /// Unfreeze and forget the holdoff window
    pub fn rearm(&mut self) {
        self.frozen = false;
        self.last_accepted = None;
    }

    /// Whether the display is holding a captured sweep
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Most recently accepted event
    pub fn last_event(&self) -> Option<&TriggerEvent> {
        self.last_event.as_ref()
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }
}
