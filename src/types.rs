//! Core data types for rtscope
//!
//! This module contains the small value types shared by the real-time
//! producer and the consumer side of the acquisition pipeline.
//!
//! # Main Types
//!
//! - [`ValueKind`] - Closed set of value kinds a signal source exposes
//! - [`SourceId`] - Opaque handle to a source in the external source registry
//! - [`ChannelId`] - Handle to a monitored channel in the channel registry
//! - [`TriggerDirection`] / [`Edge`] - Configured trigger direction and detected crossing
//! - [`TriggerEvent`] - Out-of-band notification of a threshold crossing
//! - [`PipelineStats`] - Snapshot of producer and consumer counters

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of value a channel reads from its source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// Source input
    #[default]
    Input,
    /// Source output
    Output,
    /// Tunable parameter
    Parameter,
    /// Internal state variable
    State,
}

impl ValueKind {
    /// All kinds in display order
    pub const ALL: [ValueKind; 4] = [
        ValueKind::Input,
        ValueKind::Output,
        ValueKind::Parameter,
        ValueKind::State,
    ];
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Input => write!(f, "input"),
            ValueKind::Output => write!(f, "output"),
            ValueKind::Parameter => write!(f, "parameter"),
            ValueKind::State => write!(f, "state"),
        }
    }
}

/// Opaque handle to a signal source
///
/// The channel registry never owns a source; it only stores this handle and
/// resolves it through the source registry when sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(pub u32);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to a channel in the channel registry
///
/// Handles are never reused within one registry, so a stale handle can only
/// fail lookups, never alias a newer channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub(crate) u64);

impl ChannelId {
    /// Raw handle value
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A detected threshold crossing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Edge {
    /// The signal moved from below the threshold to above it
    Rising,
    /// The signal moved from above the threshold to below it
    Falling,
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Rising => write!(f, "Rising"),
            Edge::Falling => write!(f, "Falling"),
        }
    }
}

/// Which crossings the trigger reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TriggerDirection {
    /// Triggering disabled
    #[default]
    None,
    /// Report rising crossings only
    Rising,
    /// Report falling crossings only
    Falling,
    /// Report crossings in either direction
    Any,
}

impl TriggerDirection {
    /// Whether a crossing in `edge` direction should be reported
    pub fn accepts(self, edge: Edge) -> bool {
        match self {
            TriggerDirection::None => false,
            TriggerDirection::Rising => edge == Edge::Rising,
            TriggerDirection::Falling => edge == Edge::Falling,
            TriggerDirection::Any => true,
        }
    }
}

impl fmt::Display for TriggerDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerDirection::None => write!(f, "None"),
            TriggerDirection::Rising => write!(f, "Rising Edge"),
            TriggerDirection::Falling => write!(f, "Falling Edge"),
            TriggerDirection::Any => write!(f, "Any Edge"),
        }
    }
}

/// Notification that the trigger channel crossed the threshold
///
/// Delivered through the trigger sink, never through the frame queue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerEvent {
    /// Channel the crossing was detected on
    pub channel: ChannelId,
    /// Source the channel reads from
    pub source: SourceId,
    /// Value kind of the channel
    pub kind: ValueKind,
    /// Value index of the channel
    pub index: usize,
    /// Crossing direction
    pub edge: Edge,
    /// Threshold that was crossed
    pub threshold: f64,
}

/// Snapshot of pipeline counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Real-time periods executed while enabled
    pub periods: u64,
    /// Periods skipped because the shared sampler state was busy
    pub missed_periods: u64,
    /// Framed records written to the frame queue
    pub frames_written: u64,
    /// Framed records dropped because the queue was full
    pub frames_dropped: u64,
    /// Trigger events emitted by the sampler
    pub trigger_events: u64,
    /// Trigger events a subscriber could not accept
    pub events_dropped: u64,
    /// Framed records distributed to waveforms
    pub frames_drained: u64,
    /// Framed records discarded because their count did not match the channel set
    pub frames_discarded: u64,
}

impl PipelineStats {
    /// Percentage of written-or-dropped frames that made it into the queue
    pub fn delivery_rate(&self) -> f64 {
        let total = self.frames_written + self.frames_dropped;
        if total == 0 {
            100.0
        } else {
            (self.frames_written as f64 / total as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_accepts() {
        assert!(!TriggerDirection::None.accepts(Edge::Rising));
        assert!(!TriggerDirection::None.accepts(Edge::Falling));
        assert!(TriggerDirection::Rising.accepts(Edge::Rising));
        assert!(!TriggerDirection::Rising.accepts(Edge::Falling));
        assert!(TriggerDirection::Falling.accepts(Edge::Falling));
        assert!(!TriggerDirection::Falling.accepts(Edge::Rising));
        assert!(TriggerDirection::Any.accepts(Edge::Rising));
        assert!(TriggerDirection::Any.accepts(Edge::Falling));
    }

    #[test]
    fn test_value_kind_serialization() {
        let json = serde_json::to_string(&ValueKind::Parameter).unwrap();
        assert_eq!(json, "\"parameter\"");
        let kind: ValueKind = serde_json::from_str("\"state\"").unwrap();
        assert_eq!(kind, ValueKind::State);
    }

    #[test]
    fn test_source_id_transparent() {
        let json = serde_json::to_string(&SourceId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_delivery_rate() {
        let stats = PipelineStats::default();
        assert_eq!(stats.delivery_rate(), 100.0);

        let stats = PipelineStats {
            frames_written: 3,
            frames_dropped: 1,
            ..Default::default()
        };
        assert!((stats.delivery_rate() - 75.0).abs() < 1e-9);
    }
}
