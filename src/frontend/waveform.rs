//! Per-channel waveform storage and trace display attributes

use crate::backend::ChannelDescriptor;
use crate::config::{scale_label, TraceStyle};
use crate::types::{ChannelId, SourceId, ValueKind};
use std::collections::VecDeque;
use std::time::Duration;

/// Rolling window of the most recent samples of one channel
#[derive(Debug, Clone)]
pub struct Waveform {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl Waveform {
    /// Create an empty waveform holding at most `capacity` samples
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest one when full
    #[inline]
    pub fn push(&mut self, value: f64) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    /// Change the window size, keeping the newest samples
    pub fn resize(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent sample
    pub fn last(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    /// Samples, oldest first
    pub fn samples(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }

    /// Samples as plot points (time in seconds relative to the oldest, value)
    pub fn as_plot_points(&self, period: Duration) -> Vec<[f64; 2]> {
        let dt = period.as_secs_f64();
        self.samples
            .iter()
            .enumerate()
            .map(|(i, v)| [i as f64 * dt, *v])
            .collect()
    }

    /// Minimum and maximum over finite samples
    pub fn value_range(&self) -> Option<(f64, f64)> {
        let mut finite = self.samples.iter().copied().filter(|v| v.is_finite());
        let first = finite.next()?;
        Some(finite.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }
}

/// Consumer-side view of one channel: identity, display settings and data
#[derive(Debug, Clone)]
pub struct Trace {
    pub id: ChannelId,
    pub source: SourceId,
    pub kind: ValueKind,
    pub index: usize,
    /// Name of the value, e.g. "3 Sine output 0"
    pub name: String,
    /// Display name of the source, used in the label
    pub source_name: String,
    pub scale: f64,
    pub offset: f64,
    pub style: TraceStyle,
    pub label: String,
    pub waveform: Waveform,
}

impl Trace {
    pub fn new(
        descriptor: &ChannelDescriptor,
        source_name: impl Into<String>,
        style: TraceStyle,
        capacity: usize,
    ) -> Self {
        let mut trace = Self {
            id: descriptor.id(),
            source: descriptor.source,
            kind: descriptor.kind,
            index: descriptor.index,
            name: descriptor.name.clone(),
            source_name: source_name.into(),
            scale: descriptor.scale,
            offset: descriptor.offset,
            style,
            label: String::new(),
            waveform: Waveform::new(capacity),
        };
        trace.update_label();
        trace
    }

    /// Rebuild the label after a scale change
    pub fn update_label(&mut self) {
        self.label = format!(
            "{} {} {}",
            self.source,
            self.source_name,
            scale_label(self.scale)
        );
    }

    /// Convert a sample to display divisions
    pub fn to_divisions(&self, value: f64) -> f64 {
        (value + self.offset) / self.scale
    }
}
