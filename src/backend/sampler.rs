//! Trigger-aware sampler
//!
//! [`Sampler::execute`] is the body of one real-time period:
//!
//! 1. Read every registered channel in registry order
//! 2. On the trigger channel, test whether the threshold lies strictly
//!    between the previous and the current value and post a
//!    [`TriggerEvent`] if the crossing matches the configured direction
//! 3. Store the current value as the channel's previous value
//! 4. Write one framed record with all values to the frame queue
//!
//! The period never blocks, logs or allocates (once the encode buffers are
//! sized by the quiesced insert path). A full queue drops the frame; a busy
//! trigger subscriber drops the event. Both are counted in
//! [`ProducerCounters`].

use crate::backend::events::TriggerSink;
use crate::backend::fifo::FrameWriter;
use crate::backend::registry::{ChannelDescriptor, ChannelRegistry, ChannelSpec};
use crate::backend::source::SourceLookup;
use crate::config::TriggerConfig;
use crate::error::{Result, ScopeError};
use crate::types::{ChannelId, Edge, PipelineStats, SourceId, TriggerEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

/// Counters written by the real-time thread
#[derive(Debug, Default)]
pub struct ProducerCounters {
    pub periods: AtomicU64,
    pub missed_periods: AtomicU64,
    pub frames_written: AtomicU64,
    pub frames_dropped: AtomicU64,
    pub trigger_events: AtomicU64,
    pub events_dropped: AtomicU64,
}

impl ProducerCounters {
    /// Copy the producer counters into `stats`
    pub fn fill(&self, stats: &mut PipelineStats) {
        stats.periods = self.periods.load(Ordering::Relaxed);
        stats.missed_periods = self.missed_periods.load(Ordering::Relaxed);
        stats.frames_written = self.frames_written.load(Ordering::Relaxed);
        stats.frames_dropped = self.frames_dropped.load(Ordering::Relaxed);
        stats.trigger_events = self.trigger_events.load(Ordering::Relaxed);
        stats.events_dropped = self.events_dropped.load(Ordering::Relaxed);
    }
}

/// Direction of a threshold crossing between two consecutive samples
///
/// A crossing exists only when `threshold` lies strictly between `previous`
/// and `current`. Touching the threshold, a flat signal, or a NaN on either
/// side is not a crossing.
pub fn detect_crossing(threshold: f64, previous: f64, current: f64) -> Option<Edge> {
    if threshold > current && threshold < previous {
        Some(Edge::Falling)
    } else if threshold < current && threshold > previous {
        Some(Edge::Rising)
    } else {
        None
    }
}

/// Producer state: the channel registry, trigger configuration and the
/// writer half of the frame queue
pub struct Sampler {
    registry: ChannelRegistry,
    trigger: TriggerConfig,
    writer: FrameWriter,
    /// Values of the current period, in registry order
    values: Vec<f64>,
    sink: Arc<dyn TriggerSink>,
    counters: Arc<ProducerCounters>,
}

impl Sampler {
    pub fn new(
        writer: FrameWriter,
        sink: Arc<dyn TriggerSink>,
        counters: Arc<ProducerCounters>,
    ) -> Self {
        Self {
            registry: ChannelRegistry::new(),
            trigger: TriggerConfig::default(),
            writer,
            values: Vec::new(),
            sink,
            counters,
        }
    }

    /// Run one period
    pub fn execute(&mut self, sources: &dyn SourceLookup) {
        self.counters.periods.fetch_add(1, Ordering::Relaxed);
        if self.registry.is_empty() {
            return;
        }

        let trigger = self.trigger;
        let watched = if trigger.is_armed() {
            trigger.channel
        } else {
            None
        };

        self.values.clear();
        for channel in self.registry.iter_mut() {
            let value = sources
                .value(channel.source, channel.kind, channel.index)
                .unwrap_or(f64::NAN);

            if watched == Some(channel.id()) {
                if let Some(edge) = detect_crossing(trigger.threshold, channel.previous, value) {
                    if trigger.direction.accepts(edge) {
                        let event = TriggerEvent {
                            channel: channel.id(),
                            source: channel.source,
                            kind: channel.kind,
                            index: channel.index,
                            edge,
                            threshold: trigger.threshold,
                        };
                        self.counters.trigger_events.fetch_add(1, Ordering::Relaxed);
                        if !self.sink.post(event) {
                            self.counters.events_dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            }

            channel.previous = value;
            self.values.push(value);
        }

        if self.writer.write_frame(&self.values) {
            self.counters.frames_written.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.frames_dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    pub fn trigger(&self) -> &TriggerConfig {
        &self.trigger
    }

    pub fn counters(&self) -> &Arc<ProducerCounters> {
        &self.counters
    }

    /// Append a channel, sizing the period buffers for the new width
    pub fn insert(&mut self, spec: ChannelSpec) -> ChannelId {
        let id = self.registry.insert(spec);
        let width = self.registry.len();
        self.values.reserve(width.saturating_sub(self.values.len()));
        self.writer.reserve_frame(width);
        id
    }

    /// Remove a channel, disabling the trigger if it watched that channel
    pub fn remove(&mut self, id: ChannelId) -> Option<ChannelDescriptor> {
        let removed = self.registry.remove(id)?;
        if self.trigger.channel == Some(id) {
            self.trigger.disable();
        }
        Some(removed)
    }

    /// Remove every channel reading from `source`
    pub fn remove_source(&mut self, source: SourceId) -> Vec<ChannelDescriptor> {
        let removed = self.registry.remove_source(source);
        if let Some(watched) = self.trigger.channel {
            if removed.iter().any(|c| c.id() == watched) {
                self.trigger.disable();
            }
        }
        removed
    }

    /// Mutable access to one descriptor
    pub fn channel_mut(&mut self, id: ChannelId) -> Option<&mut ChannelDescriptor> {
        self.registry.get_mut(id)
    }

    /// Replace the trigger configuration
    ///
    /// A trigger without a channel is stored with direction `None`.
    pub fn set_trigger(&mut self, config: TriggerConfig) -> Result<TriggerConfig> {
        if let Some(id) = config.channel {
            if self.registry.get(id).is_none() {
                return Err(ScopeError::UnknownChannel(id));
            }
        }
        self.trigger = config.normalized();
        Ok(self.trigger)
    }
}

/// Sampler shared between the real-time thread and the scope
///
/// The real-time thread only ever `try_lock`s, so it never waits on the
/// consumer. The consumer only locks while the producer is quiesced, so the
/// real-time thread never finds the lock taken while it is enabled.
#[derive(Clone)]
pub struct SharedSampler(Arc<Mutex<Sampler>>);

impl SharedSampler {
    pub fn new(sampler: Sampler) -> Self {
        Self(Arc::new(Mutex::new(sampler)))
    }

    /// Run one period if the state is free; returns `false` if it was busy
    pub(crate) fn try_execute(&self, sources: &dyn SourceLookup) -> bool {
        match self.0.try_lock() {
            Ok(mut sampler) => {
                sampler.execute(sources);
                true
            }
            Err(TryLockError::Poisoned(poisoned)) => {
                poisoned.into_inner().execute(sources);
                true
            }
            Err(TryLockError::WouldBlock) => false,
        }
    }

    /// Exclusive access for a quiesced mutation
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Sampler>> {
        self.0
            .lock()
            .map_err(|e| ScopeError::Poisoned(e.to_string()))
    }
}
