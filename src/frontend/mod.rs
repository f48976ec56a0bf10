//! Consumer side of the acquisition pipeline
//!
//! [`Scope`] is the explicitly owned context object the consumer thread
//! drives. It owns the real-time thread, the reader half of the frame queue
//! and one [`Trace`] per registered channel. Every change to the channel set
//! or the trigger goes through the quiescence barrier:
//!
//! 1. Disable the producer and wait for a barrier task to be acknowledged
//! 2. Mutate the registry / trigger through a [`Reconfigure`] token
//! 3. Flush frames written under the old channel set
//! 4. Restore the producer's previous enabled state
//!
//! [`Scope::poll`] is meant to be called from a low-frequency timer. It
//! drains complete frames into the waveforms and runs pending trigger
//! events through the display-side [`TriggerGate`].
//!
//! # Example
//!
//! ```ignore
//! use rtscope::backend::{AtomicSource, SourceRegistry};
//! use rtscope::config::ScopeConfig;
//! use rtscope::frontend::Scope;
//! use rtscope::types::ValueKind;
//! use std::sync::Arc;
//!
//! let sources = Arc::new(SourceRegistry::new());
//! let sine = sources.register(Arc::new(AtomicSource::new("Sine", 0, 1)));
//!
//! let mut scope = Scope::new(ScopeConfig::default(), sources)?;
//! let channel = scope.add_channel(sine, ValueKind::Output, 0)?;
//!
//! loop {
//!     std::thread::sleep(scope.config().drain_interval());
//!     scope.poll();
//! }
//! ```

pub mod drainer;
pub mod quiesce;
pub mod trigger_gate;
pub mod waveform;

pub use drainer::FrameDrainer;
pub use quiesce::{Barrier, Quiesced, Reconfigure};
pub use trigger_gate::TriggerGate;
pub use waveform::{Trace, Waveform};

use crate::backend::{
    frame_queue, ChannelDescriptor, ChannelSpec, ProducerCounters, RtThread, Sampler,
    SharedSampler, SourceRegistry, TriggerBus,
};
use crate::config::{
    ChannelRecord, ScopeConfig, ScopeProfile, Timebase, TraceStyle, TriggerConfig, TriggerRecord,
    DEFAULT_SCALE,
};
use crate::error::{Result, ResultExt, ScopeError};
use crate::types::{ChannelId, PipelineStats, SourceId, TriggerEvent, ValueKind};
use crossbeam_channel::Receiver;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Partial update of a channel's display settings
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChannelEdit {
    pub scale: Option<f64>,
    pub offset: Option<f64>,
    pub style: Option<TraceStyle>,
}

/// Outcome of an insert request under quiescence
enum Added {
    Existing(ChannelId),
    Inserted(ChannelDescriptor),
}

/// Consumer-side oscilloscope context
pub struct Scope {
    config: ScopeConfig,
    sources: Arc<SourceRegistry>,
    sampler: SharedSampler,
    counters: Arc<ProducerCounters>,
    barrier: Barrier,
    drainer: FrameDrainer,
    traces: Vec<Trace>,
    trigger: TriggerConfig,
    trigger_events: Receiver<TriggerEvent>,
    gate: TriggerGate,
    timebase: Timebase,
    paused: bool,
    // Dropped last so the real-time thread outlives everything above
    rt: RtThread,
}

impl Scope {
    /// Build the pipeline and start the real-time thread
    pub fn new(config: ScopeConfig, sources: Arc<SourceRegistry>) -> Result<Self> {
        let bus = TriggerBus::new(config.trigger_queue_capacity);
        Self::with_trigger_bus(config, sources, bus)
    }

    /// Like [`Scope::new`], delivering trigger events to `bus`'s existing
    /// subscribers as well as to the scope itself
    pub fn with_trigger_bus(
        config: ScopeConfig,
        sources: Arc<SourceRegistry>,
        mut bus: TriggerBus,
    ) -> Result<Self> {
        config.validate().context("Invalid scope configuration")?;

        let trigger_events = bus.subscribe();
        let (writer, reader) = frame_queue(config.fifo_capacity_bytes);
        let counters = Arc::new(ProducerCounters::default());
        let sampler = SharedSampler::new(Sampler::new(writer, Arc::new(bus), counters.clone()));

        let rt = RtThread::spawn(
            config.period(),
            sampler.clone(),
            sources.clone(),
            counters.clone(),
            config.event_queue_capacity,
        )?;
        let barrier = Barrier::new(rt.control().clone(), config.barrier_timeout());
        let drainer = FrameDrainer::new(reader, config.payload_wait());
        let timebase = config.timebase.clamped();

        tracing::info!(
            "Scope started (period {:?}, queue {} bytes, {} samples per screen)",
            config.period(),
            config.fifo_capacity_bytes,
            timebase.data_size(config.period())
        );

        Ok(Self {
            config,
            sources,
            sampler,
            counters,
            barrier,
            drainer,
            traces: Vec::new(),
            trigger: TriggerConfig::default(),
            trigger_events,
            gate: TriggerGate::new(),
            timebase,
            paused: false,
            rt,
        })
    }

    /// Run `f` against the producer state while it is quiesced
    ///
    /// Frames produced before the mutation are flushed before the producer
    /// is released.
    fn reconfigure<R>(&mut self, f: impl FnOnce(&mut Reconfigure<'_>) -> Result<R>) -> Result<R> {
        let quiesced = self.barrier.quiesce()?;
        let result = {
            let mut sampler = self.sampler.lock()?;
            let mut token = Reconfigure::new(&quiesced, &mut sampler)?;
            f(&mut token)
        };
        let flushed = self.drainer.reset();
        if flushed > 0 {
            tracing::debug!("Flushed {} stale bytes from the frame queue", flushed);
        }
        drop(quiesced);
        result
    }

    fn data_size(&self) -> usize {
        self.timebase.data_size(self.config.period())
    }

    fn source_name(&self, source: SourceId) -> String {
        self.sources
            .get(source)
            .map(|s| s.name().to_string())
            .unwrap_or_default()
    }

    /// Build the insert request for `kind[index]` of `source`
    fn channel_spec(&self, source: SourceId, kind: ValueKind, index: usize) -> Result<ChannelSpec> {
        let handle = self
            .sources
            .get(source)
            .ok_or(ScopeError::UnknownSource(source))?;
        let count = handle.count(kind);
        if index >= count {
            return Err(ScopeError::IndexOutOfRange {
                source_id: source,
                kind,
                index,
                count,
            });
        }
        Ok(ChannelSpec {
            source,
            kind,
            index,
            name: format!("{} {} {}", source, handle.name(), handle.value_name(kind, index)),
            scale: DEFAULT_SCALE,
            offset: 0.0,
        })
    }

    fn push_trace(&mut self, descriptor: &ChannelDescriptor, style: TraceStyle) {
        let name = self.source_name(descriptor.source);
        let trace = Trace::new(descriptor, name, style, self.data_size());
        self.traces.push(trace);
    }

    fn set_trigger_mirror(&mut self, trigger: TriggerConfig) {
        if trigger != self.trigger {
            self.gate.configure(&trigger);
        }
        self.trigger = trigger;
    }

    /// Start monitoring `kind[index]` of `source`
    ///
    /// Returns the existing handle if that value is already monitored.
    pub fn add_channel(&mut self, source: SourceId, kind: ValueKind, index: usize) -> Result<ChannelId> {
        let spec = self.channel_spec(source, kind, index);
        let added = self.reconfigure(|r| {
            if let Some(id) = r.registry().find(source, kind, index) {
                return Ok(Added::Existing(id));
            }
            let id = r.insert(spec?);
            r.registry()
                .get(id)
                .cloned()
                .map(Added::Inserted)
                .ok_or(ScopeError::UnknownChannel(id))
        })?;

        match added {
            Added::Existing(id) => Ok(id),
            Added::Inserted(descriptor) => {
                tracing::debug!("Added channel {} ({})", descriptor.id(), descriptor.name);
                let id = descriptor.id();
                self.push_trace(&descriptor, TraceStyle::default());
                Ok(id)
            }
        }
    }

    /// Stop monitoring a channel
    ///
    /// If the trigger watched this channel it is switched off in the same
    /// quiesced step.
    pub fn remove_channel(&mut self, id: ChannelId) -> Result<()> {
        let trigger = self.reconfigure(|r| {
            r.remove(id).ok_or(ScopeError::UnknownChannel(id))?;
            Ok(*r.trigger())
        })?;

        self.traces.retain(|t| t.id != id);
        self.set_trigger_mirror(trigger);
        tracing::debug!("Removed channel {}", id);
        Ok(())
    }

    /// Drop every channel reading from a source that is being torn down
    ///
    /// Returns the number of channels removed.
    pub fn source_removed(&mut self, source: SourceId) -> Result<usize> {
        if !self.traces.iter().any(|t| t.source == source) {
            return Ok(0);
        }

        let (removed, trigger) = self.reconfigure(|r| {
            let removed: Vec<ChannelId> = r.remove_source(source).iter().map(|c| c.id()).collect();
            Ok((removed, *r.trigger()))
        })?;

        self.traces.retain(|t| !removed.contains(&t.id));
        self.set_trigger_mirror(trigger);
        tracing::info!("Source {} removed, dropped {} channel(s)", source, removed.len());
        Ok(removed.len())
    }

    /// Change scale, offset and/or style of a channel
    pub fn edit_channel(&mut self, id: ChannelId, edit: ChannelEdit) -> Result<()> {
        if let Some(scale) = edit.scale {
            if !(scale.is_finite() && scale > 0.0) {
                return Err(ScopeError::Config(format!(
                    "scale must be positive (got {})",
                    scale
                )));
            }
        }
        if !self.traces.iter().any(|t| t.id == id) {
            return Err(ScopeError::UnknownChannel(id));
        }

        self.reconfigure(|r| {
            let channel = r.channel_mut(id).ok_or(ScopeError::UnknownChannel(id))?;
            if let Some(scale) = edit.scale {
                channel.scale = scale;
            }
            if let Some(offset) = edit.offset {
                channel.offset = offset;
            }
            Ok(())
        })?;

        if let Some(trace) = self.traces.iter_mut().find(|t| t.id == id) {
            if let Some(scale) = edit.scale {
                trace.scale = scale;
            }
            if let Some(offset) = edit.offset {
                trace.offset = offset;
            }
            if let Some(style) = edit.style {
                trace.style = style;
            }
            trace.update_label();
        }
        Ok(())
    }

    pub fn set_channel_scale(&mut self, id: ChannelId, scale: f64) -> Result<()> {
        self.edit_channel(
            id,
            ChannelEdit {
                scale: Some(scale),
                ..Default::default()
            },
        )
    }

    pub fn set_channel_offset(&mut self, id: ChannelId, offset: f64) -> Result<()> {
        self.edit_channel(
            id,
            ChannelEdit {
                offset: Some(offset),
                ..Default::default()
            },
        )
    }

    /// Replace the trigger configuration
    pub fn set_trigger(&mut self, config: TriggerConfig) -> Result<TriggerConfig> {
        let applied = self.reconfigure(|r| r.set_trigger(config))?;
        self.trigger = applied;
        self.gate.configure(&applied);
        tracing::debug!(
            "Trigger set: {} at {} on {:?}",
            applied.direction,
            applied.threshold,
            applied.channel
        );
        Ok(applied)
    }

    /// Current trigger configuration
    pub fn trigger(&self) -> &TriggerConfig {
        &self.trigger
    }

    /// Move the trigger threshold to a vertical screen position
    ///
    /// `y_fraction` is 0.0 at the top of the plot and 1.0 at the bottom.
    /// The threshold is derived from the trigger channel's scale and offset.
    /// Returns `None` if no trigger channel is set.
    pub fn set_trigger_threshold_from_display(&mut self, y_fraction: f64) -> Result<Option<f64>> {
        let Some(channel) = self.trigger.channel else {
            return Ok(None);
        };
        let trace = self
            .traces
            .iter()
            .find(|t| t.id == channel)
            .ok_or(ScopeError::UnknownChannel(channel))?;

        let y_div = (0.5 - y_fraction) * self.timebase.div_y as f64;
        let threshold = y_div * trace.scale - trace.offset;

        let mut config = self.trigger;
        config.threshold = threshold;
        self.set_trigger(config)?;
        Ok(Some(threshold))
    }

    /// Re-enable the display after a held trigger
    pub fn rearm(&mut self) {
        self.gate.rearm();
    }

    pub fn trigger_gate(&self) -> &TriggerGate {
        &self.gate
    }

    /// Change the display grid; waveforms are resized to one screen
    pub fn set_timebase(&mut self, timebase: Timebase) {
        self.timebase = timebase.clamped();
        let size = self.data_size();
        for trace in &mut self.traces {
            trace.waveform.resize(size);
        }
        tracing::debug!("Timebase set, {} samples per screen", size);
    }

    pub fn timebase(&self) -> &Timebase {
        &self.timebase
    }

    /// Freeze the waveforms; frames are still drained and discarded
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Enable or disable the producer without touching the channel set
    pub fn set_running(&mut self, running: bool) {
        self.barrier.control().swap_enabled(running);
    }

    pub fn is_running(&self) -> bool {
        self.barrier.is_active()
    }

    /// Process trigger events and drain the frame queue
    ///
    /// Events are offered to the trigger gate first, so a held trigger
    /// freezes the display before the frames queued behind it are drawn.
    /// Returns the number of frames delivered to the waveforms.
    pub fn poll(&mut self) -> usize {
        let now = Instant::now();
        while let Ok(event) = self.trigger_events.try_recv() {
            self.gate.offer(event, now);
        }

        let discard = self.paused || self.gate.is_frozen();
        let traces = &mut self.traces;
        let expected = traces.len();

        let delivered = self.drainer.drain(expected, |values| {
            if discard {
                return;
            }
            for (trace, value) in traces.iter_mut().zip(values) {
                trace.waveform.push(*value);
            }
        });

        delivered
    }

    /// Traces in registry order
    pub fn channels(&self) -> &[Trace] {
        &self.traces
    }

    pub fn channel(&self, id: ChannelId) -> Option<&Trace> {
        self.traces.iter().find(|t| t.id == id)
    }

    pub fn sources(&self) -> &Arc<SourceRegistry> {
        &self.sources
    }

    pub fn config(&self) -> &ScopeConfig {
        &self.config
    }

    /// Snapshot of producer and consumer counters
    pub fn stats(&self) -> PipelineStats {
        let mut stats = PipelineStats::default();
        self.counters.fill(&mut stats);
        stats.frames_drained = self.drainer.frames_drained();
        stats.frames_discarded = self.drainer.frames_discarded();
        stats
    }

    /// Capture channels, trigger and display settings
    pub fn profile(&self, name: impl Into<String>) -> ScopeProfile {
        let mut profile = ScopeProfile::new(name);
        profile.timebase = self.timebase;
        profile.paused = self.paused;
        profile.channels = self
            .traces
            .iter()
            .map(|t| ChannelRecord {
                source_id: t.source,
                kind: t.kind,
                index: t.index,
                scale: t.scale,
                offset: t.offset,
                style: t.style,
            })
            .collect();
        profile.trigger = TriggerRecord {
            direction: self.trigger.direction,
            threshold: self.trigger.threshold,
            channel: self
                .trigger
                .channel
                .and_then(|id| self.traces.iter().position(|t| t.id == id)),
            holding: self.trigger.holding,
            holdoff: self.trigger.holdoff,
        };
        profile
    }

    /// Save the current profile to a JSON file
    pub fn save_profile(&self, path: impl AsRef<Path>, name: impl Into<String>) -> Result<()> {
        let path = path.as_ref();
        self.profile(name).save(path)?;
        tracing::info!("Saved scope profile to {}", path.display());
        Ok(())
    }

    /// Replace the channel set, trigger and display settings with a profile
    ///
    /// Channels whose source no longer resolves, or whose index is out of
    /// range, are skipped with a warning, as are repeats of a channel already
    /// restored. Invalid scales and offsets fall back to the defaults.
    /// Returns the number of channels restored.
    pub fn restore_profile(&mut self, profile: &ScopeProfile) -> Result<usize> {
        let mut specs: Vec<(ChannelSpec, TraceStyle)> = Vec::with_capacity(profile.channels.len());
        // Position in `specs` for every record, used to map the trigger channel
        let mut slots: Vec<Option<usize>> = Vec::with_capacity(profile.channels.len());
        for record in &profile.channels {
            if let Some(slot) = specs.iter().position(|(spec, _)| {
                (spec.source, spec.kind, spec.index) == (record.source_id, record.kind, record.index)
            }) {
                tracing::warn!(
                    "Skipping duplicate channel {} {} {}",
                    record.source_id,
                    record.kind,
                    record.index
                );
                slots.push(Some(slot));
                continue;
            }

            match self.channel_spec(record.source_id, record.kind, record.index) {
                Ok(mut spec) => {
                    if record.scale.is_finite() && record.scale > 0.0 {
                        spec.scale = record.scale;
                    } else {
                        tracing::warn!(
                            "Channel {}: invalid scale {}, using {}",
                            spec.name,
                            record.scale,
                            DEFAULT_SCALE
                        );
                    }
                    if record.offset.is_finite() {
                        spec.offset = record.offset;
                    } else {
                        tracing::warn!("Channel {}: invalid offset {}, using 0", spec.name, record.offset);
                    }
                    slots.push(Some(specs.len()));
                    specs.push((spec, record.style));
                }
                Err(e) => {
                    tracing::warn!(
                        "Skipping channel {} {} {}: {}",
                        record.source_id,
                        record.kind,
                        record.index,
                        e
                    );
                    slots.push(None);
                }
            }
        }

        let record = profile.trigger.clone();
        let (descriptors, trigger) = self.reconfigure(move |r| {
            for id in r.registry().ids() {
                r.remove(id);
            }

            let mut descriptors = Vec::with_capacity(specs.len());
            let mut ids = Vec::with_capacity(specs.len());
            for (spec, style) in specs {
                let id = r.insert(spec);
                if let Some(descriptor) = r.registry().get(id) {
                    descriptors.push((descriptor.clone(), style));
                }
                ids.push(id);
            }

            let channel = record
                .channel
                .and_then(|pos| slots.get(pos).copied().flatten())
                .and_then(|slot| ids.get(slot).copied());
            let trigger = r.set_trigger(TriggerConfig {
                direction: record.direction,
                threshold: record.threshold,
                channel,
                holding: record.holding,
                holdoff: record.holdoff,
            })?;
            Ok((descriptors, trigger))
        })?;

        self.traces.clear();
        self.timebase = profile.timebase.clamped();
        for (descriptor, style) in &descriptors {
            self.push_trace(descriptor, *style);
        }
        self.paused = profile.paused;
        self.trigger = trigger;
        self.gate.configure(&trigger);

        tracing::info!(
            "Restored profile '{}': {} of {} channel(s)",
            profile.name,
            descriptors.len(),
            profile.channels.len()
        );
        Ok(descriptors.len())
    }

    /// Load a profile from disk and restore it
    pub fn load_profile(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let profile = ScopeProfile::load(path)?;
        self.restore_profile(&profile)
            .with_context(|| format!("Failed to restore profile {}", path.display()))
    }

    /// Stop the real-time thread
    pub fn shutdown(mut self) {
        self.rt.shutdown();
        tracing::info!("Scope stopped: {:?}", self.stats());
    }
}
