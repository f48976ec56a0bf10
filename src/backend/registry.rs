//! Ordered registry of monitored channels
//!
//! Insertion order is column order in every framed record. The sampler
//! walks the registry once per period; everything else here is a mutation
//! that is only reachable while the producer is quiesced (see
//! `frontend::quiesce`).

use crate::types::{ChannelId, SourceId, ValueKind};

/// What the consumer supplies to add a channel
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSpec {
    pub source: SourceId,
    pub kind: ValueKind,
    pub index: usize,
    /// Display name, e.g. "3 Sine output 0"
    pub name: String,
    /// Volts per division
    pub scale: f64,
    pub offset: f64,
}

/// One monitored scalar
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelDescriptor {
    id: ChannelId,
    /// Handle of the source; resolved every period, never owned
    pub source: SourceId,
    pub kind: ValueKind,
    pub index: usize,
    pub name: String,
    pub scale: f64,
    pub offset: f64,
    /// Value sampled in the previous period; NaN until the first sample
    pub(crate) previous: f64,
}

impl ChannelDescriptor {
    /// Handle of this channel
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Value sampled in the previous period
    pub fn previous(&self) -> f64 {
        self.previous
    }

    /// Whether this channel reads `kind[index]` of `source`
    pub fn reads(&self, source: SourceId, kind: ValueKind, index: usize) -> bool {
        self.source == source && self.kind == kind && self.index == index
    }
}

/// Ordered collection of channel descriptors
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: Vec<ChannelDescriptor>,
    next_id: u64,
}

impl ChannelRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a channel and return its handle
    pub fn insert(&mut self, spec: ChannelSpec) -> ChannelId {
        let id = ChannelId(self.next_id);
        self.next_id += 1;
        self.channels.push(ChannelDescriptor {
            id,
            source: spec.source,
            kind: spec.kind,
            index: spec.index,
            name: spec.name,
            scale: spec.scale,
            offset: spec.offset,
            previous: f64::NAN,
        });
        id
    }

    /// Remove a channel, preserving the order of the rest
    pub fn remove(&mut self, id: ChannelId) -> Option<ChannelDescriptor> {
        let pos = self.position(id)?;
        Some(self.channels.remove(pos))
    }

    /// Remove every channel reading from `source`
    pub fn remove_source(&mut self, source: SourceId) -> Vec<ChannelDescriptor> {
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.channels.len());
        for channel in self.channels.drain(..) {
            if channel.source == source {
                removed.push(channel);
            } else {
                kept.push(channel);
            }
        }
        self.channels = kept;
        removed
    }

    /// Find the channel reading `kind[index]` of `source`
    pub fn find(&self, source: SourceId, kind: ValueKind, index: usize) -> Option<ChannelId> {
        self.channels
            .iter()
            .find(|c| c.reads(source, kind, index))
            .map(|c| c.id)
    }

    pub fn get(&self, id: ChannelId) -> Option<&ChannelDescriptor> {
        self.channels.iter().find(|c| c.id == id)
    }

    pub fn get_mut(&mut self, id: ChannelId) -> Option<&mut ChannelDescriptor> {
        self.channels.iter_mut().find(|c| c.id == id)
    }

    /// Column position of a channel
    pub fn position(&self, id: ChannelId) -> Option<usize> {
        self.channels.iter().position(|c| c.id == id)
    }

    /// Visit every channel in registry order
    ///
    /// Allocation-free and linear in the channel count.
    pub fn for_each(&self, mut visitor: impl FnMut(&ChannelDescriptor)) {
        for channel in &self.channels {
            visitor(channel);
        }
    }

    /// Channels in registry order
    pub fn iter(&self) -> std::slice::Iter<'_, ChannelDescriptor> {
        self.channels.iter()
    }

    /// Sampler access for updating previous values
    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, ChannelDescriptor> {
        self.channels.iter_mut()
    }

    /// Handles in registry order
    pub fn ids(&self) -> Vec<ChannelId> {
        self.channels.iter().map(|c| c.id).collect()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
