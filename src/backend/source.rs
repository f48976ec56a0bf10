//! Signal sources and the source registry
//!
//! Channels never hold a reference to the source they sample. They hold a
//! [`SourceId`] that is resolved through a [`SourceLookup`] every period, so
//! tearing a source down can never leave a channel pointing at freed state:
//! an unresolvable handle simply reads as NaN until the channel is removed.
//!
//! Each [`ValueKind`] has its own resolver on [`SignalSource`];
//! [`ValueKind::read`] dispatches to it.

use crate::types::{SourceId, ValueKind};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// A block exposing named, indexed scalar values
///
/// The `input`/`output`/`parameter`/`state` readers are called from the
/// real-time thread and must not block or allocate.
pub trait SignalSource {
    /// Display name of the source
    fn name(&self) -> &str;

    /// Number of values of `kind` this source exposes
    fn count(&self, kind: ValueKind) -> usize;

    /// Display name of one value (consumer side only)
    fn value_name(&self, kind: ValueKind, index: usize) -> String {
        format!("{} {}", kind, index)
    }

    fn input(&self, index: usize) -> f64;

    fn output(&self, index: usize) -> f64;

    fn parameter(&self, _index: usize) -> f64 {
        f64::NAN
    }

    fn state(&self, _index: usize) -> f64 {
        f64::NAN
    }
}

impl ValueKind {
    /// Read the value of this kind at `index` from `source`
    pub fn read(self, source: &dyn SignalSource, index: usize) -> f64 {
        match self {
            ValueKind::Input => source.input(index),
            ValueKind::Output => source.output(index),
            ValueKind::Parameter => source.parameter(index),
            ValueKind::State => source.state(index),
        }
    }
}

/// Resolves a source handle to a current value
///
/// This is the seam the sampler reads through; `None` means the handle
/// could not be resolved this period.
pub trait SourceLookup {
    fn value(&self, source: SourceId, kind: ValueKind, index: usize) -> Option<f64>;
}

/// Shared handle to a registered source
pub type SharedSource = Arc<dyn SignalSource + Send + Sync>;

/// Lookup table from source handles to live sources
///
/// Owned outside the scope; the scope and the real-time thread share it
/// through an `Arc`. The real-time side only ever attempts a non-blocking
/// read lock, so registering a source can at worst cost one period of NaN
/// samples, never a stalled period.
#[derive(Default)]
pub struct SourceRegistry {
    sources: RwLock<HashMap<SourceId, SharedSource>>,
    next_id: AtomicU32,
}

impl SourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source and return its handle
    pub fn register(&self, source: SharedSource) -> SourceId {
        let id = SourceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let name = source.name().to_string();
        match self.sources.write() {
            Ok(mut sources) => {
                sources.insert(id, source);
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(id, source);
            }
        }
        tracing::debug!("Registered source {} ({})", id, name);
        id
    }

    /// Remove a source from the table
    ///
    /// Channels reading from it should be purged with
    /// `Scope::source_removed` so they stop producing NaN columns.
    pub fn unregister(&self, id: SourceId) -> Option<SharedSource> {
        let removed = match self.sources.write() {
            Ok(mut sources) => sources.remove(&id),
            Err(poisoned) => poisoned.into_inner().remove(&id),
        };
        if removed.is_some() {
            tracing::debug!("Unregistered source {}", id);
        }
        removed
    }

    /// Resolve a handle on the consumer side
    pub fn get(&self, id: SourceId) -> Option<SharedSource> {
        match self.sources.read() {
            Ok(sources) => sources.get(&id).cloned(),
            Err(poisoned) => poisoned.into_inner().get(&id).cloned(),
        }
    }

    /// Whether a handle currently resolves
    pub fn contains(&self, id: SourceId) -> bool {
        self.get(id).is_some()
    }

    /// All registered handles in ascending order
    pub fn ids(&self) -> Vec<SourceId> {
        let mut ids: Vec<SourceId> = match self.sources.read() {
            Ok(sources) => sources.keys().copied().collect(),
            Err(poisoned) => poisoned.into_inner().keys().copied().collect(),
        };
        ids.sort();
        ids
    }

    /// Number of registered sources
    pub fn len(&self) -> usize {
        match self.sources.read() {
            Ok(sources) => sources.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Whether no sources are registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SourceLookup for SourceRegistry {
    fn value(&self, source: SourceId, kind: ValueKind, index: usize) -> Option<f64> {
        let sources = self.sources.try_read().ok()?;
        let source = sources.get(&source)?;
        Some(kind.read(source.as_ref(), index))
    }
}

/// A source whose values are set from any thread
///
/// Values are stored as `f64` bits in atomics, so the real-time side reads
/// them lock-free. Used for externally driven signals and in tests.
pub struct AtomicSource {
    name: String,
    inputs: Vec<AtomicU64>,
    outputs: Vec<AtomicU64>,
    parameters: Vec<AtomicU64>,
    states: Vec<AtomicU64>,
}

fn zeroed(count: usize) -> Vec<AtomicU64> {
    (0..count).map(|_| AtomicU64::new(0f64.to_bits())).collect()
}

fn load(values: &[AtomicU64], index: usize) -> f64 {
    values
        .get(index)
        .map(|v| f64::from_bits(v.load(Ordering::Acquire)))
        .unwrap_or(f64::NAN)
}

impl AtomicSource {
    /// Create a source with the given number of inputs and outputs
    pub fn new(name: impl Into<String>, inputs: usize, outputs: usize) -> Self {
        Self {
            name: name.into(),
            inputs: zeroed(inputs),
            outputs: zeroed(outputs),
            parameters: Vec::new(),
            states: Vec::new(),
        }
    }

    /// Add parameter and state slots
    pub fn with_parameters(mut self, parameters: usize, states: usize) -> Self {
        self.parameters = zeroed(parameters);
        self.states = zeroed(states);
        self
    }

    fn slots(&self, kind: ValueKind) -> &[AtomicU64] {
        match kind {
            ValueKind::Input => &self.inputs,
            ValueKind::Output => &self.outputs,
            ValueKind::Parameter => &self.parameters,
            ValueKind::State => &self.states,
        }
    }

    /// Set a value; out-of-range indices are ignored
    pub fn set(&self, kind: ValueKind, index: usize, value: f64) {
        if let Some(slot) = self.slots(kind).get(index) {
            slot.store(value.to_bits(), Ordering::Release);
        }
    }
}

impl SignalSource for AtomicSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn count(&self, kind: ValueKind) -> usize {
        self.slots(kind).len()
    }

    fn input(&self, index: usize) -> f64 {
        load(&self.inputs, index)
    }

    fn output(&self, index: usize) -> f64 {
        load(&self.outputs, index)
    }

    fn parameter(&self, index: usize) -> f64 {
        load(&self.parameters, index)
    }

    fn state(&self, index: usize) -> f64 {
        load(&self.states, index)
    }
}
