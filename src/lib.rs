//! # rtscope: Real-Time Oscilloscope Acquisition Core
//!
//! A periodic sampler runs on a dedicated real-time thread, reads a set of
//! monitored channels from external signal sources, detects threshold
//! crossings on one trigger channel and pushes one framed record per period
//! into a bounded lock-free queue. A consumer thread drains the queue on a
//! low-frequency timer into per-channel waveforms.
//!
//! ## Architecture
//!
//! - **Backend**: the producer side. Frame queue, channel registry, sampler
//!   and the real-time thread with its barrier-capable event queue
//! - **Frontend**: the consumer side. [`Scope`] owns the pipeline, drains
//!   frames and performs every reconfiguration through the quiescence
//!   barrier
//! - **Communication**: a `ringbuf` SPSC byte ring for frames and crossbeam
//!   channels for trigger events and barrier tasks
//!
//! ## Configuration
//!
//! Pipeline settings are read from `rtscope.toml`, looked up in the
//! platform-appropriate data directory under `dev.hxyulin.rtscope`
//! unless a path is given. Scope profiles (channels, trigger, timebase) are
//! stored as JSON.
//!
//! ## Example
//!
//! ```ignore
//! use rtscope::{AtomicSource, Scope, ScopeConfig, SourceRegistry, TriggerConfig};
//! use rtscope::types::{TriggerDirection, ValueKind};
//! use std::sync::Arc;
//!
//! let sources = Arc::new(SourceRegistry::new());
//! let sine = Arc::new(AtomicSource::new("Sine", 0, 1));
//! let id = sources.register(sine.clone());
//!
//! let mut scope = Scope::new(ScopeConfig::default(), sources)?;
//! let channel = scope.add_channel(id, ValueKind::Output, 0)?;
//! scope.set_trigger(TriggerConfig::on(channel, TriggerDirection::Rising, 0.0))?;
//!
//! loop {
//!     std::thread::sleep(scope.config().drain_interval());
//!     scope.poll();
//! }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod frontend;
pub mod types;

// Re-export commonly used types
pub use backend::{AtomicSource, SignalSource, SourceLookup, SourceRegistry, TriggerBus};
pub use config::{ScopeConfig, ScopeProfile, Timebase, TriggerConfig};
pub use error::{Result, ScopeError};
pub use frontend::{ChannelEdit, Scope, Trace};
pub use types::{ChannelId, PipelineStats, SourceId, TriggerDirection, TriggerEvent, ValueKind};
