//! Producer side of the acquisition pipeline
//!
//! Everything in this module either runs on the real-time thread or is
//! shared with it. The consumer-side counterpart lives in
//! [`crate::frontend`].
//!
//! # Architecture
//!
//! ```text
//!  RtThread ──period──▶ Sampler ──reads──▶ ChannelRegistry
//!                          │                     │
//!                          │               SourceLookup (SourceRegistry)
//!                          ├──frames──▶ FrameWriter ═══▶ FrameReader (drainer)
//!                          └──events──▶ TriggerSink (TriggerBus)
//! ```
//!
//! # Components
//!
//! - [`fifo`] - Bounded single-producer/single-consumer frame queue
//! - [`registry`] - Ordered channel descriptors
//! - [`source`] - Signal sources, resolved by handle every period
//! - [`events`] - Out-of-band trigger event delivery
//! - [`sampler`] - One period of sampling and trigger detection
//! - [`rt`] - The periodic thread and its barrier-capable event queue

pub mod events;
pub mod fifo;
pub mod registry;
pub mod rt;
pub mod sampler;
pub mod source;

pub use events::{TriggerBus, TriggerSink};
pub use fifo::{frame_bytes, frame_queue, FrameReader, FrameWriter, HEADER_BYTES, VALUE_BYTES};
pub use registry::{ChannelDescriptor, ChannelRegistry, ChannelSpec};
pub use rt::{RtControl, RtEvent, RtThread, SharedLookup};
pub use sampler::{detect_crossing, ProducerCounters, Sampler, SharedSampler};
pub use source::{AtomicSource, SharedSource, SignalSource, SourceLookup, SourceRegistry};
