//! Bounded frame queue between the real-time thread and the drainer
//!
//! A fixed-capacity byte ring with exactly one writer (the sampler, on the
//! real-time thread) and exactly one reader (the drainer, on the consumer
//! thread). Neither side takes a lock; the writer never blocks.
//!
//! # Wire Format
//!
//! One framed record per period:
//!
//! ```text
//! [count: u64 LE][value 0: f64 LE] .. [value count-1: f64 LE]
//! ```
//!
//! A frame is written with a single push and only when the whole frame fits,
//! so a full queue drops the current frame and never leaves a torn record
//! behind. Bytes become visible to the reader in write order.

use ringbuf::{HeapConsumer, HeapProducer, HeapRb};
use std::time::{Duration, Instant};

/// Size of the count header in bytes
pub const HEADER_BYTES: usize = std::mem::size_of::<u64>();

/// Size of one encoded value in bytes
pub const VALUE_BYTES: usize = std::mem::size_of::<f64>();

/// Poll interval used while waiting for an announced payload
const WAIT_POLL: Duration = Duration::from_micros(50);

/// Encoded size of a frame carrying `count` values
pub fn frame_bytes(count: usize) -> usize {
    HEADER_BYTES + count * VALUE_BYTES
}

/// Create a frame queue with the given byte capacity
pub fn frame_queue(capacity: usize) -> (FrameWriter, FrameReader) {
    let rb = HeapRb::<u8>::new(capacity.max(1));
    let (producer, consumer) = rb.split();
    (
        FrameWriter {
            producer,
            scratch: Vec::new(),
        },
        FrameReader { consumer },
    )
}

/// Producer half, owned by the sampler
pub struct FrameWriter {
    producer: HeapProducer<u8>,
    /// Encode buffer reused every period
    scratch: Vec<u8>,
}

impl FrameWriter {
    /// Copy `bytes` into the queue if all of them fit
    ///
    /// Returns `false` and writes nothing when the queue lacks room.
    pub fn write(&mut self, bytes: &[u8]) -> bool {
        // Only this side pushes, so free space can only grow after the check.
        if self.producer.free_len() < bytes.len() {
            return false;
        }
        let written = self.producer.push_slice(bytes);
        debug_assert_eq!(written, bytes.len());
        true
    }

    /// Encode and write one framed record
    ///
    /// Does not allocate once [`reserve_frame`](Self::reserve_frame) has been
    /// called for the current channel count.
    pub fn write_frame(&mut self, values: &[f64]) -> bool {
        let needed = frame_bytes(values.len());
        if self.producer.free_len() < needed {
            return false;
        }
        self.scratch.clear();
        self.scratch
            .extend_from_slice(&(values.len() as u64).to_le_bytes());
        for value in values {
            self.scratch.extend_from_slice(&value.to_le_bytes());
        }
        let written = self.producer.push_slice(&self.scratch);
        debug_assert_eq!(written, needed);
        true
    }

    /// Pre-size the encode buffer for frames of `count` values
    pub fn reserve_frame(&mut self, count: usize) {
        let needed = frame_bytes(count);
        if self.scratch.capacity() < needed {
            self.scratch.reserve(needed - self.scratch.len());
        }
    }

    /// Bytes that can currently be written
    pub fn free_len(&self) -> usize {
        self.producer.free_len()
    }

    /// Total queue capacity in bytes
    pub fn capacity(&self) -> usize {
        self.producer.capacity()
    }
}

/// Consumer half, owned by the drainer
pub struct FrameReader {
    consumer: HeapConsumer<u8>,
}

impl FrameReader {
    /// Fill `buf` completely without blocking
    ///
    /// Returns `false` and consumes nothing when fewer than `buf.len()` bytes
    /// are queued.
    pub fn try_read(&mut self, buf: &mut [u8]) -> bool {
        if self.consumer.len() < buf.len() {
            return false;
        }
        let read = self.consumer.pop_slice(buf);
        debug_assert_eq!(read, buf.len());
        true
    }

    /// Fill `buf` completely, waiting up to `timeout` for the bytes to arrive
    ///
    /// Used once a header has announced a payload of known size. Returns
    /// `false` and consumes nothing if the bytes did not arrive in time.
    pub fn read_blocking(&mut self, buf: &mut [u8], timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.try_read(buf) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(WAIT_POLL);
        }
    }

    /// Discard everything currently queued, returning the number of bytes dropped
    pub fn flush(&mut self) -> usize {
        let queued = self.consumer.len();
        self.consumer.skip(queued)
    }

    /// Bytes currently queued
    pub fn len(&self) -> usize {
        self.consumer.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }

    /// Total queue capacity in bytes
    pub fn capacity(&self) -> usize {
        self.consumer.capacity()
    }
}
