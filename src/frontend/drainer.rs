//! Frame drainer
//!
//! Called from the consumer timer. Pops framed records until the queue has
//! no complete header left and hands each one to a callback in registry
//! order.
//!
//! A header whose payload has not fully arrived is remembered and retried on
//! the next call rather than treated as an error. A record whose count does
//! not match the current channel set is read and thrown away so its values
//! are never attributed to the wrong channels.

use crate::backend::fifo::{FrameReader, HEADER_BYTES, VALUE_BYTES};
use std::time::Duration;

/// Consumer end of the frame queue
pub struct FrameDrainer {
    reader: FrameReader,
    /// Count from a header whose payload is still in flight
    pending: Option<usize>,
    payload_wait: Duration,
    payload: Vec<u8>,
    values: Vec<f64>,
    frames_drained: u64,
    frames_discarded: u64,
}

impl FrameDrainer {
    /// Wrap a reader; `payload_wait` bounds the wait for an announced payload
    pub fn new(reader: FrameReader, payload_wait: Duration) -> Self {
        Self {
            reader,
            pending: None,
            payload_wait,
            payload: Vec::new(),
            values: Vec::new(),
            frames_drained: 0,
            frames_discarded: 0,
        }
    }

    /// Drain every complete record, passing those of width `expected` to `sink`
    ///
    /// Returns the number of records delivered.
    pub fn drain(&mut self, expected: usize, mut sink: impl FnMut(&[f64])) -> usize {
        let mut delivered = 0;

        loop {
            let count = match self.pending.take() {
                Some(count) => count,
                None => {
                    let mut header = [0u8; HEADER_BYTES];
                    if !self.reader.try_read(&mut header) {
                        break;
                    }
                    u64::from_le_bytes(header) as usize
                }
            };

            let capacity = self.reader.capacity();
            let bytes = match count.checked_mul(VALUE_BYTES) {
                Some(bytes) if bytes.checked_add(HEADER_BYTES).is_some_and(|n| n <= capacity) => {
                    bytes
                }
                _ => {
                    // No producer can have written this; the stream is unusable
                    tracing::warn!("Corrupt frame header (count {}), flushing queue", count);
                    self.reader.flush();
                    self.frames_discarded += 1;
                    break;
                }
            };

            self.payload.resize(bytes, 0);
            if !self.reader.read_blocking(&mut self.payload, self.payload_wait) {
                self.pending = Some(count);
                break;
            }

            if count != expected {
                tracing::debug!(
                    "Discarding frame with {} values, expected {}",
                    count,
                    expected
                );
                self.frames_discarded += 1;
                continue;
            }

            self.values.clear();
            self.values.extend(self.payload.chunks_exact(VALUE_BYTES).map(|chunk| {
                let mut raw = [0u8; VALUE_BYTES];
                raw.copy_from_slice(chunk);
                f64::from_le_bytes(raw)
            }));
            sink(&self.values);
            self.frames_drained += 1;
            delivered += 1;
        }

        delivered
    }

    /// Discard queued bytes and any half-read record
    ///
    /// Only valid while the producer is quiesced.
    pub fn reset(&mut self) -> usize {
        self.pending = None;
        self.reader.flush()
    }

    /// Count of a header whose payload has not arrived yet
    pub fn pending(&self) -> Option<usize> {
        self.pending
    }

    pub fn frames_drained(&self) -> u64 {
        self.frames_drained
    }

    pub fn frames_discarded(&self) -> u64 {
        self.frames_discarded
    }

    /// Bytes waiting in the queue
    pub fn queued_bytes(&self) -> usize {
        self.reader.len()
    }
}
