//! Out-of-band delivery of trigger events
//!
//! The sampler announces threshold crossings through a [`TriggerSink`].
//! Delivery is fire-and-forget: a subscriber that is not keeping up loses
//! events instead of stalling the real-time thread.

use crate::types::TriggerEvent;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// Receiver of trigger events, called from the real-time thread
pub trait TriggerSink: Send + Sync {
    /// Deliver an event without blocking
    ///
    /// Returns `false` if any live subscriber could not accept it.
    fn post(&self, event: TriggerEvent) -> bool;
}

/// Publish/subscribe fan-out of trigger events
///
/// Subscriptions are made before the bus is handed to the sampler; the
/// subscriber list is fixed afterwards so posting never takes a lock.
pub struct TriggerBus {
    subscribers: Vec<Sender<TriggerEvent>>,
    capacity: usize,
}

impl TriggerBus {
    /// Create a bus whose subscriptions each buffer up to `capacity` events
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Add a subscriber
    pub fn subscribe(&mut self) -> Receiver<TriggerEvent> {
        let (tx, rx) = bounded(self.capacity);
        self.subscribers.push(tx);
        rx
    }

    /// Number of subscriptions made
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl TriggerSink for TriggerBus {
    fn post(&self, event: TriggerEvent) -> bool {
        let mut delivered = true;
        for subscriber in &self.subscribers {
            match subscriber.try_send(event) {
                Ok(()) => {}
                // A dropped receiver has unsubscribed
                Err(TrySendError::Disconnected(_)) => {}
                Err(TrySendError::Full(_)) => delivered = false,
            }
        }
        delivered
    }
}
