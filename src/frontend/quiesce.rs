//! Quiescence barrier
//!
//! Registry and trigger mutations are only reachable through a
//! [`Reconfigure`] token, and the only way to get one is to hold a
//! [`Quiesced`] guard. The guard exists only after the real-time thread has
//! acknowledged a barrier task posted after its enabled flag was cleared,
//! so no sampler period can be running or start while the token is alive.
//!
//! ```text
//! Active ──quiesce()──▶ QuiesceRequested ──ack──▶ Quiesced ──drop──▶ Active
//!                              │
//!                              └──timeout──▶ Active (error returned)
//! ```
//!
//! Dropping the guard restores the enabled state the producer had before
//! quiescing, so quiescing an already stopped producer leaves it stopped.

use crate::backend::registry::{ChannelDescriptor, ChannelRegistry, ChannelSpec};
use crate::backend::rt::{RtControl, RtEvent};
use crate::backend::sampler::Sampler;
use crate::config::TriggerConfig;
use crate::error::{Result, ScopeError};
use crate::types::{ChannelId, SourceId};
use crossbeam_channel::{bounded, RecvTimeoutError};
use std::time::Duration;

/// Consumer side of the barrier handshake
pub struct Barrier {
    control: RtControl,
    timeout: Duration,
}

impl Barrier {
    pub fn new(control: RtControl, timeout: Duration) -> Self {
        Self { control, timeout }
    }

    /// Stop the producer and wait until it is provably idle
    pub fn quiesce(&self) -> Result<Quiesced<'_>> {
        let was_active = self.control.swap_enabled(false);

        let (ack_tx, ack_rx) = bounded(1);
        if let Err(e) = self.control.post(RtEvent::Barrier(ack_tx), self.timeout) {
            self.control.swap_enabled(was_active);
            tracing::warn!("Failed to post barrier: {}", e);
            return Err(e);
        }

        match ack_rx.recv_timeout(self.timeout) {
            Ok(()) => {}
            Err(RecvTimeoutError::Timeout) => {
                self.control.swap_enabled(was_active);
                tracing::warn!("Barrier not acknowledged within {:?}", self.timeout);
                return Err(ScopeError::Barrier(format!(
                    "not acknowledged within {:?}",
                    self.timeout
                )));
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.control.swap_enabled(was_active);
                return Err(ScopeError::Barrier(
                    "real-time thread dropped the barrier".to_string(),
                ));
            }
        }

        tracing::trace!("Producer quiesced (was active: {})", was_active);
        Ok(Quiesced {
            control: &self.control,
            was_active,
        })
    }

    /// Whether the producer is currently enabled
    pub fn is_active(&self) -> bool {
        self.control.is_enabled()
    }

    pub fn control(&self) -> &RtControl {
        &self.control
    }
}

/// Proof that the producer is idle; restores its previous state on drop
pub struct Quiesced<'a> {
    control: &'a RtControl,
    was_active: bool,
}

impl Quiesced<'_> {
    /// Whether the producer was running before it was quiesced
    pub fn was_active(&self) -> bool {
        self.was_active
    }

    /// Keep the producer stopped after release
    pub fn stay_inactive(&mut self) {
        self.was_active = false;
    }

    /// Start the producer on release even if it was stopped before
    pub fn activate_on_release(&mut self) {
        self.was_active = true;
    }
}

impl Drop for Quiesced<'_> {
    fn drop(&mut self) {
        self.control.swap_enabled(self.was_active);
    }
}

/// Mutation access to the producer state while quiesced
pub struct Reconfigure<'a> {
    sampler: &'a mut Sampler,
}

impl<'a> Reconfigure<'a> {
    pub(crate) fn new(quiesced: &Quiesced<'_>, sampler: &'a mut Sampler) -> Result<Self> {
        debug_assert!(
            !quiesced.control.is_enabled(),
            "reconfiguring while the producer is enabled"
        );
        if quiesced.control.is_enabled() {
            return Err(ScopeError::NotQuiesced);
        }
        Ok(Self { sampler })
    }

    pub fn registry(&self) -> &ChannelRegistry {
        self.sampler.registry()
    }

    pub fn trigger(&self) -> &TriggerConfig {
        self.sampler.trigger()
    }

    pub fn insert(&mut self, spec: ChannelSpec) -> ChannelId {
        self.sampler.insert(spec)
    }

    pub fn remove(&mut self, id: ChannelId) -> Option<ChannelDescriptor> {
        self.sampler.remove(id)
    }

    pub fn remove_source(&mut self, source: SourceId) -> Vec<ChannelDescriptor> {
        self.sampler.remove_source(source)
    }

    pub fn channel_mut(&mut self, id: ChannelId) -> Option<&mut ChannelDescriptor> {
        self.sampler.channel_mut(id)
    }

    pub fn set_trigger(&mut self, config: TriggerConfig) -> Result<TriggerConfig> {
        self.sampler.set_trigger(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::events::TriggerBus;
    use crate::backend::fifo::frame_queue;
    use crate::backend::rt::RtThread;
    use crate::backend::sampler::{ProducerCounters, SharedSampler};
    use crate::backend::source::SourceRegistry;
    use std::sync::Arc;
    use std::time::Instant;

    fn spawn(period: Duration) -> (RtThread, SharedSampler) {
        let (writer, _reader) = frame_queue(1024);
        let counters = Arc::new(ProducerCounters::default());
        let sampler = SharedSampler::new(Sampler::new(
            writer,
            Arc::new(TriggerBus::new(4)),
            counters.clone(),
        ));
        let rt = RtThread::spawn(
            period,
            sampler.clone(),
            Arc::new(SourceRegistry::new()),
            counters,
            8,
        )
        .unwrap();
        (rt, sampler)
    }

    #[test]
    fn test_quiesce_and_restore_active() {
        let (rt, _sampler) = spawn(Duration::from_millis(1));
        let barrier = Barrier::new(rt.control().clone(), Duration::from_secs(1));

        {
            let quiesced = barrier.quiesce().unwrap();
            assert!(quiesced.was_active());
            assert!(!barrier.is_active());
        }
        assert!(barrier.is_active());
    }

    #[test]
    fn test_restores_inactive_state() {
        let (rt, _sampler) = spawn(Duration::from_millis(1));
        let barrier = Barrier::new(rt.control().clone(), Duration::from_secs(1));
        rt.control().swap_enabled(false);

        {
            let quiesced = barrier.quiesce().unwrap();
            assert!(!quiesced.was_active());
        }
        assert!(!barrier.is_active());
    }

    #[test]
    fn test_quiesce_idle_producer_returns_promptly() {
        let (rt, _sampler) = spawn(Duration::from_secs(10));
        let barrier = Barrier::new(rt.control().clone(), Duration::from_secs(2));
        let start = Instant::now();
        drop(barrier.quiesce().unwrap());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_dead_thread_fails_and_restores() {
        let (mut rt, _sampler) = spawn(Duration::from_millis(1));
        let control = rt.control().clone();
        rt.shutdown();
        control.swap_enabled(true);

        let barrier = Barrier::new(control, Duration::from_millis(50));
        assert!(matches!(barrier.quiesce(), Err(ScopeError::Barrier(_))));
        assert!(barrier.is_active());
    }

    #[test]
    fn test_reconfigure_token_mutates() {
        let (rt, sampler) = spawn(Duration::from_millis(1));
        let barrier = Barrier::new(rt.control().clone(), Duration::from_secs(1));

        let quiesced = barrier.quiesce().unwrap();
        let mut guard = sampler.lock().unwrap();
        let mut token = Reconfigure::new(&quiesced, &mut guard).unwrap();
        let id = token.insert(ChannelSpec {
            source: SourceId(0),
            kind: crate::types::ValueKind::Input,
            index: 0,
            name: "x".to_string(),
            scale: 1.0,
            offset: 0.0,
        });
        assert_eq!(token.registry().ids(), vec![id]);
    }
}
