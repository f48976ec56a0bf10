//! Periodic real-time thread
//!
//! Runs the sampler once per period while the `enabled` flag is set and
//! services a small scheduler event queue between periods. Barrier tasks are
//! executed on this thread, after any sampler invocation that was in flight
//! when they were posted, so acknowledging one proves the sampler is idle.
//!
//! # Loop
//!
//! ```text
//! loop {
//!     drain event queue        (ack barriers, stop on Shutdown)
//!     if enabled { run sampler }
//!     wait for next deadline   (still servicing events)
//! }
//! ```

use crate::backend::sampler::{ProducerCounters, SharedSampler};
use crate::backend::source::SourceLookup;
use crate::error::{Result, ResultExt, ScopeError};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Source lookup shared with the real-time thread
pub type SharedLookup = Arc<dyn SourceLookup + Send + Sync>;

/// Task executed by the real-time thread in its own turn
#[derive(Debug)]
pub enum RtEvent {
    /// No-op task; the sender is signalled once it has run
    Barrier(Sender<()>),
    /// Stop the thread
    Shutdown,
}

/// Consumer-side handle to the real-time thread
#[derive(Clone)]
pub struct RtControl {
    enabled: Arc<AtomicBool>,
    events: Sender<RtEvent>,
}

impl RtControl {
    /// Whether periods currently invoke the sampler
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Set the enabled flag, returning the previous state
    pub fn swap_enabled(&self, enabled: bool) -> bool {
        self.enabled.swap(enabled, Ordering::AcqRel)
    }

    /// Enqueue a task for the real-time thread
    pub fn post(&self, event: RtEvent, timeout: Duration) -> Result<()> {
        match self.events.send_timeout(event, timeout) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(ScopeError::Barrier(
                "real-time event queue is full".to_string(),
            )),
            Err(SendTimeoutError::Disconnected(_)) => Err(ScopeError::Barrier(
                "real-time thread is not running".to_string(),
            )),
        }
    }
}

/// Owner of the real-time thread
pub struct RtThread {
    control: RtControl,
    handle: Option<JoinHandle<()>>,
}

impl RtThread {
    /// Spawn the thread; the sampler starts enabled
    pub fn spawn(
        period: Duration,
        sampler: SharedSampler,
        sources: SharedLookup,
        counters: Arc<ProducerCounters>,
        event_capacity: usize,
    ) -> Result<Self> {
        let (tx, rx) = bounded(event_capacity.max(1));
        let enabled = Arc::new(AtomicBool::new(true));

        let worker = RtWorker {
            period,
            sampler,
            sources,
            counters,
            enabled: enabled.clone(),
            events: rx,
        };
        let handle = std::thread::Builder::new()
            .name("rtscope-rt".to_string())
            .spawn(move || worker.run())
            .context("Failed to spawn real-time thread")?;

        tracing::info!("Real-time thread started (period {:?})", period);

        Ok(Self {
            control: RtControl {
                enabled,
                events: tx,
            },
            handle: Some(handle),
        })
    }

    /// Handle used by the barrier and the scope
    pub fn control(&self) -> &RtControl {
        &self.control
    }

    /// Whether the thread is still alive
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Stop and join the thread
    pub fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.control.swap_enabled(false);
        let _ = self.control.events.send(RtEvent::Shutdown);
        if handle.join().is_err() {
            tracing::error!("Real-time thread panicked");
        } else {
            tracing::info!("Real-time thread stopped");
        }
    }
}

impl Drop for RtThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct RtWorker {
    period: Duration,
    sampler: SharedSampler,
    sources: SharedLookup,
    counters: Arc<ProducerCounters>,
    enabled: Arc<AtomicBool>,
    events: Receiver<RtEvent>,
}

impl RtWorker {
    fn run(self) {
        let mut deadline = Instant::now() + self.period;

        loop {
            if !self.process_events() {
                break;
            }

            if self.enabled.load(Ordering::Acquire)
                && !self.sampler.try_execute(self.sources.as_ref())
            {
                self.counters.missed_periods.fetch_add(1, Ordering::Relaxed);
            }

            if !self.wait_until(deadline) {
                break;
            }

            deadline += self.period;
            let now = Instant::now();
            if deadline < now {
                // Overran: skip the lost periods instead of bursting to catch up
                self.counters.missed_periods.fetch_add(1, Ordering::Relaxed);
                deadline = now + self.period;
            }
        }
    }

    /// Run queued tasks; returns `false` when the thread should stop
    fn process_events(&self) -> bool {
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    if !self.handle(event) {
                        return false;
                    }
                }
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    /// Sleep until `deadline`, running tasks that arrive meanwhile
    fn wait_until(&self, deadline: Instant) -> bool {
        loop {
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            match self.events.recv_timeout(deadline - now) {
                Ok(event) => {
                    if !self.handle(event) {
                        return false;
                    }
                }
                Err(RecvTimeoutError::Timeout) => return true,
                Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
    }

    fn handle(&self, event: RtEvent) -> bool {
        match event {
            RtEvent::Barrier(ack) => {
                // The waiter may have timed out and gone away
                let _ = ack.try_send(());
                true
            }
            RtEvent::Shutdown => false,
        }
    }
}
