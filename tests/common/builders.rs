//! Test rig builders for creating scopes over known sources

use super::sources::FixedSource;
use rtscope::config::ScopeConfig;
use rtscope::{AtomicSource, Scope, SourceId, SourceRegistry, TriggerBus};
use std::sync::Arc;

/// Pipeline configuration sized for tests
pub fn test_config() -> ScopeConfig {
    ScopeConfig {
        period_us: 1_000,
        fifo_capacity_bytes: 1 << 16,
        payload_wait_ms: 5,
        barrier_timeout_ms: 2_000,
        ..Default::default()
    }
}

/// Builder for a scope over a fresh source registry
pub struct ScopeBuilder {
    config: ScopeConfig,
    sources: Arc<SourceRegistry>,
    ids: Vec<SourceId>,
    bus: Option<TriggerBus>,
}

impl ScopeBuilder {
    pub fn new() -> Self {
        Self {
            config: test_config(),
            sources: Arc::new(SourceRegistry::new()),
            ids: Vec::new(),
            bus: None,
        }
    }

    pub fn config(mut self, config: ScopeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn period_us(mut self, period_us: u64) -> Self {
        self.config.period_us = period_us;
        self
    }

    pub fn fixed(mut self, name: &str, outputs: &[f64]) -> Self {
        let id = self.sources.register(Arc::new(FixedSource::new(name, outputs)));
        self.ids.push(id);
        self
    }

    pub fn atomic(mut self, source: Arc<AtomicSource>) -> Self {
        let id = self.sources.register(source);
        self.ids.push(id);
        self
    }

    pub fn trigger_bus(mut self, bus: TriggerBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn build(self) -> TestRig {
        let scope = match self.bus {
            Some(bus) => Scope::with_trigger_bus(self.config, self.sources.clone(), bus),
            None => Scope::new(self.config, self.sources.clone()),
        }
        .expect("scope should start");
        TestRig {
            scope,
            sources: self.sources,
            ids: self.ids,
        }
    }
}

/// A running scope plus the sources it reads
pub struct TestRig {
    pub scope: Scope,
    pub sources: Arc<SourceRegistry>,
    /// Source handles in registration order
    pub ids: Vec<SourceId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_registers_sources() {
        let rig = ScopeBuilder::new()
            .fixed("a", &[1.0])
            .fixed("b", &[2.0])
            .build();
        assert_eq!(rig.ids.len(), 2);
        assert_eq!(rig.sources.len(), 2);
    }
}
