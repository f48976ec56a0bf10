//! Configuration module for rtscope
//!
//! This module handles:
//! - Pipeline configuration (`rtscope.toml`): real-time period, queue sizes,
//!   drain interval, barrier timeout, default timebase, log directory
//! - Scope profiles (`.scope.json`): persisted channel identities, trigger
//!   and display settings, restored through the normal quiesced insert path
//! - Runtime settings ([`settings`]) that change while the scope runs
//!
//! # App Data Location
//!
//! Configuration is looked up in the platform data directory under
//! `dev.hxyulin.rtscope` unless an explicit path is given:
//! - **Linux**: `~/.local/share/dev.hxyulin.rtscope/`
//! - **macOS**: `~/Library/Application Support/dev.hxyulin.rtscope/`
//! - **Windows**: `%APPDATA%\dev.hxyulin.rtscope\`

pub mod settings;

pub use settings::*;

use crate::error::{Result, ResultExt, ScopeError};
use crate::types::{SourceId, TriggerDirection, ValueKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for data directories
pub const APP_ID: &str = "dev.hxyulin.rtscope";

/// Pipeline configuration filename
pub const CONFIG_FILE: &str = "rtscope.toml";

/// Profile file extension
pub const PROFILE_FILE_EXTENSION: &str = "scope.json";

/// Default real-time period in microseconds
pub const DEFAULT_PERIOD_US: u64 = 1_000;

/// Default frame queue capacity (10 MiB)
pub const DEFAULT_FIFO_CAPACITY: usize = 10 * 1_048_576;

/// Default drain timer interval in milliseconds
pub const DEFAULT_DRAIN_INTERVAL_MS: u64 = 25;

/// Smallest frame queue that can hold a one-channel frame
pub const MIN_FIFO_CAPACITY: usize = 16;

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Get the path to the default configuration file
pub fn default_config_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(CONFIG_FILE))
}

// ==================== Pipeline Configuration ====================

/// Configuration of the acquisition pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Real-time period in microseconds
    pub period_us: u64,

    /// Frame queue capacity in bytes
    pub fifo_capacity_bytes: usize,

    /// Interval of the consumer drain timer in milliseconds
    pub drain_interval_ms: u64,

    /// How long the drainer waits for an announced payload before deferring
    pub payload_wait_ms: u64,

    /// How long a quiescence request waits for the barrier acknowledgement
    pub barrier_timeout_ms: u64,

    /// Capacity of the real-time scheduler's event queue
    pub event_queue_capacity: usize,

    /// Capacity of each trigger event subscription
    pub trigger_queue_capacity: usize,

    /// Directory for rolling log files (stderr only when unset)
    pub log_dir: Option<PathBuf>,

    /// Initial timebase
    pub timebase: Timebase,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            period_us: DEFAULT_PERIOD_US,
            fifo_capacity_bytes: DEFAULT_FIFO_CAPACITY,
            drain_interval_ms: DEFAULT_DRAIN_INTERVAL_MS,
            payload_wait_ms: 5,
            barrier_timeout_ms: 1_000,
            event_queue_capacity: 64,
            trigger_queue_capacity: 256,
            log_dir: None,
            timebase: Timebase::default(),
        }
    }
}

impl ScopeConfig {
    /// Real-time period
    pub fn period(&self) -> Duration {
        Duration::from_micros(self.period_us)
    }

    /// Drain timer interval
    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms)
    }

    /// Bounded wait for an announced payload
    pub fn payload_wait(&self) -> Duration {
        Duration::from_millis(self.payload_wait_ms)
    }

    /// Barrier acknowledgement timeout
    pub fn barrier_timeout(&self) -> Duration {
        Duration::from_millis(self.barrier_timeout_ms)
    }

    /// Check that the configuration can drive a pipeline
    pub fn validate(&self) -> Result<()> {
        if self.period_us == 0 {
            return Err(ScopeError::Config("period_us must be positive".to_string()));
        }
        if self.fifo_capacity_bytes < MIN_FIFO_CAPACITY {
            return Err(ScopeError::Config(format!(
                "fifo_capacity_bytes must be at least {} (got {})",
                MIN_FIFO_CAPACITY, self.fifo_capacity_bytes
            )));
        }
        if self.event_queue_capacity == 0 || self.trigger_queue_capacity == 0 {
            return Err(ScopeError::Config(
                "queue capacities must be positive".to_string(),
            ));
        }
        if !self.timebase.div_t_ms.is_finite() {
            return Err(ScopeError::Config(format!(
                "timebase.div_t_ms must be finite (got {})",
                self.timebase.div_t_ms
            )));
        }
        Ok(())
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, returning defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save configuration as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).context("Failed to create config directory")?;
            }
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config {}", path.display()))
    }
}

// ==================== Scope Profile ====================

/// Persisted identity and display attributes of one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRecord {
    /// Source id in the external source registry
    pub source_id: SourceId,
    pub kind: ValueKind,
    pub index: usize,
    pub scale: f64,
    pub offset: f64,
    #[serde(default)]
    pub style: TraceStyle,
}

/// Persisted trigger settings
///
/// The trigger channel is stored as a position in the profile's channel
/// list since channel handles do not survive a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TriggerRecord {
    pub direction: TriggerDirection,
    pub threshold: f64,
    pub channel: Option<usize>,
    pub holding: bool,
    pub holdoff: Duration,
}

/// Saved scope state: channels, trigger and display settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeProfile {
    /// Version for future migration support
    #[serde(default = "default_profile_version")]
    pub version: u32,

    /// Profile name
    pub name: String,

    /// When the profile was saved
    pub saved_at: chrono::DateTime<chrono::Utc>,

    #[serde(default)]
    pub timebase: Timebase,

    #[serde(default)]
    pub paused: bool,

    /// Channels in registry order
    #[serde(default)]
    pub channels: Vec<ChannelRecord>,

    #[serde(default)]
    pub trigger: TriggerRecord,
}

fn default_profile_version() -> u32 {
    1
}

impl ScopeProfile {
    /// Create an empty profile
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            version: default_profile_version(),
            name: name.into(),
            saved_at: chrono::Utc::now(),
            timebase: Timebase::default(),
            paused: false,
            channels: Vec::new(),
            trigger: TriggerRecord::default(),
        }
    }

    /// Load a profile from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile {}", path.display()))?;
        serde_json::from_str(&content).map_err(|e| {
            ScopeError::Serialization(format!("Failed to parse profile: {}", e))
        })
    }

    /// Save the profile as pretty-printed JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write profile {}", path.display()))
    }
}
