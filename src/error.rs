//! Error handling for rtscope
//!
//! This module defines the crate error type and a Result alias for use on
//! the consumer side of the pipeline. The real-time sampling path never
//! produces errors; it counts dropped frames and events instead.

use crate::types::{ChannelId, SourceId, ValueKind};
use thiserror::Error;

/// Main error type for rtscope operations
#[derive(Error, Debug)]
pub enum ScopeError {
    /// Errors related to configuration loading/saving or invalid values
    #[error("Configuration error: {0}")]
    Config(String),

    /// The real-time thread did not acknowledge a barrier task
    #[error("Barrier error: {0}")]
    Barrier(String),

    /// A registry mutation was attempted while the producer was running
    #[error("Channel registry mutated while the producer is active")]
    NotQuiesced,

    /// No channel with this handle exists in the registry
    #[error("Unknown channel {0}")]
    UnknownChannel(ChannelId),

    /// The source handle does not resolve through the source registry
    #[error("Unknown source {0}")]
    UnknownSource(SourceId),

    /// A channel index outside the range the source exposes for that kind
    #[error("{kind} index {index} out of range for source {source_id} ({count} available)")]
    IndexOutOfRange {
        source_id: SourceId,
        kind: ValueKind,
        index: usize,
        count: usize,
    },

    /// Shared state lock was poisoned by a panicking thread
    #[error("Shared state poisoned: {0}")]
    Poisoned(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ScopeError>,
    },
}

impl ScopeError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ScopeError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

impl From<serde_json::Error> for ScopeError {
    fn from(err: serde_json::Error) -> Self {
        ScopeError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for ScopeError {
    fn from(err: toml::de::Error) -> Self {
        ScopeError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ScopeError {
    fn from(err: toml::ser::Error) -> Self {
        ScopeError::Serialization(err.to_string())
    }
}

/// Result type alias for rtscope operations
pub type Result<T> = std::result::Result<T, ScopeError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| ScopeError::from(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| ScopeError::from(e).with_context(f()))
    }
}
