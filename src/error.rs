//! Error handling for the AR sandbox
//!
//! This module defines the crate-wide error type and a Result alias used
//! throughout the application. Raster-level failures have their own
//! [`RasterError`] and convert into [`SandboxError::Raster`].

use crate::raster::RasterError;
use thiserror::Error;

/// Main error type for sandbox operations
#[derive(Error, Debug)]
pub enum SandboxError {
    /// Errors reported by a depth sensor backend
    #[error("Sensor error: {0}")]
    Sensor(String),

    /// The sensor never produced a frame during startup
    #[error("Sensor unreachable after {attempts} connection attempts")]
    SensorUnavailable { attempts: u32 },

    /// A configuration write that violates the settings invariants
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Errors related to calibration records
    #[error("Calibration error: {0}")]
    Calibration(String),

    /// Errors raised by raster operations
    #[error("Raster error: {0}")]
    Raster(#[from] RasterError),

    /// Errors related to presentation surfaces
    #[error("Presentation error: {0}")]
    Presentation(String),

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    /// Image encoding/decoding errors
    #[error("Image error: {0}")]
    Image(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

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
        source: Box<SandboxError>,
    },
}

impl SandboxError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        SandboxError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

impl From<image::ImageError> for SandboxError {
    fn from(err: image::ImageError) -> Self {
        SandboxError::Image(err.to_string())
    }
}

/// Result type alias for sandbox operations
pub type Result<T> = std::result::Result<T, SandboxError>;

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

impl<T> ResultExt<T> for std::result::Result<T, RasterError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| SandboxError::from(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| SandboxError::from(e).with_context(f()))
    }
}
