//! Engine error types
//!
//! Device errors are reported to the caller of a playback operation but
//! never escape into scheduling: sound is best-effort.

use thiserror::Error;

/// Engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Audio device unavailable: {message}")]
    AudioDevice {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Playback error: {message}")]
    Playback {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Schedule rejected: {message}")]
    Schedule {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Timer runtime error: {message}")]
    Runtime {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl EngineError {
    /// Create an audio device error with source
    pub fn audio_device(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::AudioDevice {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a playback error with a message
    pub fn playback(message: impl Into<String>) -> Self {
        Self::Playback {
            message: message.into(),
            source: None,
        }
    }

    /// Create a schedule error wrapping the rejected input's error
    pub fn schedule_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Schedule {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a runtime error with source
    pub fn runtime_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Runtime {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether this error came from the sound device rather than the caller
    pub fn is_device_error(&self) -> bool {
        matches!(self, Self::AudioDevice { .. } | Self::Playback { .. })
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
