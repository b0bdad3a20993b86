//! Error types for icinga2rt
//!
//! Defines one error enum covering every failure mode of the daemon and the
//! maintenance commands. Uses thiserror for ergonomic error handling.
//!
//! Most variants are fatal: the process prints the error and exits non-zero.
//! The exceptions are stream errors (see [`Icinga2RtError::is_stream_recoverable`]),
//! which make the daemon reconnect to Icinga2 instead.

use thiserror::Error;

/// Result type alias for icinga2rt operations
pub type Result<T> = std::result::Result<T, Icinga2RtError>;

/// Error type for icinga2rt operations
#[derive(Error, Debug)]
pub enum Icinga2RtError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Event cache errors other than SQLite failures
    #[error("Storage error: {0}")]
    Storage(String),

    /// The event stream could not be opened within the retry budget
    #[error("Could not connect to event stream after {attempts} attempts: {last_error}")]
    Connection { attempts: u32, last_error: String },

    /// A record on an open event stream could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// The event stream ended
    #[error("Event stream closed by remote")]
    StreamClosed,

    /// Ticket lookups that found nothing
    #[error("Ticket not found: {0}")]
    TicketNotFound(u64),

    /// Ticket system errors outside the RT client
    #[error("Ticket system error: {0}")]
    TicketSystem(String),

    /// Request Tracker client errors
    #[error("RT error: {0}")]
    Ticket(#[from] rt::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// SQLite database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),

    /// Anyhow errors (for more context)
    #[error("{0:#}")]
    Anyhow(#[from] anyhow::Error),
}

impl Icinga2RtError {
    /// Whether the daemon should drop the current stream and reconnect.
    ///
    /// Only errors raised while reading an already open stream qualify.
    /// Connection errors mean the retry budget is spent and are fatal.
    pub fn is_stream_recoverable(&self) -> bool {
        matches!(
            self,
            Icinga2RtError::Decode(_) | Icinga2RtError::StreamClosed | Icinga2RtError::Http(_)
        )
    }
}
