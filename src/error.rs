//! Centralized error types for mailtrace.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailtrace library.
///
/// Every variant is recoverable: the caller reports it and the analysis
/// session stays usable for another attempt or another message.
#[derive(Error, Debug)]
pub enum ForensicError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The bytes could not be parsed as a structured mail message.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// A `Date:` header is present but could not be parsed.
    #[error("Unparsable Date header: '{0}'")]
    DateFormat(String),

    /// The message has neither an HTML nor a plain-text body part.
    #[error("Message has no renderable (HTML or plain-text) body part")]
    NoRenderableBody,

    /// The message carries no `Received:` header at all.
    #[error("No 'Received' headers found in the message")]
    NoReceivedHeader,

    /// The earliest `Received:` header holds no bracketed IPv4 literal.
    #[error("No bracketed IPv4 address found in the earliest 'Received' header")]
    NoIpFound,

    /// The geolocation lookup failed for any reason.
    #[error("Geolocation unavailable for {ip}: {reason}")]
    GeolocationUnavailable { ip: Ipv4Addr, reason: String },

    /// The keyword is empty after trimming.
    #[error("Search keyword is empty")]
    EmptyQuery,

    /// Writing a report or map artifact failed.
    #[error("Failed to write artifact '{path}': {source}")]
    ReportWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An operation needing a message was called before one was loaded.
    #[error("No message loaded")]
    NoMessageLoaded,
}

/// Convenience alias for `Result<T, ForensicError>`.
pub type Result<T> = std::result::Result<T, ForensicError>;

impl ForensicError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a `ReportWrite` variant from a path and an `io::Error`.
    pub fn report_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReportWrite {
            path: path.into(),
            source,
        }
    }

    /// Create a `GeolocationUnavailable` variant.
    pub fn geo(ip: Ipv4Addr, reason: impl Into<String>) -> Self {
        Self::GeolocationUnavailable {
            ip,
            reason: reason.into(),
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (rare, prefer `ForensicError::io`).
impl From<std::io::Error> for ForensicError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
