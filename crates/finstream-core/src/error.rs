//! Error types for Finstream Core

use thiserror::Error;

/// Result type alias for playback operations
pub type Result<T> = std::result::Result<T, Error>;

/// Playback engine error types
///
/// Expected failures are not errors here: an adapter that cannot run in the
/// current environment reports it through `initialize() -> Ok(false)`, and an
/// out-of-range track id is a `false` return from track selection. The
/// variants below cover contract violations, network faults, and the one
/// fatal case where no engine could be produced at all.
#[derive(Error, Debug)]
pub enum Error {
    // Factory errors
    #[error("No playable engine available (attempted: {attempted})")]
    NoPlayableEngine { attempted: String },

    // State machine errors
    #[error("Invalid adapter state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Adapter is not ready for load: current state {state}")]
    NotReady { state: String },

    #[error("Media surface detached")]
    SurfaceDetached,

    // Streaming engine errors
    #[error("Failed to fetch manifest: {0}")]
    ManifestFetch(String),

    #[error("Failed to parse manifest: {0}")]
    ManifestParse(String),

    // Load errors
    #[error("Failed to load media: {0}")]
    MediaLoad(String),

    // Server negotiation errors
    #[error("Server rejected playback request: status {status}: {message}")]
    Server { status: u16, message: String },

    // Network errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns true if this error is recoverable by retrying or falling back
    /// to a different profile/URL
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::ManifestFetch(_) | Error::MediaLoad(_) | Error::Network(_)
        )
    }

    /// Returns the error code surfaced through `error` events
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::NoPlayableEngine { .. } => "NO_ENGINE",
            Error::InvalidStateTransition { .. } => "INVALID_STATE",
            Error::NotReady { .. } => "NOT_READY",
            Error::SurfaceDetached => "SURFACE_DETACHED",
            Error::ManifestFetch(_) => "MANIFEST_FETCH",
            Error::ManifestParse(_) => "MANIFEST_PARSE",
            Error::MediaLoad(_) => "MEDIA_LOAD",
            Error::Server { .. } => "SERVER",
            Error::Network(_) => "NETWORK",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Internal(_) => "INTERNAL",
        }
    }
}
