//! Error taxonomy for authorization, playlist fetching, track location,
//! storage and configuration.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("storage document is not a JSON object")]
    NotAnObject,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot prepare config directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot read .env file: {0}")]
    Dotenv(String),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Failures of the authorization flow and the token lifecycle.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid client ID provided")]
    InvalidClientId,

    #[error("Authorization denied: {0}")]
    AuthDenied(String),

    #[error("Authorization timed out")]
    AuthTimeout,

    #[error("Authorization interrupted by a newer attempt")]
    Interrupted,

    #[error("State parameter mismatch")]
    StateMismatch,

    #[error("No authorization code received")]
    NoAuthorizationCode,

    #[error("{description}")]
    TokenExchangeFailed { description: String },

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("No access token found")]
    NoToken,

    /// The interactive redirect mechanism itself is not usable.
    #[error("Interactive authorization unavailable: {0}")]
    LaunchUnavailable(String),

    #[error("Browser tab error: {0}")]
    Browser(String),

    #[error("Invalid redirect URL: {0}")]
    InvalidRedirect(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failures of the playlist data fetcher.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error("HTTP {status}")]
    HttpError { status: u16 },

    #[error("Unable to get playlist information")]
    NoPlaylist,

    #[error(transparent)]
    Request(#[from] reqwest::Error),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Non-fatal failures of the track locator. These are logged, never raised
/// past the locator's public entry points.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocateError {
    #[error("Track not found in the track list: {0}")]
    TrackNotFound(String),

    #[error("No scrollable track list container found")]
    NoScrollableContainer,

    #[error("No currently playing track found")]
    NothingPlaying,
}
