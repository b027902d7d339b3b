//! Configuration management for spotsearch.
//!
//! Values come from environment variables, optionally loaded from a `.env`
//! file in the local data directory. Everything except the client id has a
//! default pointing at the public Spotify endpoints.
//!
//! The configuration system follows a hierarchical approach:
//! 1. Environment variables (highest priority)
//! 2. `.env` file in the local data directory
//! 3. Application defaults

use std::{env, path::PathBuf};

use crate::{error::ConfigError, storage::FileStore};

pub const DEFAULT_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_SCOPE: &str = "playlist-read-private playlist-read-collaborative";
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8888/callback";
pub const DEFAULT_FALLBACK_REDIRECT_URI: &str = "http://127.0.0.1:8888/";

/// Loads environment variables from a `.env` file in the local data directory.
///
/// The function looks for the `.env` file in:
/// - Linux: `~/.local/share/spotsearch/.env`
/// - macOS: `~/Library/Application Support/spotsearch/.env`
/// - Windows: `%LOCALAPPDATA%/spotsearch/.env`
///
/// A missing file is not an error; the defaults and the process environment
/// still apply.
///
/// # Errors
///
/// This function will return an error if:
/// - The parent directory cannot be created
/// - The `.env` file exists but cannot be read or parsed
pub async fn load_env() -> Result<(), ConfigError> {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("spotsearch/.env");
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent).await?;
    }

    if path.is_file() {
        dotenv::from_path(&path).map_err(|e| ConfigError::Dotenv(e.to_string()))?;
    }
    Ok(())
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Returns the client id from `SPOTIFY_API_AUTH_CLIENT_ID`, if set.
///
/// The client id may also be stored with `spotsearch client-id`, which takes
/// effect when this variable is absent.
pub fn spotify_client_id() -> Option<String> {
    env::var("SPOTIFY_API_AUTH_CLIENT_ID")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Returns the OAuth authorization endpoint (`SPOTIFY_API_AUTH_URL`).
pub fn spotify_apiauth_url() -> String {
    var_or("SPOTIFY_API_AUTH_URL", DEFAULT_AUTH_URL)
}

/// Returns the OAuth token endpoint (`SPOTIFY_API_TOKEN_URL`).
pub fn spotify_apitoken_url() -> String {
    var_or("SPOTIFY_API_TOKEN_URL", DEFAULT_TOKEN_URL)
}

/// Returns the Web API base URL (`SPOTIFY_API_URL`).
pub fn spotify_apiurl() -> String {
    var_or("SPOTIFY_API_URL", DEFAULT_API_URL)
}

/// Returns the requested scope (`SPOTIFY_API_AUTH_SCOPE`).
pub fn spotify_scope() -> String {
    var_or("SPOTIFY_API_AUTH_SCOPE", DEFAULT_SCOPE)
}

/// Returns the redirect URI served by the local redirect server
/// (`SPOTIFY_API_REDIRECT_URI`). It must be registered with the application.
pub fn spotify_redirect_uri() -> String {
    var_or("SPOTIFY_API_REDIRECT_URI", DEFAULT_REDIRECT_URI)
}

/// Returns the fallback redirect URI used by the pasted-URL flow
/// (`SPOTIFY_API_FALLBACK_REDIRECT_URI`). It must be registered as well.
pub fn spotify_fallback_redirect_uri() -> String {
    var_or(
        "SPOTIFY_API_FALLBACK_REDIRECT_URI",
        DEFAULT_FALLBACK_REDIRECT_URI,
    )
}

/// Returns the credential storage file (`SPOTSEARCH_STORAGE_PATH`).
pub fn storage_path() -> PathBuf {
    env::var("SPOTSEARCH_STORAGE_PATH")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(FileStore::default_path)
}

/// Endpoints and redirect URIs used by the authorization flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEndpoints {
    pub authorize_url: String,
    pub scope: String,
    /// Redirect captured by the interactive launcher.
    pub redirect_uri: String,
    /// Redirect watched for by the tab-based fallback.
    pub fallback_redirect_uri: String,
    pub show_dialog: bool,
}

impl AuthEndpoints {
    /// Both URIs have to be registered with the authorization server.
    pub fn redirect_uris(&self) -> Vec<String> {
        vec![
            self.redirect_uri.clone(),
            self.fallback_redirect_uri.clone(),
        ]
    }
}

/// Snapshot of all settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub client_id: Option<String>,
    pub token_url: String,
    pub api_url: String,
    pub storage_path: PathBuf,
    pub auth: AuthEndpoints,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let settings = Self {
            client_id: spotify_client_id(),
            token_url: spotify_apitoken_url(),
            api_url: spotify_apiurl().trim_end_matches('/').to_string(),
            storage_path: storage_path(),
            auth: AuthEndpoints {
                authorize_url: spotify_apiauth_url(),
                scope: spotify_scope(),
                redirect_uri: spotify_redirect_uri(),
                fallback_redirect_uri: spotify_fallback_redirect_uri(),
                show_dialog: true,
            },
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let urls = [
            ("SPOTIFY_API_AUTH_URL", &self.auth.authorize_url),
            ("SPOTIFY_API_TOKEN_URL", &self.token_url),
            ("SPOTIFY_API_URL", &self.api_url),
            ("SPOTIFY_API_REDIRECT_URI", &self.auth.redirect_uri),
            (
                "SPOTIFY_API_FALLBACK_REDIRECT_URI",
                &self.auth.fallback_redirect_uri,
            ),
        ];
        for (key, value) in urls {
            reqwest::Url::parse(value).map_err(|e| ConfigError::Invalid {
                key,
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }
}
