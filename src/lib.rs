//! Spotify Playlist Search Library
//!
//! This library provides the pieces behind the `spotsearch` tool: an OAuth 2.0
//! PKCE authorization flow with a tab-based fallback, token lifecycle
//! management, a paginated playlist fetcher, a text filter over the fetched
//! tracks, and a locator that finds (and starts) a track row inside the web
//! player's virtualized track list.
//!
//! Browser capabilities such as storage, tabs, the identity redirect and the
//! host page are expressed as traits so they can be supplied by a desktop
//! shell, an extension runtime, or a test.
//!
//! # Modules
//!
//! - `api` - HTTP handlers for the local redirect server
//! - `cli` - Command-line interface implementations
//! - `config` - Configuration management and environment variables
//! - `error` - Error taxonomy shared by all components
//! - `locator` - Track row location in the virtualized track list
//! - `management` - Authorization flow, token lifecycle and playlist session
//! - `messages` - Request/response messages between components
//! - `navigation` - Debounced page navigation events
//! - `platform` - Desktop implementations of the browser capabilities
//! - `search` - Track filtering and the search overlay model
//! - `server` - Local HTTP server for OAuth redirects
//! - `spotify` - Spotify token and playlist endpoints
//! - `storage` - Key-value persistence and the credential store
//! - `types` - Data structures and type definitions
//! - `utils` - PKCE helpers and URL parsing
//!
//! # Example
//!
//! ```
//! use spotsearch::config;
//!
//! #[tokio::main]
//! async fn main() -> spotsearch::Res<()> {
//!     config::load_env().await?;
//!     let settings = config::Settings::from_env()?;
//!     Ok(())
//! }
//! ```
#![allow(async_fn_in_trait)]

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod locator;
pub mod management;
pub mod messages;
pub mod navigation;
pub mod platform;
pub mod search;
pub mod server;
pub mod spotify;
pub mod storage;
pub mod types;
pub mod utils;

/// A convenient Result type alias for operations that may fail.
///
/// Used by the application glue (CLI commands, configuration loading) where
/// the concrete error type does not matter to the caller. Components with a
/// defined failure taxonomy return the enums from [`error`] instead.
pub type Res<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Prints an informational message with a blue bullet point.
///
/// # Example
///
/// ```
/// info!("Starting authorization...");
/// info!("Loaded {} tracks", count);
/// ```
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a success message with a green checkmark.
///
/// # Example
///
/// ```
/// success!("Authentication completed successfully");
/// ```
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints an error message with a red exclamation mark and exits the program.
///
/// Only the binary uses this macro. Library code reports failures through
/// its return values and [`warning!`].
///
/// # Example
///
/// ```
/// error!("Failed to load configuration");
/// // Program exits here - code after this will not execute
/// ```
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".red().bold(), std::format_args!($($arg)*));
    std::process::exit(1);
  })
}

/// Prints a warning message with a yellow exclamation mark.
///
/// Used for recoverable conditions: a track that could not be located, a
/// play control that could not be clicked, a cleanup step that failed.
///
/// # Example
///
/// ```
/// warning!("Track not found after scrolling: {}", track_id);
/// ```
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}
