//! # API Module
//!
//! HTTP endpoints of the short-lived loopback server that receives the
//! authorization redirect.
//!
//! ## Endpoints
//!
//! - [`callback`] - Captures the full redirect URL (query and all) and hands
//!   it to the waiting authorization attempt through a [`RedirectCapture`].
//!   The code exchange itself happens in [`crate::management::Authorizer`],
//!   after the state check.
//! - [`health`] - Reports status and version, useful to check that the
//!   redirect port is really ours.
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use axum::{Extension, Router, routing::get};
//! use spotsearch::api::{RedirectCapture, callback, health};
//!
//! let (capture, redirect) = RedirectCapture::new("http://127.0.0.1:8888");
//! let app = Router::new()
//!     .route("/callback", get(callback).layer(Extension(capture)))
//!     .route("/health", get(health));
//! ```

mod callback;
mod health;

pub use callback::{RedirectCapture, callback};
pub use health::health;
