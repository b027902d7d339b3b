//! # Spotify Integration Module
//!
//! HTTP clients for the two Spotify services this crate talks to:
//!
//! - [`auth`] - the accounts token endpoint (authorization-code and
//!   refresh-token grants, form-encoded)
//! - [`playlist`] - the Web API playlist tracks endpoint, followed page by
//!   page through its `next` cursor
//!
//! Both are exposed behind small traits ([`auth::TokenExchanger`],
//! [`playlist::TrackSource`]) so the authorization flow and the playlist
//! session can be exercised without a network.
//!
//! ## API Coverage
//!
//! - `POST /api/token` - code exchange and refresh
//! - `GET /playlists/{id}/tracks?limit=50` - playlist items
//!
//! ## Error Types
//!
//! - [`crate::error::AuthError`] - token endpoint failures
//! - [`crate::error::FetchError`] - playlist endpoint failures; `401` maps to
//!   `Unauthorized`, other non-2xx statuses to `HttpError`

pub mod auth;
pub mod playlist;
