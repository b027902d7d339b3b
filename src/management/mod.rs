//! Stateful parts of the crate: the authorization flow and its tab-based
//! fallback, the token lifecycle, and the per-page playlist session.

mod auth;
mod authorize;
mod fallback;
mod session;

pub use auth::{AccessTokens, EXPIRY_BUFFER_MS, TokenManager, is_expired};
pub use authorize::{
    AuthStage, Authorizer, InteractiveAuthLauncher, LaunchError, validate_redirect,
};
pub use fallback::{
    FALLBACK_TIMEOUT, Navigation, NavigationWatcher, TabAuthFlow, TabController, TabId,
};
pub use session::{LoadOutcome, PlaylistSession};
