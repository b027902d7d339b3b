//! # CLI Module
//!
//! User-facing commands of spotsearch. Each command builds the pieces it
//! needs from [`Settings`], talks to the library and reports through the
//! colored output macros. Fatal problems end the process with
//! [`error!`](crate::error!).
//!
//! ## Commands
//!
//! - [`auth`] - PKCE login: loopback redirect first, pasted-URL fallback
//! - [`set_client_id`] - stores the application's client id
//! - [`disconnect`] - forgets the stored tokens
//! - [`status`] - shows what is stored and when the token expires
//! - [`token`] - prints a valid access token, refreshing when needed
//! - [`search`] - loads a playlist and filters its tracks
//!
//! ## Usage Patterns
//!
//! ```bash
//! spotsearch client-id 0123456789abcdef   # once
//! spotsearch auth                         # log in
//! spotsearch search 37i9dQZF1DXcBWIGoYBM5M --query "daft punk"
//! spotsearch search https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M
//! ```

mod auth;
mod search;

use reqwest::Client;

use crate::{
    config::Settings,
    error,
    management::{Authorizer, TabAuthFlow, TokenManager},
    messages::Background,
    platform::{BrowserTabs, LoopbackLauncher, PastedNavigation},
    spotify::{auth::SpotifyTokenClient, playlist::SpotifyApi},
    storage::{CredentialStore, FileStore},
};

pub use auth::{auth, disconnect, set_client_id, status, token};
pub use search::search;

type Tokens = TokenManager<FileStore, SpotifyTokenClient>;
type DesktopBackground = Background<
    FileStore,
    SpotifyTokenClient,
    LoopbackLauncher,
    BrowserTabs,
    PastedNavigation,
    Tokens,
>;

fn settings() -> Settings {
    match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => error!("Invalid configuration. Err: {}", e),
    }
}

fn credential_store(settings: &Settings) -> CredentialStore<FileStore> {
    CredentialStore::new(FileStore::new(settings.storage_path.clone()))
}

fn token_manager(settings: &Settings, http: &Client) -> Tokens {
    TokenManager::new(
        credential_store(settings),
        SpotifyTokenClient::new(http.clone(), settings.token_url.clone()),
    )
}

fn spotify_api(settings: &Settings, http: &Client) -> SpotifyApi {
    SpotifyApi::new(http.clone(), settings.api_url.clone())
}

fn background(settings: &Settings) -> DesktopBackground {
    let http = Client::new();
    let tabs = BrowserTabs::new();
    let navigation = tabs.pasted_navigation();
    let fallback = TabAuthFlow::new(tabs, navigation, settings.auth.redirect_uris());

    let authorizer = Authorizer::new(
        credential_store(settings),
        SpotifyTokenClient::new(http.clone(), settings.token_url.clone()),
        LoopbackLauncher::new(),
        fallback,
        settings.auth.clone(),
    );
    Background::new(authorizer, token_manager(settings, &http))
}
