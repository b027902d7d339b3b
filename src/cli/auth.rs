use chrono::{Local, TimeZone};

use crate::{
    config, error, info,
    messages::Request,
    success, utils, warning,
};

use super::{background, credential_store, settings};

/// Runs the PKCE login and stores the resulting tokens.
///
/// The client id is taken from `--client-id`, then from
/// `SPOTIFY_API_AUTH_CLIENT_ID`, then from the stored value.
pub async fn auth(client_id: Option<String>) {
    let settings = settings();
    let store = credential_store(&settings);

    let stored = match store.client_id().await {
        Ok(stored) => stored,
        Err(e) => {
            warning!("Cannot read stored client id. Err: {}", e);
            None
        }
    };
    let Some(client_id) = client_id.or(settings.client_id.clone()).or(stored) else {
        error!("No client id configured. Run `spotsearch client-id <ID>` or pass --client-id.");
    };

    let background = background(&settings);
    let response = background
        .handle(Request::InitiateOauth { client_id })
        .await;

    match response {
        Some(response) if response.success => {
            success!("Connected to Spotify.");
        }
        Some(response) => {
            warning!(
                "Make sure both redirect URIs are registered in your Spotify application settings:"
            );
            for uri in settings.auth.redirect_uris() {
                println!("    {}", uri);
            }
            error!(
                "Authentication failed. Err: {}",
                response.error.unwrap_or_default()
            );
        }
        None => error!("Authentication request was not handled."),
    }
}

pub async fn set_client_id(client_id: String) {
    if client_id.trim().is_empty() {
        error!("Please enter a valid client ID.");
    }

    let settings = settings();
    match credential_store(&settings).set_client_id(&client_id).await {
        Ok(()) => success!("Client ID saved."),
        Err(e) => error!("Cannot save client id. Err: {}", e),
    }
}

pub async fn disconnect() {
    let settings = settings();
    match credential_store(&settings).clear_tokens().await {
        Ok(()) => success!("Disconnected from Spotify."),
        Err(e) => error!("Cannot remove stored tokens. Err: {}", e),
    }
}

pub async fn status() {
    let settings = settings();
    let credentials = match credential_store(&settings).credentials().await {
        Ok(credentials) => credentials,
        Err(e) => error!("Cannot read stored credentials. Err: {}", e),
    };

    info!("Storage: {}", settings.storage_path.display());
    match credentials.client_id.or(config::spotify_client_id()) {
        Some(client_id) => info!("Client ID: {}", client_id),
        None => warning!("Client ID: not set"),
    }

    if credentials.access_token.is_none() {
        warning!("Not connected. Run `spotsearch auth` to authenticate.");
        return;
    }
    success!("Connected to Spotify.");

    match credentials.expires_at {
        Some(expires_at) => {
            let expiry = Local
                .timestamp_millis_opt(expires_at)
                .single()
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| expires_at.to_string());
            if expires_at <= utils::now_ms() {
                warning!("Access token expired at {}", expiry);
            } else {
                info!("Access token valid until {}", expiry);
            }
        }
        None => info!("Access token has no recorded expiry"),
    }

    if credentials.refresh_token.is_none() {
        warning!("No refresh token stored; you will need to log in again once the token expires.");
    }
}

/// Prints a valid access token, refreshing it first when it is about to
/// expire.
pub async fn token() {
    let settings = settings();
    let background = background(&settings);
    match background.handle(Request::GetAccessToken).await {
        Some(response) => match response.access_token {
            Some(token) if response.success => println!("{}", token),
            _ => error!(
                "Cannot get an access token. Err: {}. Run `spotsearch auth` to authenticate.",
                response.error.unwrap_or_default()
            ),
        },
        None => error!("Token request was not handled."),
    }
}
