use crate::{
    error::AuthError,
    spotify::auth::TokenExchanger,
    storage::{CredentialStore, KeyValueStore},
    types::TokenGrant,
    utils, warning,
};

/// Tokens are refreshed this long before they actually expire, covering
/// clock skew and requests already in flight.
pub const EXPIRY_BUFFER_MS: i64 = 5 * 60 * 1000;

/// Anything that can hand out a bearer token for the Web API.
pub trait AccessTokens {
    async fn access_token(&self) -> Result<String, AuthError>;

    /// Refreshes unconditionally, used after the API rejected a token.
    async fn refreshed_access_token(&self) -> Result<String, AuthError>;
}

/// Owns the token lifecycle: expiry checks, refresh, disconnect.
#[derive(Debug, Clone)]
pub struct TokenManager<S, X> {
    store: CredentialStore<S>,
    exchanger: X,
}

impl<S: KeyValueStore, X: TokenExchanger> TokenManager<S, X> {
    pub fn new(store: CredentialStore<S>, exchanger: X) -> Self {
        Self { store, exchanger }
    }

    pub fn store(&self) -> &CredentialStore<S> {
        &self.store
    }

    /// Returns the stored access token while `now < expires_at - 5min`,
    /// otherwise refreshes first.
    ///
    /// # Errors
    ///
    /// - [`AuthError::NoToken`] when nothing is stored
    /// - [`AuthError::RefreshFailed`] when a needed refresh fails; all stored
    ///   tokens are cleared by then
    pub async fn get_valid_access_token(&self) -> Result<String, AuthError> {
        let credentials = self.store.credentials().await?;
        let Some(access_token) = credentials.access_token else {
            return Err(AuthError::NoToken);
        };

        match credentials.expires_at {
            Some(expires_at) if is_expired(expires_at, utils::now_ms()) => self.refresh().await,
            _ => Ok(access_token),
        }
    }

    /// Exchanges the stored refresh token for a new access token.
    ///
    /// Any failure clears the access token, refresh token and expiry so the
    /// user has to authorize again; an invalid refresh token is never retried.
    pub async fn refresh(&self) -> Result<String, AuthError> {
        match self.try_refresh().await {
            Ok(token) => Ok(token),
            Err(e) => {
                warning!("Token refresh failed, clearing stored tokens: {}", e);
                if let Err(clear_err) = self.store.clear_tokens().await {
                    warning!("Failed to clear stored tokens: {}", clear_err);
                }
                Err(match e {
                    AuthError::RefreshFailed(_) => e,
                    other => AuthError::RefreshFailed(other.to_string()),
                })
            }
        }
    }

    async fn try_refresh(&self) -> Result<String, AuthError> {
        let credentials = self.store.credentials().await?;
        let (Some(client_id), Some(refresh_token)) =
            (credentials.client_id, credentials.refresh_token)
        else {
            return Err(AuthError::RefreshFailed(
                "Missing client ID or refresh token".to_string(),
            ));
        };

        let response = self.exchanger.refresh(&client_id, &refresh_token).await?;
        let grant = TokenGrant::from_response(response, utils::now_ms());
        self.store.save_tokens(&grant).await?;
        Ok(grant.access_token)
    }

    pub async fn is_connected(&self) -> Result<bool, AuthError> {
        Ok(self.store.is_connected().await?)
    }

    /// Forgets all tokens. The client id stays.
    pub async fn disconnect(&self) -> Result<(), AuthError> {
        Ok(self.store.clear_tokens().await?)
    }
}

impl<S: KeyValueStore, X: TokenExchanger> AccessTokens for TokenManager<S, X> {
    async fn access_token(&self) -> Result<String, AuthError> {
        self.get_valid_access_token().await
    }

    async fn refreshed_access_token(&self) -> Result<String, AuthError> {
        self.refresh().await
    }
}

pub fn is_expired(expires_at: i64, now_ms: i64) -> bool {
    now_ms >= expires_at - EXPIRY_BUFFER_MS
}
