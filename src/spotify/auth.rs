use reqwest::Client;

use crate::{
    error::AuthError,
    types::{TokenErrorResponse, TokenResponse},
};

/// Authorization-code grant parameters.
#[derive(Debug, Clone, Copy)]
pub struct CodeGrant<'a> {
    pub client_id: &'a str,
    pub code: &'a str,
    pub code_verifier: &'a str,
    /// Must be the redirect URI the authorization request was made with.
    pub redirect_uri: &'a str,
}

/// The two token endpoint exchanges.
pub trait TokenExchanger {
    async fn exchange(&self, grant: CodeGrant<'_>) -> Result<TokenResponse, AuthError>;

    async fn refresh(&self, client_id: &str, refresh_token: &str)
    -> Result<TokenResponse, AuthError>;
}

/// Token endpoint client speaking form-encoded OAuth 2.0.
#[derive(Debug, Clone)]
pub struct SpotifyTokenClient {
    http: Client,
    token_url: String,
}

impl SpotifyTokenClient {
    pub fn new(http: Client, token_url: impl Into<String>) -> Self {
        Self {
            http,
            token_url: token_url.into(),
        }
    }

    async fn post_form(&self, form: &[(&str, &str)]) -> Result<TokenResponse, String> {
        let res = self
            .http
            .post(&self.token_url)
            .form(form)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.json::<TokenErrorResponse>().await.unwrap_or_default();
            return Err(body
                .error_description
                .or(body.error)
                .unwrap_or_else(|| format!("Token exchange failed ({status})")));
        }

        res.json::<TokenResponse>().await.map_err(|e| e.to_string())
    }
}

impl TokenExchanger for SpotifyTokenClient {
    /// Exchanges an authorization code plus its PKCE verifier for tokens.
    ///
    /// A non-2xx response becomes [`AuthError::TokenExchangeFailed`] carrying
    /// the server's `error_description` when the body has one.
    async fn exchange(&self, grant: CodeGrant<'_>) -> Result<TokenResponse, AuthError> {
        self.post_form(&[
            ("client_id", grant.client_id),
            ("grant_type", "authorization_code"),
            ("code", grant.code),
            ("redirect_uri", grant.redirect_uri),
            ("code_verifier", grant.code_verifier),
        ])
        .await
        .map_err(|description| AuthError::TokenExchangeFailed { description })
    }

    async fn refresh(
        &self,
        client_id: &str,
        refresh_token: &str,
    ) -> Result<TokenResponse, AuthError> {
        self.post_form(&[
            ("client_id", client_id),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
        .map_err(AuthError::RefreshFailed)
    }
}
