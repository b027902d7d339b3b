//! End-to-end PKCE authorization.
//!
//! One call to [`Authorizer::authorize`] walks
//! `idle → pkce_ready → awaiting_redirect → code_received → token_exchanged → complete`,
//! dropping to `failed` from any stage. The transient verifier/state record is
//! removed whichever way the attempt ends.

use std::{
    fmt,
    sync::{Mutex, PoisonError},
};

use reqwest::Url;

use crate::{
    config::AuthEndpoints,
    error::AuthError,
    info,
    spotify::auth::{CodeGrant, TokenExchanger},
    storage::{CredentialStore, KeyValueStore},
    success,
    types::{PendingAuthorization, RedirectParams, TokenGrant},
    utils::{self, STATE_LENGTH, VERIFIER_LENGTH},
    warning,
};

use super::fallback::{NavigationWatcher, TabAuthFlow, TabController};

/// Why an interactive launch did not produce a redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchError {
    /// The user closed or refused the consent screen.
    Cancelled(String),
    /// The mechanism itself failed; the tab flow is tried next.
    Unavailable(String),
}

/// Browser-native flow: shows the consent screen and resolves with the final
/// redirect URL.
pub trait InteractiveAuthLauncher {
    async fn launch(&self, auth_url: &str, redirect_uri: &str) -> Result<String, LaunchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStage {
    Idle,
    PkceReady,
    AwaitingRedirect,
    CodeReceived,
    TokenExchanged,
    Complete,
    Failed,
}

impl fmt::Display for AuthStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthStage::Idle => "idle",
            AuthStage::PkceReady => "pkce_ready",
            AuthStage::AwaitingRedirect => "awaiting_redirect",
            AuthStage::CodeReceived => "code_received",
            AuthStage::TokenExchanged => "token_exchanged",
            AuthStage::Complete => "complete",
            AuthStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

pub struct Authorizer<S, X, L, T, N> {
    store: CredentialStore<S>,
    exchanger: X,
    launcher: L,
    fallback: TabAuthFlow<T, N>,
    endpoints: AuthEndpoints,
    stage: Mutex<AuthStage>,
}

impl<S, X, L, T, N> Authorizer<S, X, L, T, N>
where
    S: KeyValueStore,
    X: TokenExchanger,
    L: InteractiveAuthLauncher,
    T: TabController,
    N: NavigationWatcher,
{
    pub fn new(
        store: CredentialStore<S>,
        exchanger: X,
        launcher: L,
        fallback: TabAuthFlow<T, N>,
        endpoints: AuthEndpoints,
    ) -> Self {
        Self {
            store,
            exchanger,
            launcher,
            fallback,
            endpoints,
            stage: Mutex::new(AuthStage::Idle),
        }
    }

    pub fn stage(&self) -> AuthStage {
        *self.stage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn endpoints(&self) -> &AuthEndpoints {
        &self.endpoints
    }

    pub fn fallback(&self) -> &TabAuthFlow<T, N> {
        &self.fallback
    }

    /// Runs one complete login for `client_id` and persists the tokens.
    pub async fn authorize(&self, client_id: &str) -> Result<(), AuthError> {
        self.advance(AuthStage::Idle);
        let client_id = client_id.trim();
        if client_id.is_empty() {
            self.advance(AuthStage::Failed);
            return Err(AuthError::InvalidClientId);
        }

        let pending = PendingAuthorization {
            code_verifier: utils::generate_verifier(VERIFIER_LENGTH),
            state: utils::generate_state(STATE_LENGTH),
            created_at: utils::now_ms(),
        };
        let result = self.attempt(client_id, &pending).await;

        // A newer attempt may own the stored record by now
        if let Err(e) = self.store.clear_pending_if(&pending.state).await {
            warning!("Failed to remove pending authorization: {}", e);
        }

        match &result {
            Ok(()) => {
                self.advance(AuthStage::Complete);
                success!("Authentication successful!");
            }
            Err(e) => {
                self.advance(AuthStage::Failed);
                warning!("Authorization failed: {}", e);
            }
        }
        result
    }

    async fn attempt(
        &self,
        client_id: &str,
        pending: &PendingAuthorization,
    ) -> Result<(), AuthError> {
        let challenge = utils::derive_challenge(&pending.code_verifier);
        self.store.save_pending(pending).await?;
        self.advance(AuthStage::PkceReady);

        self.advance(AuthStage::AwaitingRedirect);
        let (params, redirect_uri) = self
            .await_redirect(client_id, &challenge, &pending.state)
            .await?;

        let code = validate_redirect(&params, &pending.state)?;
        self.advance(AuthStage::CodeReceived);

        let response = self
            .exchanger
            .exchange(CodeGrant {
                client_id,
                code: &code,
                code_verifier: &pending.code_verifier,
                redirect_uri: &redirect_uri,
            })
            .await?;
        self.advance(AuthStage::TokenExchanged);

        let grant = TokenGrant::from_response(response, utils::now_ms());
        self.store.save_authorization(client_id, &grant).await?;
        Ok(())
    }

    /// Interactive flow first; the tab flow only when the mechanism itself
    /// failed, never after the user refused.
    async fn await_redirect(
        &self,
        client_id: &str,
        challenge: &str,
        state: &str,
    ) -> Result<(RedirectParams, String), AuthError> {
        let redirect_uri = &self.endpoints.redirect_uri;
        let auth_url = self.authorization_url(client_id, challenge, state, redirect_uri)?;

        let reason = match self.launcher.launch(&auth_url, redirect_uri).await {
            Ok(redirect_url) => {
                let params = utils::parse_redirect_params(&redirect_url)?;
                return Ok((params, redirect_uri.clone()));
            }
            Err(LaunchError::Cancelled(reason)) => return Err(AuthError::AuthDenied(reason)),
            Err(LaunchError::Unavailable(reason)) => reason,
        };
        warning!("Interactive authorization unavailable ({}), opening a tab", reason);

        let redirect_uri = &self.endpoints.fallback_redirect_uri;
        let auth_url = self.authorization_url(client_id, challenge, state, redirect_uri)?;
        let params = self.fallback.run(&auth_url).await.map_err(|e| match e {
            AuthError::Browser(tab_error) => AuthError::LaunchUnavailable(format!(
                "{}; the fallback tab could not be opened either: {}",
                reason, tab_error
            )),
            other => other,
        })?;
        Ok((params, redirect_uri.clone()))
    }

    /// Authorization request URL for one redirect URI.
    pub fn authorization_url(
        &self,
        client_id: &str,
        challenge: &str,
        state: &str,
        redirect_uri: &str,
    ) -> Result<String, AuthError> {
        let show_dialog = if self.endpoints.show_dialog {
            "true"
        } else {
            "false"
        };
        let url = Url::parse_with_params(
            &self.endpoints.authorize_url,
            &[
                ("client_id", client_id),
                ("response_type", "code"),
                ("redirect_uri", redirect_uri),
                ("code_challenge_method", "S256"),
                ("code_challenge", challenge),
                ("state", state),
                ("scope", self.endpoints.scope.as_str()),
                ("show_dialog", show_dialog),
            ],
        )
        .map_err(|e| AuthError::InvalidRedirect(e.to_string()))?;
        Ok(url.into())
    }

    fn advance(&self, stage: AuthStage) {
        let mut current = self.stage.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != stage {
            info!("Authorization: {} -> {}", *current, stage);
        }
        *current = stage;
    }
}

/// Checks a redirect in order: provider error, missing code, state.
/// The state comparison is exact.
pub fn validate_redirect(params: &RedirectParams, expected_state: &str) -> Result<String, AuthError> {
    if let Some(error) = &params.error {
        return Err(AuthError::AuthDenied(error.clone()));
    }
    let Some(code) = params.code.clone().filter(|c| !c.is_empty()) else {
        return Err(AuthError::NoAuthorizationCode);
    };
    if params.state.as_deref() != Some(expected_state) {
        return Err(AuthError::StateMismatch);
    }
    Ok(code)
}
