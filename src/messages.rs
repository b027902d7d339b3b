//! Messages exchanged between the popup/CLI, the background authorizer and
//! the playlist page session.

use serde::{Deserialize, Serialize};

use crate::{
    management::{
        AccessTokens, Authorizer, InteractiveAuthLauncher, NavigationWatcher, TabController,
    },
    spotify::auth::TokenExchanger,
    storage::KeyValueStore,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Request {
    #[serde(rename = "initiate_oauth")]
    InitiateOauth { client_id: String },

    #[serde(rename = "get_access_token")]
    GetAccessToken,

    #[serde(rename = "toggle-search")]
    ToggleSearch,

    #[serde(rename = "auth_state_changed")]
    AuthStateChanged { authenticated: bool },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn with_token(access_token: String) -> Self {
        Self {
            success: true,
            access_token: Some(access_token),
            ..Self::default()
        }
    }

    pub fn failure(error: impl ToString) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            ..Self::default()
        }
    }
}

/// Answers the requests that need credentials: `initiate_oauth` and
/// `get_access_token`.
pub struct Background<S, X, L, T, N, A> {
    authorizer: Authorizer<S, X, L, T, N>,
    tokens: A,
}

impl<S, X, L, T, N, A> Background<S, X, L, T, N, A>
where
    S: KeyValueStore,
    X: TokenExchanger,
    L: InteractiveAuthLauncher,
    T: TabController,
    N: NavigationWatcher,
    A: AccessTokens,
{
    pub fn new(authorizer: Authorizer<S, X, L, T, N>, tokens: A) -> Self {
        Self { authorizer, tokens }
    }

    pub fn authorizer(&self) -> &Authorizer<S, X, L, T, N> {
        &self.authorizer
    }

    pub fn tokens(&self) -> &A {
        &self.tokens
    }

    /// Returns `None` for requests addressed to the page session.
    pub async fn handle(&self, request: Request) -> Option<Response> {
        match request {
            Request::InitiateOauth { client_id } => {
                Some(match self.authorizer.authorize(&client_id).await {
                    Ok(()) => Response::ok(),
                    Err(e) => Response::failure(e),
                })
            }
            Request::GetAccessToken => Some(match self.tokens.access_token().await {
                Ok(token) => Response::with_token(token),
                Err(e) => Response::failure(e),
            }),
            Request::ToggleSearch | Request::AuthStateChanged { .. } => None,
        }
    }
}
