use serde_json::{Map, Value, json};

use crate::{
    error::StorageError,
    types::{Credentials, PendingAuthorization, TokenGrant},
};

use super::KeyValueStore;

pub const KEY_CLIENT_ID: &str = "spotify_client_id";
pub const KEY_ACCESS_TOKEN: &str = "spotify_access_token";
pub const KEY_REFRESH_TOKEN: &str = "spotify_refresh_token";
pub const KEY_EXPIRES_AT: &str = "spotify_token_expires_at";

pub const KEY_CODE_VERIFIER: &str = "oauth_code_verifier";
pub const KEY_STATE: &str = "oauth_state";
pub const KEY_PENDING_CREATED_AT: &str = "oauth_created_at";

const TOKEN_KEYS: [&str; 3] = [KEY_ACCESS_TOKEN, KEY_REFRESH_TOKEN, KEY_EXPIRES_AT];
const PENDING_KEYS: [&str; 3] = [KEY_CODE_VERIFIER, KEY_STATE, KEY_PENDING_CREATED_AT];

/// Typed view over a [`KeyValueStore`] holding the client id, the token
/// triple and the transient PKCE secrets of an in-flight login.
#[derive(Debug, Clone)]
pub struct CredentialStore<S> {
    store: S,
}

impl<S: KeyValueStore> CredentialStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn inner(&self) -> &S {
        &self.store
    }

    pub async fn client_id(&self) -> Result<Option<String>, StorageError> {
        let entries = self.store.get(&[KEY_CLIENT_ID]).await?;
        Ok(non_empty_str(&entries, KEY_CLIENT_ID))
    }

    pub async fn set_client_id(&self, client_id: &str) -> Result<(), StorageError> {
        let mut entries = Map::new();
        entries.insert(KEY_CLIENT_ID.to_string(), json!(client_id.trim()));
        self.store.set(entries).await
    }

    pub async fn credentials(&self) -> Result<Credentials, StorageError> {
        let entries = self
            .store
            .get(&[KEY_CLIENT_ID, KEY_ACCESS_TOKEN, KEY_REFRESH_TOKEN, KEY_EXPIRES_AT])
            .await?;

        Ok(Credentials {
            client_id: non_empty_str(&entries, KEY_CLIENT_ID),
            access_token: non_empty_str(&entries, KEY_ACCESS_TOKEN),
            refresh_token: non_empty_str(&entries, KEY_REFRESH_TOKEN),
            expires_at: entries.get(KEY_EXPIRES_AT).and_then(Value::as_i64),
        })
    }

    pub async fn is_connected(&self) -> Result<bool, StorageError> {
        Ok(self.credentials().await?.access_token.is_some())
    }

    /// Writes the token triple in one store operation. The refresh token is
    /// left untouched when the grant carries none.
    pub async fn save_tokens(&self, grant: &TokenGrant) -> Result<(), StorageError> {
        self.store.set(token_entries(grant)).await
    }

    /// Like [`save_tokens`](Self::save_tokens), also recording the client id
    /// the tokens were issued to.
    pub async fn save_authorization(
        &self,
        client_id: &str,
        grant: &TokenGrant,
    ) -> Result<(), StorageError> {
        let mut entries = token_entries(grant);
        entries.insert(KEY_CLIENT_ID.to_string(), json!(client_id));
        self.store.set(entries).await
    }

    pub async fn clear_tokens(&self) -> Result<(), StorageError> {
        self.store.remove(&TOKEN_KEYS).await
    }

    pub async fn save_pending(&self, pending: &PendingAuthorization) -> Result<(), StorageError> {
        let mut entries = Map::new();
        entries.insert(KEY_CODE_VERIFIER.to_string(), json!(pending.code_verifier));
        entries.insert(KEY_STATE.to_string(), json!(pending.state));
        entries.insert(KEY_PENDING_CREATED_AT.to_string(), json!(pending.created_at));
        self.store.set(entries).await
    }

    pub async fn pending(&self) -> Result<Option<PendingAuthorization>, StorageError> {
        let entries = self.store.get(&PENDING_KEYS).await?;
        let (Some(code_verifier), Some(state)) = (
            non_empty_str(&entries, KEY_CODE_VERIFIER),
            non_empty_str(&entries, KEY_STATE),
        ) else {
            return Ok(None);
        };

        Ok(Some(PendingAuthorization {
            code_verifier,
            state,
            created_at: entries
                .get(KEY_PENDING_CREATED_AT)
                .and_then(Value::as_i64)
                .unwrap_or_default(),
        }))
    }

    pub async fn clear_pending(&self) -> Result<(), StorageError> {
        self.store.remove(&PENDING_KEYS).await
    }

    /// Removes the pending record only if it still belongs to the attempt
    /// that generated `state`. Returns whether anything was removed.
    pub async fn clear_pending_if(&self, state: &str) -> Result<bool, StorageError> {
        let entries = self.store.get(&[KEY_STATE]).await?;
        if non_empty_str(&entries, KEY_STATE).as_deref() != Some(state) {
            return Ok(false);
        }
        self.store.remove(&PENDING_KEYS).await?;
        Ok(true)
    }
}

fn token_entries(grant: &TokenGrant) -> Map<String, Value> {
    let mut entries = Map::new();
    entries.insert(KEY_ACCESS_TOKEN.to_string(), json!(grant.access_token));
    entries.insert(KEY_EXPIRES_AT.to_string(), json!(grant.expires_at));
    if let Some(refresh_token) = &grant.refresh_token {
        entries.insert(KEY_REFRESH_TOKEN.to_string(), json!(refresh_token));
    }
    entries
}

fn non_empty_str(entries: &Map<String, Value>, key: &str) -> Option<String> {
    entries
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
