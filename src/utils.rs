use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use rand::RngCore;
use reqwest::Url;
use sha2::{Digest, Sha256};

use crate::{
    error::AuthError,
    types::{Image, RedirectParams},
};

/// Characters allowed in a PKCE code verifier (RFC 7636 "unreserved").
pub const UNRESERVED: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

pub const VERIFIER_LENGTH: usize = 128;
pub const STATE_LENGTH: usize = 16;

fn random_unreserved(length: usize) -> String {
    let mut bytes = vec![0u8; length];
    rand::rng().fill_bytes(&mut bytes);
    bytes
        .into_iter()
        .map(|b| UNRESERVED[b as usize % UNRESERVED.len()] as char)
        .collect()
}

/// Draws `length` random bytes from the thread CSPRNG and maps each onto the
/// unreserved alphabet.
pub fn generate_verifier(length: usize) -> String {
    random_unreserved(length)
}

/// Anti-forgery token sent as `state` and compared on the redirect.
pub fn generate_state(length: usize) -> String {
    random_unreserved(length)
}

/// S256 code challenge: base64url(sha256(verifier)) without padding.
pub fn derive_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Returns the playlist id from a web player URL or path
/// (`.../playlist/{id}[/...]`), or the input itself when it already looks
/// like a bare id.
pub fn extract_playlist_id(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let path = match Url::parse(trimmed) {
        Ok(url) => url.path().to_string(),
        Err(_) => trimmed.to_string(),
    };

    let parts: Vec<&str> = path.split('/').collect();
    if let Some(index) = parts.iter().position(|p| *p == "playlist") {
        return parts
            .get(index + 1)
            .filter(|id| !id.is_empty())
            .map(|id| id.to_string());
    }

    if !trimmed.contains('/') && !trimmed.contains(':') {
        return Some(trimmed.to_string());
    }
    None
}

/// Extracts `code`, `state` and `error` from a redirect URL. Values in the
/// query string win over values in the fragment.
pub fn parse_redirect_params(redirect_url: &str) -> Result<RedirectParams, AuthError> {
    let url =
        Url::parse(redirect_url).map_err(|e| AuthError::InvalidRedirect(e.to_string()))?;

    let mut params = RedirectParams::default();
    collect_params(&url, &mut params);

    if let Some(fragment) = url.fragment().filter(|f| !f.is_empty()) {
        let mut probe = url.clone();
        probe.set_fragment(None);
        probe.set_query(Some(fragment));
        collect_params(&probe, &mut params);
    }

    Ok(params)
}

fn collect_params(url: &Url, params: &mut RedirectParams) {
    for (key, value) in url.query_pairs() {
        let slot = match key.as_ref() {
            "code" => &mut params.code,
            "state" => &mut params.state,
            "error" => &mut params.error,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some(value.into_owned());
        }
    }
}

/// Whether `url` is a navigation to one of the accepted redirect URIs.
pub fn matches_redirect(url: &str, prefixes: &[String]) -> bool {
    prefixes
        .iter()
        .any(|prefix| !prefix.is_empty() && url.starts_with(prefix.as_str()))
}

pub fn smallest_image(images: &[Image]) -> Option<String> {
    images
        .iter()
        .min_by_key(|image| image.width.unwrap_or(u32::MAX))
        .map(|image| image.url.clone())
}
