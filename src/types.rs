use serde::{Deserialize, Serialize};
use tabled::Tabled;

/// Token payload returned by the token endpoint for both grant types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    pub expires_in: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Everything the credential store keeps between sessions.
///
/// `access_token` being present and non-empty is what "connected" means.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Epoch milliseconds.
    pub expires_at: Option<i64>,
}

/// Tokens ready to be written, with an absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: i64,
}

impl TokenGrant {
    pub fn from_response(response: TokenResponse, now_ms: i64) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token.filter(|t| !t.is_empty()),
            expires_at: i64::try_from(response.expires_in)
                .unwrap_or(i64::MAX)
                .saturating_mul(1000)
                .saturating_add(now_ms),
        }
    }
}

/// Transient secrets of one login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAuthorization {
    pub code_verifier: String,
    pub state: String,
    pub created_at: i64,
}

/// Parameters carried back on the redirect URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistLink {
    pub name: String,
    pub url: String,
}

/// One playable row of a playlist, as shown in the search overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub id: String,
    pub name: String,
    pub artists: Vec<ArtistLink>,
    pub album: String,
    pub album_url: String,
    pub album_image_url: Option<String>,
}

#[derive(Tabled)]
pub struct TrackTableRow {
    #[tabled(rename = "#")]
    pub position: String,
    pub title: String,
    pub artists: String,
    pub album: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistTracksPage {
    #[serde(default)]
    pub items: Vec<PlaylistItem>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistItem {
    #[serde(default)]
    pub track: Option<ApiTrack>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiTrack {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ApiArtist>,
    #[serde(default)]
    pub album: ApiAlbum,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiArtist {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiAlbum {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub external_urls: ExternalUrls,
    #[serde(default)]
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExternalUrls {
    #[serde(default)]
    pub spotify: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Image {
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}
