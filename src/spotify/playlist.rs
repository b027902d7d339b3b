use std::time::Duration;

use reqwest::{Client, StatusCode};
use tokio::time::sleep;

use crate::{
    error::FetchError,
    types::{ApiTrack, ArtistLink, PlaylistTracksPage, TrackRecord},
    utils, warning,
};

pub const PAGE_LIMIT: u32 = 50;
const BAD_GATEWAY_ATTEMPTS: u32 = 3;

/// Source of a playlist's tracks.
pub trait TrackSource {
    /// Follows the `next` cursor until it is exhausted. `on_page` receives each
    /// page's records in page order as soon as the page arrives.
    async fn fetch_tracks(
        &self,
        playlist_id: &str,
        access_token: &str,
        on_page: Option<&mut dyn FnMut(&[TrackRecord])>,
    ) -> Result<Vec<TrackRecord>, FetchError>;
}

#[derive(Debug, Clone)]
pub struct SpotifyApi {
    http: Client,
    api_url: String,
    retry_delay: Duration,
}

impl SpotifyApi {
    pub fn new(http: Client, api_url: impl Into<String>) -> Self {
        Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            retry_delay: Duration::from_secs(10),
        }
    }

    /// Delay before retrying a `502 Bad Gateway`.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn first_page_url(&self, playlist_id: &str) -> String {
        format!(
            "{api}/playlists/{playlist_id}/tracks?limit={limit}",
            api = self.api_url,
            limit = PAGE_LIMIT
        )
    }

    async fn get_page(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<PlaylistTracksPage, FetchError> {
        let mut attempt = 1;
        loop {
            let response = self.http.get(url).bearer_auth(access_token).send().await?;

            match response.status() {
                status if status.is_success() => {
                    return Ok(response.json::<PlaylistTracksPage>().await?);
                }
                StatusCode::UNAUTHORIZED => return Err(FetchError::Unauthorized),
                StatusCode::BAD_GATEWAY if attempt < BAD_GATEWAY_ATTEMPTS => {
                    warning!(
                        "Playlist endpoint returned 502, retrying in {}s",
                        self.retry_delay.as_secs()
                    );
                    attempt += 1;
                    sleep(self.retry_delay).await;
                }
                status => {
                    return Err(FetchError::HttpError {
                        status: status.as_u16(),
                    });
                }
            }
        }
    }
}

impl TrackSource for SpotifyApi {
    async fn fetch_tracks(
        &self,
        playlist_id: &str,
        access_token: &str,
        mut on_page: Option<&mut dyn FnMut(&[TrackRecord])>,
    ) -> Result<Vec<TrackRecord>, FetchError> {
        let mut all_tracks = Vec::new();
        let mut next_url = Some(self.first_page_url(playlist_id));

        while let Some(url) = next_url {
            let page = self.get_page(&url, access_token).await?;
            let page_tracks: Vec<TrackRecord> = page
                .items
                .into_iter()
                .filter_map(|item| item.track)
                .filter_map(track_record)
                .collect();

            if let Some(callback) = on_page.as_mut() {
                callback(&page_tracks);
            }
            all_tracks.extend(page_tracks);
            next_url = page.next.filter(|n| !n.is_empty());
        }

        Ok(all_tracks)
    }
}

/// Maps an API track to a record. Items without an id (local files,
/// unavailable tracks) are skipped.
pub fn track_record(track: ApiTrack) -> Option<TrackRecord> {
    let id = track.id.filter(|id| !id.is_empty())?;
    Some(TrackRecord {
        id,
        name: track.name,
        artists: track
            .artists
            .into_iter()
            .map(|artist| ArtistLink {
                name: artist.name,
                url: artist.external_urls.spotify.unwrap_or_default(),
            })
            .collect(),
        album_image_url: utils::smallest_image(&track.album.images),
        album: track.album.name,
        album_url: track.album.external_urls.spotify.unwrap_or_default(),
    })
}
