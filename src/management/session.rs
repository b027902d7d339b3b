//! Per-page session: the playlist being viewed, its tracks and the search
//! overlay. A session lives for one playlist page visit and is replaced on
//! navigation.

use std::cell::{Cell, Ref, RefCell};

use crate::{
    error::FetchError,
    info,
    messages::{Request, Response},
    search::SearchOverlay,
    spotify::playlist::TrackSource,
    types::TrackRecord,
    utils, warning,
};

use super::auth::AccessTokens;

const LOAD_FAILED_MESSAGE: &str = "Unable to get playlist songs";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded(usize),
    /// Another load was already running; nothing was done.
    Busy,
}

#[derive(Debug)]
pub struct PlaylistSession {
    playlist_id: Option<String>,
    songs: RefCell<Vec<TrackRecord>>,
    overlay: RefCell<SearchOverlay>,
    fetching: Cell<bool>,
    first_fetch: Cell<bool>,
}

impl PlaylistSession {
    pub fn new(playlist_id: Option<String>) -> Self {
        Self {
            playlist_id,
            songs: RefCell::new(Vec::new()),
            overlay: RefCell::new(SearchOverlay::new()),
            fetching: Cell::new(false),
            first_fetch: Cell::new(true),
        }
    }

    /// Session for a web player URL; the playlist id comes from its path.
    pub fn for_url(url: &str) -> Self {
        Self::new(utils::extract_playlist_id(url))
    }

    pub fn playlist_id(&self) -> Option<&str> {
        self.playlist_id.as_deref()
    }

    pub fn songs(&self) -> Ref<'_, Vec<TrackRecord>> {
        self.songs.borrow()
    }

    pub fn overlay(&self) -> Ref<'_, SearchOverlay> {
        self.overlay.borrow()
    }

    pub fn is_fetching(&self) -> bool {
        self.fetching.get()
    }

    pub fn is_first_fetch(&self) -> bool {
        self.first_fetch.get()
    }

    pub fn set_query(&self, query: &str) {
        let songs = self.songs.borrow();
        self.overlay
            .borrow_mut()
            .set_query(query, &songs, self.first_fetch.get());
    }

    pub fn select_next(&self) {
        self.overlay.borrow_mut().select_next();
    }

    pub fn select_previous(&self) {
        self.overlay.borrow_mut().select_previous();
    }

    pub fn selected_track(&self) -> Option<TrackRecord> {
        self.overlay.borrow().selected_track().cloned()
    }

    pub fn close_overlay(&self) {
        self.overlay.borrow_mut().close();
    }

    /// Opens the overlay, loading the playlist the first time.
    pub async fn open_overlay<A: AccessTokens, P: TrackSource>(&self, tokens: &A, source: &P) {
        self.overlay.borrow_mut().open();
        self.on_opened(tokens, source).await;
    }

    async fn on_opened<A: AccessTokens, P: TrackSource>(&self, tokens: &A, source: &P) {
        if self.first_fetch.get() {
            self.overlay.borrow_mut().show_loading();
            if let Err(e) = self.load_songs(tokens, source).await {
                warning!("Error loading playlist songs: {}", e);
            }
        } else {
            let songs = self.songs.borrow();
            self.overlay.borrow_mut().refresh(&songs, false);
        }
    }

    /// Fetches the playlist into the session.
    ///
    /// The first load streams pages into the list and re-renders the overlay
    /// after each page; later loads replace the list once complete. A load
    /// requested while one is running is a no-op. An `Unauthorized` response
    /// is retried once with a refreshed token, starting again from the first
    /// page.
    pub async fn load_songs<A: AccessTokens, P: TrackSource>(
        &self,
        tokens: &A,
        source: &P,
    ) -> Result<LoadOutcome, FetchError> {
        let Some(playlist_id) = self.playlist_id.clone() else {
            self.overlay
                .borrow_mut()
                .show_error(FetchError::NoPlaylist.to_string());
            return Err(FetchError::NoPlaylist);
        };

        if self.fetching.get() {
            return Ok(LoadOutcome::Busy);
        }

        self.fetching.set(true);
        let result = self.fetch_with_retry(&playlist_id, tokens, source).await;
        self.fetching.set(false);

        match result {
            Ok(count) => Ok(LoadOutcome::Loaded(count)),
            Err(e) => {
                let mut overlay = self.overlay.borrow_mut();
                match e {
                    FetchError::Auth(_) => overlay.show_auth_required(),
                    _ => overlay.show_error(LOAD_FAILED_MESSAGE),
                }
                Err(e)
            }
        }
    }

    async fn fetch_with_retry<A: AccessTokens, P: TrackSource>(
        &self,
        playlist_id: &str,
        tokens: &A,
        source: &P,
    ) -> Result<usize, FetchError> {
        let token = tokens.access_token().await?;
        match self.fetch_once(playlist_id, &token, source).await {
            Err(FetchError::Unauthorized) => {
                info!("Access token rejected, refreshing and retrying once");
                let token = tokens.refreshed_access_token().await?;
                self.fetch_once(playlist_id, &token, source).await
            }
            other => other,
        }
    }

    async fn fetch_once<P: TrackSource>(
        &self,
        playlist_id: &str,
        access_token: &str,
        source: &P,
    ) -> Result<usize, FetchError> {
        if self.first_fetch.get() {
            self.songs.borrow_mut().clear();
            let mut on_page = |page: &[TrackRecord]| {
                self.songs.borrow_mut().extend_from_slice(page);
                let songs = self.songs.borrow();
                self.overlay.borrow_mut().refresh(&songs, true);
            };
            source
                .fetch_tracks(playlist_id, access_token, Some(&mut on_page))
                .await?;
            self.first_fetch.set(false);
        } else {
            let tracks = source.fetch_tracks(playlist_id, access_token, None).await?;
            *self.songs.borrow_mut() = tracks;
        }

        let songs = self.songs.borrow();
        self.overlay.borrow_mut().refresh(&songs, false);
        Ok(songs.len())
    }

    /// Handles the messages addressed to the page: `toggle-search` and
    /// `auth_state_changed`. Other requests return `None`.
    pub async fn handle_message<A: AccessTokens, P: TrackSource>(
        &self,
        request: &Request,
        tokens: &A,
        source: &P,
    ) -> Option<Response> {
        match request {
            Request::ToggleSearch => {
                let opened = self.overlay.borrow_mut().toggle();
                if opened {
                    self.on_opened(tokens, source).await;
                }
                Some(Response::ok())
            }
            Request::AuthStateChanged { authenticated } => {
                let (open, needs_auth) = {
                    let overlay = self.overlay.borrow();
                    (overlay.is_open(), overlay.is_auth_required())
                };

                if *authenticated && open && needs_auth {
                    info!("Re-attempting to load playlist songs after authentication");
                    self.overlay.borrow_mut().show_loading();
                    if let Err(e) = self.load_songs(tokens, source).await {
                        warning!("Error loading playlist songs: {}", e);
                    }
                } else if !*authenticated && open {
                    self.overlay.borrow_mut().show_auth_required();
                }
                Some(Response::ok())
            }
            Request::InitiateOauth { .. } | Request::GetAccessToken => None,
        }
    }
}
