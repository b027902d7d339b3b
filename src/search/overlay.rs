use crate::types::TrackRecord;

use super::filter_songs;

pub const LOADING_MESSAGE: &str = "Loading songs...";
pub const EMPTY_MESSAGE: &str = "No songs found";
pub const AUTH_MESSAGE: &str = "Please connect to Spotify. Run `spotsearch auth` to authenticate.";

/// What the overlay's content area currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayView {
    Loading,
    Results(Vec<TrackRecord>),
    Empty(&'static str),
    Error(String),
    AuthRequired,
}

/// State of the search overlay: visibility, query, rendered results and the
/// keyboard selection.
#[derive(Debug, Clone)]
pub struct SearchOverlay {
    open: bool,
    query: String,
    view: OverlayView,
    keyboard_navigation: bool,
    selected: Option<usize>,
}

impl Default for SearchOverlay {
    fn default() -> Self {
        Self {
            open: false,
            query: String::new(),
            view: OverlayView::Loading,
            keyboard_navigation: false,
            selected: None,
        }
    }
}

impl SearchOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn open(&mut self) {
        self.open = true;
        self.reset_navigation();
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    /// Returns whether the overlay is open afterwards.
    pub fn toggle(&mut self) -> bool {
        if self.open {
            self.close();
        } else {
            self.open();
        }
        self.open
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn view(&self) -> &OverlayView {
        &self.view
    }

    pub fn results(&self) -> &[TrackRecord] {
        match &self.view {
            OverlayView::Results(results) => results,
            _ => &[],
        }
    }

    /// Stores the query and re-renders against `songs`.
    pub fn set_query(&mut self, query: &str, songs: &[TrackRecord], loading: bool) {
        self.query = query.trim().to_string();
        self.refresh(songs, loading);
    }

    /// Re-applies the current query to `songs`. `loading` picks the empty
    /// message while the first fetch is still streaming in.
    pub fn refresh(&mut self, songs: &[TrackRecord], loading: bool) {
        let results: Vec<TrackRecord> = filter_songs(songs, &self.query)
            .into_iter()
            .cloned()
            .collect();

        self.view = if results.is_empty() {
            OverlayView::Empty(if loading { LOADING_MESSAGE } else { EMPTY_MESSAGE })
        } else {
            OverlayView::Results(results)
        };
        self.reset_navigation();
    }

    pub fn show_loading(&mut self) {
        self.view = OverlayView::Loading;
        self.reset_navigation();
    }

    pub fn show_error(&mut self, message: impl Into<String>) {
        self.view = OverlayView::Error(message.into());
        self.reset_navigation();
    }

    pub fn show_auth_required(&mut self) {
        self.view = OverlayView::AuthRequired;
        self.reset_navigation();
    }

    pub fn is_auth_required(&self) -> bool {
        self.view == OverlayView::AuthRequired
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn keyboard_navigation(&self) -> bool {
        self.keyboard_navigation
    }

    /// ArrowDown: moves the selection forward, wrapping to the first result.
    pub fn select_next(&mut self) {
        let len = self.results().len();
        if len == 0 {
            return;
        }
        self.keyboard_navigation = true;
        self.selected = Some(match self.selected {
            Some(i) => (i + 1) % len,
            None => 0,
        });
    }

    /// ArrowUp: moves the selection back, wrapping to the last result.
    pub fn select_previous(&mut self) {
        let len = self.results().len();
        if len == 0 {
            return;
        }
        self.keyboard_navigation = true;
        self.selected = Some(match self.selected {
            Some(i) if i > 0 => i - 1,
            _ => len - 1,
        });
    }

    /// Enter: the highlighted track, if any.
    pub fn selected_track(&self) -> Option<&TrackRecord> {
        self.selected.and_then(|i| self.results().get(i))
    }

    fn reset_navigation(&mut self) {
        self.keyboard_navigation = false;
        self.selected = None;
    }
}

pub fn message_for(view: &OverlayView) -> Option<&str> {
    match view {
        OverlayView::Loading => Some(LOADING_MESSAGE),
        OverlayView::Empty(message) => Some(message),
        OverlayView::Error(message) => Some(message),
        OverlayView::AuthRequired => Some(AUTH_MESSAGE),
        OverlayView::Results(_) => None,
    }
}
