//! Locating a track row in the web player's virtualized track list.
//!
//! The player only renders rows near the current scroll position, so a row
//! for an arbitrary track usually does not exist yet. The locator escalates
//! through a fixed set of strategies, each bounded in time:
//!
//! 1. look for the row as the page stands
//! 2. jump the best scroll containers to the row's estimated offset
//! 3. sweep back and forth around that offset
//! 4. poll, re-aiming every tick and backing off when scrolling is stuck
//!
//! Failing all of them is reported as [`LocateOutcome::NotFound`], never as
//! an error to the caller. The page itself is reached through [`HostPage`],
//! which the embedding host-page adapter implements; this crate ships none.

mod config;
mod container;

use tokio::time::{Instant, sleep};

use crate::{error::LocateError, info, success, types::TrackRecord, warning};

pub use config::{LocatorConfig, Selectors};
pub use container::{estimated_offset, rank, row_height, score};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

/// A scrollable element that might own the track list's scroll offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerInfo {
    pub id: ElementId,
    /// Carries one of the configured virtualization markers.
    pub virtualized: bool,
    pub metrics: ScrollMetrics,
}

/// A clickable control inside a row, with its accessible label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowControl {
    pub id: ElementId,
    pub label: String,
}

/// The player's "now playing" readout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    pub title: String,
    pub artists: Vec<String>,
}

/// The host page's DOM, as far as the locator needs it.
pub trait HostPage {
    /// Row containing an anchor to the track's detail page, if rendered.
    async fn find_track_row(&self, selectors: &Selectors, track_id: &str) -> Option<ElementId>;

    /// Row whose control carries the pause label, if rendered.
    async fn find_playing_row(&self, selectors: &Selectors) -> Option<ElementId>;

    async fn scroll_containers(&self, selectors: &Selectors) -> Vec<ContainerInfo>;

    async fn scroll_metrics(&self, container: ElementId) -> Option<ScrollMetrics>;

    async fn scroll_to(&self, container: ElementId, top: f64);

    /// Heights of the rows currently rendered.
    async fn rendered_row_heights(&self, selectors: &Selectors) -> Vec<f64>;

    async fn row_controls(&self, row: ElementId) -> Vec<RowControl>;

    async fn click(&self, control: ElementId) -> Result<(), String>;

    /// Scrolls the row to the middle of the viewport.
    async fn reveal(&self, row: ElementId);

    async fn now_playing(&self, selectors: &Selectors) -> Option<NowPlaying>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateOutcome {
    Found { row: ElementId, played: bool },
    NotFound,
}

pub struct TrackLocator<P> {
    page: P,
    config: LocatorConfig,
}

impl<P: HostPage> TrackLocator<P> {
    pub fn new(page: P, config: LocatorConfig) -> Self {
        Self { page, config }
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Brings the track's row into view and starts playback from it.
    ///
    /// `songs` is the playlist as fetched; the track's position in it drives
    /// the offset estimate. Not finding the row is logged and reported as
    /// [`LocateOutcome::NotFound`].
    pub async fn scroll_to_and_highlight(
        &self,
        track_id: &str,
        songs: &[TrackRecord],
    ) -> LocateOutcome {
        let index = songs.iter().position(|s| s.id == track_id);
        if index.is_none() {
            warning!("Track not found in playlist data: {}", track_id);
        }

        match self.locate(track_id, index).await {
            Ok(row) => {
                let played = self.activate(row, track_id).await;
                self.page.reveal(row).await;
                success!("Scrolled to track: {}", track_id);
                LocateOutcome::Found { row, played }
            }
            Err(e) => {
                warning!("Could not find track {}: {}", track_id, e);
                LocateOutcome::NotFound
            }
        }
    }

    /// Brings the row that is currently playing into view.
    pub async fn jump_to_playing(&self, songs: &[TrackRecord]) -> LocateOutcome {
        match self.find_playing(songs).await {
            Ok(row) => {
                self.page.reveal(row).await;
                success!("Jumped to currently playing track");
                LocateOutcome::Found { row, played: false }
            }
            Err(e) => {
                warning!("Could not jump to currently playing track: {}", e);
                LocateOutcome::NotFound
            }
        }
    }

    /// Makes the row for `track_id` exist in the page.
    ///
    /// `index` is the track's position in the playlist; without it only the
    /// scroll-free check runs, for up to the quick timeout.
    pub async fn locate(&self, track_id: &str, index: Option<usize>) -> Result<ElementId, LocateError> {
        if let Some(row) = self.check(track_id).await {
            return Ok(row);
        }

        let containers = self.containers().await;
        if containers.is_empty() {
            return Err(LocateError::NoScrollableContainer);
        }

        let Some(index) = index else {
            return self
                .wait_without_scrolling(track_id)
                .await
                .ok_or_else(|| LocateError::TrackNotFound(track_id.to_string()));
        };

        let row_height = self.measure_row_height().await;
        let target = estimated_offset(index, row_height, self.config.header_height);
        info!(
            "Track {} at index {}, aiming for offset {:.0}px",
            track_id, index, target
        );

        if let Some(row) = self.estimated_jump(track_id, &containers, target).await {
            return Ok(row);
        }
        if let Some(row) = self
            .nudge_sweep(track_id, containers[0], target, row_height)
            .await
        {
            return Ok(row);
        }
        self.poll_wait(track_id, &containers, target, row_height)
            .await
            .ok_or_else(|| LocateError::TrackNotFound(track_id.to_string()))
    }

    /// Finds the playing row, seeding the search from the now-playing
    /// readout when it matches a track in `songs`, then scanning from the top.
    pub async fn find_playing(&self, songs: &[TrackRecord]) -> Result<ElementId, LocateError> {
        if let Some(row) = self.playing_row().await {
            return Ok(row);
        }

        let containers = self.containers().await;
        let Some(&primary) = containers.first() else {
            return Err(LocateError::NoScrollableContainer);
        };
        let deadline = Instant::now() + self.config.full_timeout;

        if let Some(index) = self.now_playing_index(songs).await {
            let row_height = self.measure_row_height().await;
            let target = estimated_offset(index, row_height, self.config.header_height);
            self.page.scroll_to(primary, target).await;
            sleep(self.config.settle_delay).await;
            if let Some(row) = self.playing_row().await {
                return Ok(row);
            }
        }

        self.page.scroll_to(primary, 0.0).await;
        sleep(self.config.scan_delay).await;
        if let Some(row) = self.playing_row().await {
            return Ok(row);
        }

        while Instant::now() < deadline {
            let Some(metrics) = self.page.scroll_metrics(primary).await else {
                break;
            };
            let max_scroll = metrics.max_scroll();
            if metrics.scroll_top >= max_scroll {
                break;
            }

            let next = (metrics.scroll_top + metrics.client_height * self.config.scan_step)
                .min(max_scroll);
            self.page.scroll_to(primary, next).await;
            sleep(self.config.scan_delay).await;
            if let Some(row) = self.playing_row().await {
                return Ok(row);
            }

            let moved = self
                .page
                .scroll_metrics(primary)
                .await
                .map(|m| (m.scroll_top - metrics.scroll_top).abs())
                .unwrap_or_default();
            if moved < self.config.stagnation_px {
                break;
            }
        }

        Err(LocateError::NothingPlaying)
    }

    /// Clicks the row's play control. Best effort: failures are logged.
    pub async fn activate(&self, row: ElementId, track_id: &str) -> bool {
        let play_label = self.config.selectors.play_label.as_str();
        let controls = self.page.row_controls(row).await;
        let Some(control) = controls.iter().find(|c| c.label.contains(play_label)) else {
            warning!("Could not find play button for track: {}", track_id);
            return false;
        };

        match self.page.click(control.id).await {
            Ok(()) => {
                info!("Started playback for track: {}", track_id);
                true
            }
            Err(e) => {
                warning!("Error clicking play button for {}: {}", track_id, e);
                false
            }
        }
    }

    async fn check(&self, track_id: &str) -> Option<ElementId> {
        self.page
            .find_track_row(&self.config.selectors, track_id)
            .await
    }

    async fn playing_row(&self) -> Option<ElementId> {
        self.page.find_playing_row(&self.config.selectors).await
    }

    async fn containers(&self) -> Vec<ElementId> {
        let candidates = self.page.scroll_containers(&self.config.selectors).await;
        let ranked = rank(&candidates, self.config.min_container_height);
        if ranked.is_empty() {
            warning!("Could not find any playlist scroll container");
        }
        ranked
    }

    async fn measure_row_height(&self) -> f64 {
        let heights = self
            .page
            .rendered_row_heights(&self.config.selectors)
            .await;
        row_height(&heights, self.config.default_row_height)
    }

    async fn wait_without_scrolling(&self, track_id: &str) -> Option<ElementId> {
        let deadline = Instant::now() + self.config.quick_timeout;
        while Instant::now() < deadline {
            sleep(self.config.poll_interval).await;
            if let Some(row) = self.check(track_id).await {
                return Some(row);
            }
        }
        None
    }

    async fn estimated_jump(
        &self,
        track_id: &str,
        containers: &[ElementId],
        target: f64,
    ) -> Option<ElementId> {
        for &container in containers.iter().take(self.config.max_candidates.max(1)) {
            self.page.scroll_to(container, target).await;
            sleep(self.config.settle_delay).await;
            if let Some(row) = self.check(track_id).await {
                return Some(row);
            }
        }
        None
    }

    /// Offsets `target + d, target - d, target + 2d, ...` with `d` a few rows.
    async fn nudge_sweep(
        &self,
        track_id: &str,
        container: ElementId,
        target: f64,
        row_height: f64,
    ) -> Option<ElementId> {
        let step = self.config.nudge_rows * row_height;
        for attempt in 0..self.config.nudge_attempts {
            let distance = (attempt / 2 + 1) as f64 * step;
            let offset = if attempt % 2 == 0 {
                target + distance
            } else {
                (target - distance).max(0.0)
            };
            self.page.scroll_to(container, offset).await;
            sleep(self.config.settle_delay).await;
            if let Some(row) = self.check(track_id).await {
                return Some(row);
            }
        }
        None
    }

    async fn poll_wait(
        &self,
        track_id: &str,
        containers: &[ElementId],
        target: f64,
        row_height: f64,
    ) -> Option<ElementId> {
        let interval_ms = self.config.poll_interval.as_millis().max(1);
        let max_attempts = (self.config.full_timeout.as_millis() / interval_ms) as usize + 1;
        let deadline = Instant::now() + self.config.full_timeout;
        let mut candidate = 0;
        let mut last_top: Option<f64> = None;

        for attempt in 0..max_attempts {
            if let Some(row) = self.check(track_id).await {
                return Some(row);
            }
            if Instant::now() >= deadline {
                break;
            }

            let container = containers[candidate];
            match self.page.scroll_metrics(container).await {
                None => {
                    if candidate + 1 < containers.len() {
                        candidate += 1;
                        last_top = None;
                    }
                }
                Some(metrics) => {
                    if (metrics.scroll_top - target).abs() > row_height * 3.0 {
                        self.page.scroll_to(container, target).await;
                    } else {
                        let nudge = if attempt % 2 == 0 {
                            row_height * 2.0
                        } else {
                            -row_height * 2.0
                        };
                        self.page
                            .scroll_to(container, (metrics.scroll_top + nudge).max(0.0))
                            .await;
                    }

                    let top = self
                        .page
                        .scroll_metrics(container)
                        .await
                        .map_or(metrics.scroll_top, |m| m.scroll_top);
                    let stuck =
                        last_top.is_some_and(|last| (top - last).abs() < self.config.stagnation_px);
                    if stuck {
                        if attempt < max_attempts / 2 {
                            warning!("Scroll position not changing, restarting from the top");
                            self.page.scroll_to(container, 0.0).await;
                        } else if candidate + 1 < containers.len() {
                            info!("Scroll position not changing, trying the next container");
                            candidate += 1;
                        }
                    }
                    last_top = Some(top);
                }
            }

            sleep(self.config.poll_interval).await;
        }

        self.check(track_id).await
    }

    async fn now_playing_index(&self, songs: &[TrackRecord]) -> Option<usize> {
        let now_playing = self.page.now_playing(&self.config.selectors).await?;
        now_playing_index(&now_playing, songs)
    }
}

/// Position of the now-playing track in `songs`: title and first artist
/// when both match, else the first title match.
pub fn now_playing_index(now_playing: &NowPlaying, songs: &[TrackRecord]) -> Option<usize> {
    let title = now_playing.title.trim();
    if title.is_empty() {
        return None;
    }

    let title_matches = |song: &TrackRecord| song.name.trim().eq_ignore_ascii_case(title);
    let artist = now_playing.artists.first().map(|a| a.trim());

    songs
        .iter()
        .position(|song| {
            title_matches(song)
                && artist.is_some_and(|artist| {
                    song.artists
                        .iter()
                        .any(|a| a.name.trim().eq_ignore_ascii_case(artist))
                })
        })
        .or_else(|| songs.iter().position(title_matches))
}
