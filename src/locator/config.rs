use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a host page implementation finds things in the web player's DOM.
///
/// The player's markup is not a published contract, so all of it is data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    /// Anchor path of a track's detail page; `{id}` is replaced.
    pub track_href: String,
    /// Ancestors of a track anchor that count as its row, tried in order.
    pub row_selectors: Vec<String>,
    /// Attributes marking a virtualization library's scroll viewport.
    pub virtualization_markers: Vec<String>,
    /// Known scroll containers, tried after the markers.
    pub container_selectors: Vec<String>,
    /// Main content areas searched for any large scrollable descendant.
    pub main_selectors: Vec<String>,
    /// Label fragment of a row's play control.
    pub play_label: String,
    /// Exact label of the control shown on the row that is playing.
    pub pause_label: String,
    pub now_playing_title: String,
    pub now_playing_artists: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            track_href: "/track/{id}".to_string(),
            row_selectors: vec![
                r#"[data-testid="tracklist-row"]"#.to_string(),
                r#"[role="row"]"#.to_string(),
            ],
            virtualization_markers: vec!["data-overlayscrollbars-viewport".to_string()],
            container_selectors: vec![
                ".main-view-container__scroll-node".to_string(),
                ".main-view-container .os-viewport".to_string(),
                r#"[role="grid"]"#.to_string(),
                r#"[data-testid="playlist-tracklist"]"#.to_string(),
            ],
            main_selectors: vec![
                ".main-view-container".to_string(),
                ".Root__main-view".to_string(),
                "main".to_string(),
                r#"[role="main"]"#.to_string(),
                "#main".to_string(),
            ],
            play_label: "Play".to_string(),
            pause_label: "Pause".to_string(),
            now_playing_title: r#"[data-testid="context-item-link"]"#.to_string(),
            now_playing_artists: r#"[data-testid="context-item-info-artist"]"#.to_string(),
        }
    }
}

impl Selectors {
    pub fn track_href_for(&self, track_id: &str) -> String {
        self.track_href.replace("{id}", track_id)
    }
}

/// Geometry, timing and bounds of the locator's search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    pub selectors: Selectors,
    /// Used when no rendered row can be measured.
    pub default_row_height: f64,
    pub header_height: f64,
    /// Containers smaller than this are not considered, unless marked.
    pub min_container_height: f64,
    /// Ranked containers tried by the estimated jump.
    pub max_candidates: usize,
    /// Forward/backward sweep steps around the estimated offset.
    pub nudge_attempts: usize,
    pub nudge_rows: f64,
    /// Scroll movement below this many pixels counts as stuck.
    pub stagnation_px: f64,
    #[serde(with = "millis")]
    pub settle_delay: Duration,
    #[serde(with = "millis")]
    pub poll_interval: Duration,
    /// Window for the first, scroll-free check.
    #[serde(with = "millis")]
    pub quick_timeout: Duration,
    /// Window for the polling wait.
    #[serde(with = "millis")]
    pub full_timeout: Duration,
    #[serde(with = "millis")]
    pub scan_delay: Duration,
    /// Fraction of the viewport advanced per step when scanning for the
    /// playing row.
    pub scan_step: f64,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            selectors: Selectors::default(),
            default_row_height: 56.0,
            header_height: 64.0,
            min_container_height: 200.0,
            max_candidates: 3,
            nudge_attempts: 6,
            nudge_rows: 3.0,
            stagnation_px: 5.0,
            settle_delay: Duration::from_millis(700),
            poll_interval: Duration::from_millis(500),
            quick_timeout: Duration::from_secs(3),
            full_timeout: Duration::from_secs(30),
            scan_delay: Duration::from_millis(100),
            scan_step: 0.8,
        }
    }
}

impl LocatorConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
