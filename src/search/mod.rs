//! Track filtering and the search overlay model.

mod overlay;

use tabled::Table;

use crate::types::{TrackRecord, TrackTableRow};

pub use overlay::{AUTH_MESSAGE, EMPTY_MESSAGE, LOADING_MESSAGE, OverlayView, SearchOverlay, message_for};

/// Text a query is matched against: title, artist names and album.
pub fn searchable_text(track: &TrackRecord) -> String {
    std::iter::once(track.name.as_str())
        .chain(track.artists.iter().map(|a| a.name.as_str()))
        .chain(std::iter::once(track.album.as_str()))
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Keeps the tracks whose searchable text contains every whitespace
/// separated term of `query`, case-insensitively, in list order. An empty
/// query keeps everything.
pub fn filter_songs<'a>(songs: &'a [TrackRecord], query: &str) -> Vec<&'a TrackRecord> {
    let terms: Vec<String> = query
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect();

    if terms.is_empty() {
        return songs.iter().collect();
    }

    songs
        .iter()
        .filter(|song| {
            let text = searchable_text(song);
            terms.iter().all(|term| text.contains(term.as_str()))
        })
        .collect()
}

/// Renders results as a table, marking the keyboard selection with `>`.
pub fn render_table(tracks: &[TrackRecord], selected: Option<usize>) -> String {
    let rows: Vec<TrackTableRow> = tracks
        .iter()
        .enumerate()
        .map(|(i, t)| TrackTableRow {
            position: if selected == Some(i) {
                format!("> {}", i + 1)
            } else {
                (i + 1).to_string()
            },
            title: t.name.clone(),
            artists: t
                .artists
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            album: t.album.clone(),
        })
        .collect();

    Table::new(rows).to_string()
}
