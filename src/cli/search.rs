use std::{io::Write, time::Duration};

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::{
    error,
    error::FetchError,
    info,
    management::PlaylistSession,
    search::{self, AUTH_MESSAGE, OverlayView},
    spotify::playlist::TrackSource,
    success,
    types::TrackRecord,
    utils, warning,
};

use super::{settings, spotify_api, token_manager};

/// Reports fetch progress on a spinner while passing pages through.
struct ProgressSource<'a, P> {
    inner: &'a P,
    bar: &'a ProgressBar,
}

impl<P: TrackSource> TrackSource for ProgressSource<'_, P> {
    async fn fetch_tracks(
        &self,
        playlist_id: &str,
        access_token: &str,
        mut on_page: Option<&mut dyn FnMut(&[TrackRecord])>,
    ) -> Result<Vec<TrackRecord>, FetchError> {
        let mut fetched = 0;
        let mut report = |page: &[TrackRecord]| {
            fetched += page.len();
            self.bar.set_message(format!("Fetched {} songs...", fetched));
            if let Some(callback) = on_page.as_mut() {
                callback(page);
            }
        };
        self.inner
            .fetch_tracks(playlist_id, access_token, Some(&mut report))
            .await
    }
}

/// Loads `playlist` (an id or a playlist URL) and prints the tracks matching
/// `query`, or filters interactively when no query is given.
pub async fn search(playlist: String, query: Option<String>) {
    let settings = settings();
    let Some(playlist_id) = utils::extract_playlist_id(&playlist) else {
        error!("{}", FetchError::NoPlaylist);
    };

    let http = Client::new();
    let tokens = token_manager(&settings, &http);
    let api = spotify_api(&settings, &http);
    let session = PlaylistSession::new(Some(playlist_id));

    let pb = ProgressBar::new_spinner();
    pb.set_message("Fetching playlist songs...");
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_style(
        ProgressStyle::with_template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );

    let source = ProgressSource {
        inner: &api,
        bar: &pb,
    };
    session.open_overlay(&tokens, &source).await;
    pb.finish_and_clear();

    match session.overlay().view() {
        OverlayView::AuthRequired => error!("{}", AUTH_MESSAGE),
        OverlayView::Error(message) => error!("{}", message),
        _ => {}
    }
    success!("Loaded {} songs.", session.songs().len());

    match query {
        Some(query) => {
            session.set_query(&query);
            print_results(&session);
        }
        None => interactive(&session).await,
    }
}

async fn interactive(session: &PlaylistSession) {
    info!("Type to filter. /next and /prev move the selection, /select shows it, an empty line quits.");
    print_results(session);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("search> ");
        let _ = std::io::stdout().flush();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warning!("Cannot read input. Err: {}", e);
                break;
            }
        };

        match line.trim() {
            "" => break,
            "/next" => {
                session.select_next();
                print_results(session);
            }
            "/prev" => {
                session.select_previous();
                print_results(session);
            }
            "/select" => match session.selected_track() {
                Some(track) => print_track(&track),
                None => warning!("Nothing selected. Use /next or /prev first."),
            },
            query => {
                session.set_query(query);
                print_results(session);
            }
        }
    }

    session.close_overlay();
}

fn print_results(session: &PlaylistSession) {
    let overlay = session.overlay();
    match search::message_for(overlay.view()) {
        Some(message) => warning!("{}", message),
        None => println!(
            "{}",
            search::render_table(overlay.results(), overlay.selected_index())
        ),
    }
}

fn print_track(track: &TrackRecord) {
    success!("{}", track.name);
    for artist in &track.artists {
        info!("Artist: {} {}", artist.name, artist.url);
    }
    info!("Album: {} {}", track.album, track.album_url);
    if let Some(image) = &track.album_image_url {
        info!("Cover: {}", image);
    }
    info!("Track: https://open.spotify.com/track/{}", track.id);
}
