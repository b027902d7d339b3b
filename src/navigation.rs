//! Debounced page navigation events.
//!
//! The host page is a single-page app, so "navigation" is just the address
//! changing underneath. Observed URLs are pushed into a channel; bursts are
//! collapsed and only a URL that differs from the current one once things
//! settle is reported.

use std::time::Duration;

use tokio::{sync::mpsc, time::timeout};

use crate::{info, management::PlaylistSession, utils};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageChange {
    pub url: String,
    pub playlist_id: Option<String>,
}

#[derive(Debug)]
pub struct NavigationEvents {
    rx: mpsc::Receiver<String>,
    current: String,
    debounce: Duration,
}

impl NavigationEvents {
    /// Returns the event source and the sender observers push URLs into.
    pub fn new(initial_url: impl Into<String>, debounce: Duration) -> (mpsc::Sender<String>, Self) {
        let (tx, rx) = mpsc::channel(64);
        (
            tx,
            Self {
                rx,
                current: initial_url.into(),
                debounce,
            },
        )
    }

    pub fn current_url(&self) -> &str {
        &self.current
    }

    /// Waits for the next settled URL change. Returns `None` once all
    /// senders are gone and nothing is left to report.
    pub async fn next_change(&mut self) -> Option<PageChange> {
        loop {
            let mut latest = self.rx.recv().await?;
            if latest == self.current {
                continue;
            }

            loop {
                match timeout(self.debounce, self.rx.recv()).await {
                    Ok(Some(url)) => latest = url,
                    Ok(None) | Err(_) => break,
                }
            }

            if latest != self.current {
                self.current = latest.clone();
                return Some(PageChange {
                    playlist_id: utils::extract_playlist_id(&latest),
                    url: latest,
                });
            }
        }
    }
}

/// Owns the session for the page currently shown and swaps it out when the
/// page changes.
#[derive(Debug)]
pub struct PageController {
    session: PlaylistSession,
}

impl PageController {
    pub fn new(url: &str) -> Self {
        Self {
            session: PlaylistSession::for_url(url),
        }
    }

    pub fn session(&self) -> &PlaylistSession {
        &self.session
    }

    /// Closes the current overlay and starts a fresh session for `change`.
    pub fn apply(&mut self, change: &PageChange) {
        self.session.close_overlay();
        self.session = PlaylistSession::new(change.playlist_id.clone());
        match &change.playlist_id {
            Some(id) => info!("Navigated to playlist {}", id),
            None => info!("Navigated away from a playlist page"),
        }
    }

    /// Waits for the next change and applies it.
    pub async fn follow(&mut self, events: &mut NavigationEvents) -> Option<PageChange> {
        let change = events.next_change().await?;
        self.apply(&change);
        Some(change)
    }
}
