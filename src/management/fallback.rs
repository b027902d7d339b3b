//! Tab-based authorization fallback.
//!
//! Opens the consent page in a regular tab and watches navigations until one
//! lands on an accepted redirect URI. At most one such flow is pending; a new
//! one interrupts the previous.

use std::{
    sync::{Mutex, PoisonError},
    time::Duration,
};

use tokio::sync::oneshot;

use crate::{error::AuthError, info, types::RedirectParams, utils, warning};

pub const FALLBACK_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TabId(pub u64);

/// A top-level navigation observed in some tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub tab: TabId,
    pub url: String,
}

pub trait TabController {
    async fn open_tab(&self, url: &str) -> Result<TabId, AuthError>;

    async fn close_tab(&self, tab: TabId) -> Result<(), AuthError>;
}

pub trait NavigationWatcher {
    /// Next observed navigation, or `None` once the source is exhausted.
    async fn next_navigation(&self) -> Option<Navigation>;
}

type Outcome = Result<RedirectParams, AuthError>;

struct Pending {
    attempt: u64,
    tab: TabId,
    tx: oneshot::Sender<Outcome>,
}

pub struct TabAuthFlow<T, N> {
    tabs: T,
    navigation: N,
    redirect_prefixes: Vec<String>,
    timeout: Duration,
    pending: Mutex<Option<Pending>>,
    attempts: Mutex<u64>,
}

impl<T: TabController, N: NavigationWatcher> TabAuthFlow<T, N> {
    pub fn new(tabs: T, navigation: N, redirect_prefixes: Vec<String>) -> Self {
        Self {
            tabs,
            navigation,
            redirect_prefixes,
            timeout: FALLBACK_TIMEOUT,
            pending: Mutex::new(None),
            attempts: Mutex::new(0),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn tabs(&self) -> &T {
        &self.tabs
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Opens `auth_url` in a new tab and resolves with the redirect's
    /// parameters.
    ///
    /// # Errors
    ///
    /// - [`AuthError::AuthTimeout`] when no redirect arrives within the timeout
    /// - [`AuthError::Interrupted`] when another flow starts meanwhile
    /// - [`AuthError::Browser`] when the tab cannot be opened
    pub async fn run(&self, auth_url: &str) -> Result<RedirectParams, AuthError> {
        let tab = self.tabs.open_tab(auth_url).await?;
        let attempt = self.next_attempt();
        let (tx, mut rx) = oneshot::channel();

        let previous = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(Pending { attempt, tab, tx });
        if let Some(previous) = previous {
            info!("Interrupting the previous pending authorization");
            let _ = previous.tx.send(Err(AuthError::Interrupted));
            self.close_quietly(previous.tab).await;
        }

        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);
        let mut watching = true;

        let outcome = loop {
            tokio::select! {
                biased;
                received = &mut rx => {
                    break received.unwrap_or(Err(AuthError::Interrupted));
                }
                _ = &mut deadline => {
                    self.take_pending(attempt);
                    break Err(AuthError::AuthTimeout);
                }
                navigation = self.navigation.next_navigation(), if watching => {
                    match navigation {
                        Some(navigation) => {
                            self.observe(&navigation);
                        }
                        None => watching = false,
                    }
                }
            }
        };

        if !matches!(outcome, Err(AuthError::Interrupted)) {
            self.close_quietly(tab).await;
        }
        outcome
    }

    /// Feeds one navigation into the pending flow. Navigations that are not
    /// to an accepted redirect URI are ignored. Returns whether it resolved
    /// the pending flow.
    pub fn observe(&self, navigation: &Navigation) -> bool {
        if !utils::matches_redirect(&navigation.url, &self.redirect_prefixes) {
            return false;
        }

        let Some(pending) = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return false;
        };

        let outcome = utils::parse_redirect_params(&navigation.url);
        pending.tx.send(outcome).is_ok()
    }

    fn take_pending(&self, attempt: u64) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.as_ref().is_some_and(|p| p.attempt == attempt) {
            pending.take();
        }
    }

    fn next_attempt(&self) -> u64 {
        let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
        *attempts += 1;
        *attempts
    }

    async fn close_quietly(&self, tab: TabId) {
        if let Err(e) = self.tabs.close_tab(tab).await {
            warning!("Failed to close authorization tab: {}", e);
        }
    }
}
