//! Desktop stand-ins for the browser capabilities the authorization flow
//! needs.
//!
//! - [`LoopbackLauncher`] opens the consent page in the system browser and
//!   catches the redirect on a loopback port.
//! - [`BrowserTabs`] and [`PastedNavigation`] make up the fallback: the page
//!   is opened the same way and the user pastes the address they land on.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::{
    io::{AsyncBufReadExt, BufReader, Lines, Stdin},
    sync::{Mutex, oneshot},
    time::timeout,
};

use crate::{
    api::RedirectCapture,
    error::AuthError,
    info,
    management::{
        InteractiveAuthLauncher, LaunchError, Navigation, NavigationWatcher, TabController, TabId,
    },
    server::{self, RedirectTarget},
    utils, warning,
};

pub const LAUNCH_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct LoopbackLauncher {
    timeout: Duration,
    open_browser: bool,
}

impl Default for LoopbackLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackLauncher {
    pub fn new() -> Self {
        Self {
            timeout: LAUNCH_TIMEOUT,
            open_browser: true,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Only prints the consent URL.
    pub fn without_browser(mut self) -> Self {
        self.open_browser = false;
        self
    }

    async fn wait_for_redirect(
        &self,
        auth_url: &str,
        redirect: oneshot::Receiver<String>,
    ) -> Result<String, LaunchError> {
        if self.open_browser {
            webbrowser::open(auth_url)
                .map_err(|e| LaunchError::Unavailable(format!("cannot open browser: {}", e)))?;
        }
        info!("If the browser did not open, visit:\n{}", auth_url);
        info!("Waiting for the authorization redirect...");

        match timeout(self.timeout, redirect).await {
            Ok(Ok(url)) => Ok(url),
            Ok(Err(_)) => Err(LaunchError::Unavailable(
                "redirect server stopped".to_string(),
            )),
            // The redirect can be unreachable from the browser (another
            // machine, a blocked port), so silence hands over to pasting.
            Err(_) => Err(LaunchError::Unavailable(
                "no redirect received in time".to_string(),
            )),
        }
    }
}

impl InteractiveAuthLauncher for LoopbackLauncher {
    async fn launch(&self, auth_url: &str, redirect_uri: &str) -> Result<String, LaunchError> {
        let target = RedirectTarget::parse(redirect_uri).map_err(LaunchError::Unavailable)?;
        let listener = server::bind(&target).await.map_err(|e| {
            LaunchError::Unavailable(format!("cannot listen on {}: {}", target.addr, e))
        })?;

        let (capture, redirect) = RedirectCapture::new(target.origin.clone());
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let path = target.path.clone();
        let server = tokio::spawn(async move {
            let shutdown = async move {
                let _ = stop_rx.await;
            };
            server::serve_redirect(listener, &path, capture, shutdown).await
        });

        let result = self.wait_for_redirect(auth_url, redirect).await;

        let _ = stop_tx.send(());
        match server.await {
            Ok(Err(e)) => warning!("Redirect server error: {}", e),
            Err(e) => warning!("Redirect server task failed: {}", e),
            Ok(Ok(())) => {}
        }

        let redirect_url = result?;
        if let Ok(params) = utils::parse_redirect_params(&redirect_url) {
            if let Some(error) = params.error {
                return Err(LaunchError::Cancelled(error));
            }
        }
        Ok(redirect_url)
    }
}

/// Opens pages in the system browser. Ids are local counters; the browser
/// does not let us close what it opened.
#[derive(Debug, Clone, Default)]
pub struct BrowserTabs {
    last: Arc<AtomicU64>,
}

impl BrowserTabs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Navigation source attributing pasted URLs to the latest tab.
    pub fn pasted_navigation(&self) -> PastedNavigation {
        PastedNavigation::new(Arc::clone(&self.last))
    }
}

impl TabController for BrowserTabs {
    async fn open_tab(&self, url: &str) -> Result<TabId, AuthError> {
        webbrowser::open(url).map_err(|e| AuthError::Browser(e.to_string()))?;
        let id = self.last.fetch_add(1, Ordering::SeqCst) + 1;
        info!("Opened the authorization page in your browser:\n{}", url);
        info!("After approving, paste the address of the page you land on and press enter:");
        Ok(TabId(id))
    }

    async fn close_tab(&self, _tab: TabId) -> Result<(), AuthError> {
        Ok(())
    }
}

/// Reads URLs pasted on stdin, one per line.
pub struct PastedNavigation {
    tab: Arc<AtomicU64>,
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl PastedNavigation {
    fn new(tab: Arc<AtomicU64>) -> Self {
        Self {
            tab,
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }
}

impl NavigationWatcher for PastedNavigation {
    async fn next_navigation(&self) -> Option<Navigation> {
        let mut lines = self.lines.lock().await;
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let url = line.trim();
                    if url.is_empty() {
                        continue;
                    }
                    return Some(Navigation {
                        tab: TabId(self.tab.load(Ordering::SeqCst)),
                        url: url.to_string(),
                    });
                }
                Ok(None) => return None,
                Err(e) => {
                    warning!("Cannot read from stdin: {}", e);
                    return None;
                }
            }
        }
    }
}
