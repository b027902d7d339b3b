use axum::{Extension, extract::OriginalUri, response::Html};
use std::sync::Arc;
use tokio::sync::{Mutex, oneshot};

use crate::warning;

/// Hands the first redirect that reaches the callback route to whoever is
/// waiting on the authorization.
#[derive(Debug)]
pub struct RedirectCapture {
    origin: String,
    tx: Mutex<Option<oneshot::Sender<String>>>,
}

impl RedirectCapture {
    /// `origin` is the scheme and authority the redirect URI was served on,
    /// e.g. `http://127.0.0.1:8888`.
    pub fn new(origin: impl Into<String>) -> (Arc<Self>, oneshot::Receiver<String>) {
        let (tx, rx) = oneshot::channel();
        let capture = Self {
            origin: origin.into().trim_end_matches('/').to_string(),
            tx: Mutex::new(Some(tx)),
        };
        (Arc::new(capture), rx)
    }

    pub async fn deliver(&self, path_and_query: &str) -> bool {
        let Some(tx) = self.tx.lock().await.take() else {
            return false;
        };
        tx.send(format!("{}{}", self.origin, path_and_query)).is_ok()
    }
}

pub async fn callback(
    OriginalUri(uri): OriginalUri,
    Extension(capture): Extension<Arc<RedirectCapture>>,
) -> Html<&'static str> {
    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());

    if capture.deliver(path_and_query).await {
        Html("<h2>Authorization received.</h2><p>You can close this window and return to the terminal.</p>")
    } else {
        warning!("Ignoring a repeated authorization redirect");
        Html("<h4>Authorization already handled.</h4>")
    }
}
