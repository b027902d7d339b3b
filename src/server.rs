use axum::{Extension, Router, routing::get};
use reqwest::Url;
use std::{future::Future, io, net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;

use crate::api::{self, RedirectCapture};

/// Where a loopback redirect URI has to be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    pub addr: SocketAddr,
    pub origin: String,
    pub path: String,
}

impl RedirectTarget {
    pub fn parse(redirect_uri: &str) -> Result<Self, String> {
        let url = Url::parse(redirect_uri).map_err(|e| e.to_string())?;
        if url.scheme() != "http" {
            return Err(format!("{} is not a plain http loopback URI", redirect_uri));
        }

        let addr = url
            .socket_addrs(|| Some(80))
            .map_err(|e| e.to_string())?
            .into_iter()
            .find(|addr| addr.ip().is_loopback())
            .ok_or_else(|| format!("{} does not point at this machine", redirect_uri))?;

        Ok(Self {
            addr,
            origin: url.origin().ascii_serialization(),
            path: url.path().to_string(),
        })
    }
}

pub async fn bind(target: &RedirectTarget) -> io::Result<TcpListener> {
    TcpListener::bind(target.addr).await
}

/// Serves the callback route on `listener` until `shutdown` resolves.
pub async fn serve_redirect(
    listener: TcpListener,
    path: &str,
    capture: Arc<RedirectCapture>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> io::Result<()> {
    let mut app = Router::new().route(path, get(api::callback).layer(Extension(capture)));
    if path != "/health" {
        app = app.route("/health", get(api::health));
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
