use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use reqwest::Client;
use serde_json::{Value, json};
use spotsearch::error::FetchError;
use spotsearch::spotify::playlist::{SpotifyApi, TrackSource};
use spotsearch::types::TrackRecord;
use tokio::net::TcpListener;

#[derive(Clone)]
struct FakeApi {
    base: String,
    calls: Arc<AtomicUsize>,
}

fn track(id: &str, name: &str) -> Value {
    json!({
        "track": {
            "id": id,
            "name": name,
            "artists": [{
                "name": format!("Artist of {}", name),
                "external_urls": {"spotify": format!("https://open.spotify.com/artist/{}", id)}
            }],
            "album": {
                "name": format!("Album of {}", name),
                "external_urls": {"spotify": format!("https://open.spotify.com/album/{}", id)},
                "images": [
                    {"url": "https://i.scdn.co/large", "width": 640, "height": 640},
                    {"url": "https://i.scdn.co/small", "width": 64, "height": 64}
                ]
            }
        }
    })
}

// Six items in pages of two; one item has no track, one is a local file
fn all_items() -> Vec<Value> {
    vec![
        track("t0", "Song Zero"),
        track("t1", "Song One"),
        json!({"track": null}),
        track("t3", "Song Three"),
        json!({"track": {"id": null, "name": "Local file", "artists": [], "album": {"name": ""}}}),
        track("t5", "Song Five"),
    ]
}

async fn tracks(
    State(api): State<FakeApi>,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let calls = api.calls.fetch_add(1, Ordering::SeqCst) + 1;

    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        == Some("Bearer good");
    if !authorized {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": {"status": 401}}))).into_response();
    }

    match id.as_str() {
        "flaky" if calls == 1 => return StatusCode::BAD_GATEWAY.into_response(),
        "down" => return StatusCode::BAD_GATEWAY.into_response(),
        "missing" => return StatusCode::NOT_FOUND.into_response(),
        _ => {}
    }

    let offset: usize = query
        .get("offset")
        .and_then(|o| o.parse().ok())
        .unwrap_or(0);
    let items = all_items();
    let page: Vec<Value> = items.iter().skip(offset).take(2).cloned().collect();
    let next = (offset + 2 < items.len()).then(|| {
        format!(
            "{}/playlists/{}/tracks?offset={}&limit=2",
            api.base,
            id,
            offset + 2
        )
    });

    Json(json!({"items": page, "next": next})).into_response()
}

async fn spawn_api() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}/v1", listener.local_addr().unwrap());
    let calls = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/v1/playlists/{id}/tracks", get(tracks))
        .with_state(FakeApi {
            base: base.clone(),
            calls: Arc::clone(&calls),
        });
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (base, calls)
}

fn api(base: &str) -> SpotifyApi {
    SpotifyApi::new(Client::new(), base).with_retry_delay(Duration::ZERO)
}

#[tokio::test]
async fn test_fetch_follows_next_and_streams_pages() {
    let (base, calls) = spawn_api().await;
    let api = api(&base);

    let mut pages: Vec<Vec<String>> = Vec::new();
    let mut on_page = |page: &[TrackRecord]| {
        pages.push(page.iter().map(|t| t.id.clone()).collect());
    };
    let tracks = api
        .fetch_tracks("p1", "good", Some(&mut on_page))
        .await
        .unwrap();

    let ids: Vec<&str> = tracks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["t0", "t1", "t3", "t5"]);
    assert_eq!(
        pages,
        vec![
            vec!["t0".to_string(), "t1".to_string()],
            vec!["t3".to_string()],
            vec!["t5".to_string()],
        ]
    );
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_track_record_mapping() {
    let (base, _) = spawn_api().await;
    let tracks = api(&base).fetch_tracks("p1", "good", None).await.unwrap();

    let first = &tracks[0];
    assert_eq!(first.name, "Song Zero");
    assert_eq!(first.album, "Album of Song Zero");
    assert_eq!(first.album_url, "https://open.spotify.com/album/t0");
    assert_eq!(first.album_image_url.as_deref(), Some("https://i.scdn.co/small"));
    assert_eq!(first.artists.len(), 1);
    assert_eq!(first.artists[0].name, "Artist of Song Zero");
    assert_eq!(first.artists[0].url, "https://open.spotify.com/artist/t0");
}

#[tokio::test]
async fn test_first_page_url() {
    let api = SpotifyApi::new(Client::new(), "https://api.example/v1/");
    assert_eq!(
        api.first_page_url("abc"),
        "https://api.example/v1/playlists/abc/tracks?limit=50"
    );
}

#[tokio::test]
async fn test_unauthorized_is_distinguished() {
    let (base, _) = spawn_api().await;
    let result = api(&base).fetch_tracks("p1", "expired", None).await;
    assert!(matches!(result, Err(FetchError::Unauthorized)));
}

#[tokio::test]
async fn test_other_status_is_http_error() {
    let (base, _) = spawn_api().await;
    let result = api(&base).fetch_tracks("missing", "good", None).await;
    assert!(matches!(result, Err(FetchError::HttpError { status: 404 })));
}

#[tokio::test]
async fn test_bad_gateway_is_retried() {
    let (base, calls) = spawn_api().await;
    let tracks = api(&base).fetch_tracks("flaky", "good", None).await.unwrap();
    assert_eq!(tracks.len(), 4);
    // one failed attempt plus three pages
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_bad_gateway_retries_are_bounded() {
    let (base, calls) = spawn_api().await;
    let result = api(&base).fetch_tracks("down", "good", None).await;
    assert!(matches!(result, Err(FetchError::HttpError { status: 502 })));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}
