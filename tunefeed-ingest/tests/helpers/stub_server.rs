//! Local HTTP server standing in for the preview CDN and the catalog feed
//!
//! Binds 127.0.0.1:0 and counts every request so tests can assert whether
//! the fetcher touched the network.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Size of the audio payload served by `/preview/frame.mp3`
pub const FRAME_SYNC_PAYLOAD_LEN: usize = 50 * 1024;

/// Size of the audio payload served by `/preview/huge.mp3`
pub const HUGE_PAYLOAD_LEN: usize = 512 * 1024;

/// Redirect target on a deny-listed host; never actually contacted
pub const DENIED_REDIRECT_TARGET: &str = "http://cdns-preview-1.dzcdn.net/stream/c-1.mp3";

/// 50 KB payload starting with an MPEG frame sync
pub fn frame_sync_payload() -> Vec<u8> {
    let mut data = vec![0xFF, 0xFB, 0x90, 0x64];
    data.resize(FRAME_SYNC_PAYLOAD_LEN, 0x55);
    data
}

#[derive(Clone, Default)]
struct Counters {
    total: Arc<AtomicUsize>,
    flaky: Arc<AtomicUsize>,
}

/// Running stub server
pub struct StubServer {
    pub base_url: String,
    counters: Counters,
}

impl StubServer {
    pub async fn start() -> Self {
        let counters = Counters::default();

        let app = Router::new()
            .route("/preview/frame.mp3", get(frame_mp3))
            .route("/preview/page.html", get(html_page))
            .route("/preview/tiny.mp3", get(tiny))
            .route("/preview/missing.mp3", get(missing))
            .route("/preview/flaky.mp3", get(flaky))
            .route("/preview/huge.mp3", get(huge))
            .route("/redirect/frame.mp3", get(redirect_to_frame))
            .route("/redirect/denied.mp3", get(redirect_to_denied))
            .route("/chart/0/tracks", get(chart))
            .route("/search", get(search))
            .with_state(counters.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            counters,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Requests received so far, all routes
    pub fn request_count(&self) -> usize {
        self.counters.total.load(Ordering::SeqCst)
    }
}

async fn frame_mp3(State(c): State<Counters>) -> impl IntoResponse {
    c.total.fetch_add(1, Ordering::SeqCst);
    ([(header::CONTENT_TYPE, "audio/mpeg")], frame_sync_payload())
}

async fn html_page(State(c): State<Counters>) -> impl IntoResponse {
    c.total.fetch_add(1, Ordering::SeqCst);
    let mut body = "<!DOCTYPE html><html><head><title>Access denied</title></head><body>".to_string();
    body.push_str(&"x".repeat(20 * 1024));
    body.push_str("</body></html>");
    ([(header::CONTENT_TYPE, "text/html")], body)
}

async fn tiny(State(c): State<Counters>) -> impl IntoResponse {
    c.total.fetch_add(1, Ordering::SeqCst);
    vec![0xFFu8, 0xFB, 0x90]
}

async fn missing(State(c): State<Counters>) -> impl IntoResponse {
    c.total.fetch_add(1, Ordering::SeqCst);
    StatusCode::NOT_FOUND
}

/// Fails with 503 on the first request, then serves audio
async fn flaky(State(c): State<Counters>) -> axum::response::Response {
    c.total.fetch_add(1, Ordering::SeqCst);
    if c.flaky.fetch_add(1, Ordering::SeqCst) == 0 {
        StatusCode::SERVICE_UNAVAILABLE.into_response()
    } else {
        ([(header::CONTENT_TYPE, "audio/mpeg")], frame_sync_payload()).into_response()
    }
}

async fn huge(State(c): State<Counters>) -> impl IntoResponse {
    c.total.fetch_add(1, Ordering::SeqCst);
    let mut data = frame_sync_payload();
    data.resize(HUGE_PAYLOAD_LEN, 0x55);
    ([(header::CONTENT_TYPE, "audio/mpeg")], data)
}

async fn redirect_to_frame(State(c): State<Counters>) -> impl IntoResponse {
    c.total.fetch_add(1, Ordering::SeqCst);
    (StatusCode::FOUND, [(header::LOCATION, "/preview/frame.mp3")])
}

async fn redirect_to_denied(State(c): State<Counters>) -> impl IntoResponse {
    c.total.fetch_add(1, Ordering::SeqCst);
    (StatusCode::FOUND, [(header::LOCATION, DENIED_REDIRECT_TARGET)])
}

fn feed_items() -> Value {
    json!({
        "data": [
            {
                "id": 1001,
                "title": "Mưa",
                "duration": 215,
                "preview": "https://cdns-preview-d.dzcdn.net/stream/c-1001.mp3",
                "artist": { "name": "Soobin" },
                "album": { "title": "Mưa Single", "cover_medium": "https://img.example/1001.jpg" }
            },
            {
                "id": 1002,
                "title": "Hello",
                "duration": 295,
                "preview": "",
                "artist": { "name": "Adele", "country": "GB" },
                "album": { "title": "25" }
            },
            {
                "id": 1003,
                "title": "Nơi Này Có Anh",
                "duration": 260,
                "preview": "",
                "artist": { "name": "Sơn Tùng MTP" },
                "album": { "title": "Single" }
            },
            {
                "id": 1004,
                "title": "No album"
            }
        ]
    })
}

async fn chart(State(c): State<Counters>) -> Json<Value> {
    c.total.fetch_add(1, Ordering::SeqCst);
    Json(feed_items())
}

async fn search(State(c): State<Counters>) -> Json<Value> {
    c.total.fetch_add(1, Ordering::SeqCst);
    Json(feed_items())
}
