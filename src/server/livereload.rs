// src/server/livereload.rs

//! Live-reload channel.
//!
//! Browsers subscribe to `GET /livereload` (server-sent events) or poll
//! `GET /livereload/version`. `GET /livereload.js` serves a tiny client
//! that does the former and reloads the page on every `reload` event.

use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use futures::stream::{self, Stream};
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::watch::path_utils::to_slash;

pub const CLIENT_SCRIPT: &str = r#"(function () {
  var src = document.currentScript && document.currentScript.src;
  var base = src ? new URL(src).origin : "";
  var source = new EventSource(base + "/livereload");
  source.addEventListener("reload", function () {
    window.location.reload();
  });
})();
"#;

/// One reload notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadMessage {
    pub version: u64,
    pub paths: Vec<String>,
}

#[derive(Debug)]
struct ReloadInner {
    tx: broadcast::Sender<ReloadMessage>,
    version: AtomicU64,
    channel_id: String,
}

/// Cloneable handle used to signal connected browsers.
#[derive(Debug, Clone)]
pub struct ReloadHandle {
    inner: Arc<ReloadInner>,
}

impl ReloadHandle {
    pub fn new(channel_id: impl Into<String>) -> Self {
        let (tx, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(ReloadInner {
                tx,
                version: AtomicU64::new(0),
                channel_id: channel_id.into(),
            }),
        }
    }

    pub fn channel_id(&self) -> &str {
        &self.inner.channel_id
    }

    /// Number of reloads sent so far.
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadMessage> {
        self.inner.tx.subscribe()
    }

    /// Broadcast a reload for `paths`. Returns how many clients got it.
    pub fn notify(&self, paths: &[PathBuf]) -> usize {
        let version = self.inner.version.fetch_add(1, Ordering::SeqCst) + 1;
        let message = ReloadMessage {
            version,
            paths: paths.iter().map(|p| to_slash(p)).collect(),
        };
        // No subscribers is not an error: nobody has the page open.
        self.inner.tx.send(message).unwrap_or(0)
    }
}

fn reload_stream(
    rx: broadcast::Receiver<ReloadMessage>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(msg) => {
                    let event = Event::default()
                        .event("reload")
                        .id(msg.version.to_string())
                        .data(msg.paths.join("\n"));
                    return Some((Ok(event), rx));
                }
                // A slow client only needs to know something changed.
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "live reload client lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
}

async fn events(State(handle): State<ReloadHandle>) -> impl IntoResponse {
    debug!("live reload client connected");
    Sse::new(reload_stream(handle.subscribe())).keep_alive(KeepAlive::default())
}

async fn version(State(handle): State<ReloadHandle>) -> impl IntoResponse {
    (
        [("x-livereload-channel", handle.channel_id().to_string())],
        handle.version().to_string(),
    )
}

async fn client_script() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/javascript")], CLIENT_SCRIPT)
}

/// Router for the live-reload port.
pub fn livereload_router(handle: ReloadHandle) -> Router {
    Router::new()
        .route("/livereload", get(events))
        .route("/livereload/version", get(version))
        .route("/livereload.js", get(client_script))
        .with_state(handle)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
