// src/server/mod.rs

//! Dev server bridge: static files on one port, live reload on another.
//!
//! Both listeners are bound in [`DevServer::bind`] before anything is
//! spawned, so a taken port fails the `serve` step up front and the watch
//! loop is never entered.

pub mod livereload;
pub mod session;

use std::io;
use std::net::SocketAddr;
use std::path::Path;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::errors::{Result, SitepipeError};

pub use livereload::{ReloadHandle, ReloadMessage, livereload_router};
pub use session::ServerSession;

/// Router serving `root` as static files.
pub fn static_router(root: &Path) -> Router {
    Router::new()
        .fallback_service(ServeDir::new(root))
        .layer(TraceLayer::new_for_http())
}

async fn bind_listener(hostname: &str, port: u16) -> Result<TcpListener> {
    TcpListener::bind((hostname, port)).await.map_err(|e| {
        if e.kind() == io::ErrorKind::AddrInUse {
            SitepipeError::PortInUse { port }
        } else {
            SitepipeError::Other(
                anyhow::Error::new(e).context(format!("binding {hostname}:{port}")),
            )
        }
    })
}

/// Bound, not yet serving.
#[derive(Debug)]
pub struct DevServer {
    session: ServerSession,
    http: TcpListener,
    livereload: TcpListener,
    reload: ReloadHandle,
}

impl DevServer {
    /// Bind both ports. No retry: a taken port is `PortInUse`.
    pub async fn bind(session: ServerSession) -> Result<Self> {
        let http = bind_listener(&session.hostname, session.port).await?;
        let livereload = bind_listener(&session.hostname, session.livereload_port).await?;
        let reload = ReloadHandle::new(session.livereload_channel_id.clone());
        Ok(Self {
            session,
            http,
            livereload,
            reload,
        })
    }

    pub fn session(&self) -> &ServerSession {
        &self.session
    }

    pub fn reload_handle(&self) -> ReloadHandle {
        self.reload.clone()
    }

    /// Start both accept loops on the current runtime.
    pub fn spawn(self) -> Result<RunningServer> {
        let DevServer {
            session,
            http,
            livereload,
            reload,
        } = self;
        let http_addr = http.local_addr().context("reading http address")?;
        let livereload_addr = livereload
            .local_addr()
            .context("reading live reload address")?;

        let static_app = static_router(&session.root);
        let reload_app = livereload_router(reload.clone());

        let http_task = tokio::spawn(async move {
            if let Err(e) = axum::serve(http, static_app).await {
                error!(error = %e, "http server stopped");
            }
        });
        let livereload_task = tokio::spawn(async move {
            if let Err(e) = axum::serve(livereload, reload_app).await {
                error!(error = %e, "live reload server stopped");
            }
        });

        info!(
            url = %session.http_url(),
            root = ?session.root,
            livereload = %session.livereload_script_url(),
            "dev server started"
        );

        Ok(RunningServer {
            http_addr,
            livereload_addr,
            reload,
            tasks: vec![http_task, livereload_task],
        })
    }
}

/// A serving dev server. Dropping it stops both listeners.
#[derive(Debug)]
pub struct RunningServer {
    pub http_addr: SocketAddr,
    pub livereload_addr: SocketAddr,
    reload: ReloadHandle,
    tasks: Vec<JoinHandle<()>>,
}

impl RunningServer {
    pub fn reload_handle(&self) -> ReloadHandle {
        self.reload.clone()
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
