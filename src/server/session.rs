// src/server/session.rs

use std::path::PathBuf;

use crate::config::model::ConfigFile;
use crate::transform::output::digest;

/// Process-wide dev server state: where to listen and what to serve.
///
/// Created when the `serve` step runs and dropped on process exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSession {
    pub hostname: String,
    pub port: u16,
    pub livereload_port: u16,
    /// Identifies this server instance to reload clients, so a client that
    /// reconnects after a restart can tell it is talking to a new process.
    pub livereload_channel_id: String,
    /// Directory served over HTTP.
    pub root: PathBuf,
}

impl ServerSession {
    pub fn new(hostname: impl Into<String>, port: u16, livereload_port: u16, root: impl Into<PathBuf>) -> Self {
        let hostname = hostname.into();
        let root = root.into();
        let seed = format!(
            "{}:{}:{}:{}",
            std::process::id(),
            hostname,
            livereload_port,
            root.display()
        );
        Self {
            livereload_channel_id: digest(seed.as_bytes())[..12].to_string(),
            hostname,
            port,
            livereload_port,
            root,
        }
    }

    pub fn from_config(cfg: &ConfigFile) -> Self {
        let server = &cfg.server;
        Self::new(
            server.hostname.clone(),
            server.port,
            server.livereload_port,
            cfg.resolve_path(&server.root),
        )
    }

    pub fn http_url(&self) -> String {
        format!("http://{}:{}/", self.hostname, self.port)
    }

    pub fn livereload_script_url(&self) -> String {
        format!("http://{}:{}/livereload.js", self.hostname, self.livereload_port)
    }
}
