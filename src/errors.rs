// src/errors.rs

//! Crate-wide error type and result alias.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SitepipeError {
    /// Unknown task/pipeline reference or an invalid rule. Always raised
    /// before any step has run.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An external tool (or built-in collaborator) rejected its input.
    /// `message` is the tool's diagnostic text, unmodified.
    #[error("step '{step}' failed:\n{message}")]
    Transform { step: String, message: String },

    #[error("port {port} is already in use")]
    PortInUse { port: u16 },

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SitepipeError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SitepipeError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        SitepipeError::Configuration(msg.into())
    }

    /// True for errors raised while reading the config or resolving names,
    /// before any step ran.
    pub fn is_configuration(&self) -> bool {
        matches!(self, SitepipeError::Configuration(_) | SitepipeError::Toml(_))
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SitepipeError>;
