//! Error taxonomy for the execution core.
//!
//! Mirrors the five failure kinds distinguished by the design: validation
//! errors never retry and drop individual batch items; transport errors are
//! surfaced per-action so the plan's own retry list can run; controller
//! failures are recorded and flow into retry/failure fallback; navigation
//! failures carry a best-estimate device position; fatal errors abort the
//! calling process.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("transport error calling {host}: {message}")]
    Transport { host: String, message: String },

    #[error("controller error: {0}")]
    Controller(String),

    #[error("navigation error: {0}")]
    Navigation(String),

    #[error("fatal error: {0}")]
    Fatal(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn transport(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            host: host.into(),
            message: message.into(),
        }
    }

    pub fn controller(msg: impl Into<String>) -> Self {
        Self::Controller(msg.into())
    }

    pub fn navigation(msg: impl Into<String>) -> Self {
        Self::Navigation(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }
}
