use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid base url '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("could not connect to {path}: {source}")]
    Connect {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {path} timed out")]
    Timeout { path: String },
    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{path} returned HTTP {code}: {body}")]
    Status { path: String, code: u16, body: String },
    #[error("could not decode response from {path}: {reason}")]
    Decode { path: String, reason: String },
}

impl ClientError {
    /// Network-level failures where the request may never have reached the backend.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClientError::Connect { .. }
                | ClientError::Transport { .. }
                | ClientError::Timeout { .. }
        )
    }

    /// The request never reached the backend, so replaying it cannot duplicate work.
    pub fn is_unsent(&self) -> bool {
        matches!(self, ClientError::Connect { .. })
    }

    pub fn is_server_error(&self) -> bool {
        matches!(self, ClientError::Status { code, .. } if *code >= 500)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file {path} not found")]
    Missing { path: PathBuf },
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
