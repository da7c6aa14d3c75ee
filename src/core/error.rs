use std::path::PathBuf;
use thiserror::Error;

/// Why a remote session could not be used. The `Display` form is what lands
/// in `HostStatus::error`.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("no usable authentication method")]
    NoAuthMethod,
    #[error("dial: {0}")]
    Dial(String),
    #[error("ssh: handshake: {0}")]
    Handshake(String),
    #[error("ssh: unable to authenticate as {user}, all methods rejected")]
    Auth { user: String },
    #[error("ssh: host key mismatch for {addr} (expected {expected}, got {actual})")]
    HostKeyMismatch {
        addr: String,
        expected: String,
        actual: String,
    },
    #[error("command exited with status {0}")]
    Command(i32),
    #[error("ssh: {0}")]
    Ssh(#[from] ssh2::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("known hosts: {0}")]
    KnownHosts(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("assignment {0:?} not found")]
    NotFound(String),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}
