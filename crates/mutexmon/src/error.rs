use std::path::PathBuf;

use mutexmon_runtime::{ConfigError, FetchError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MonitorError>;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot set up snapshot fetcher: {0}")]
    Fetch(#[from] FetchError),

    #[error("cannot open log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot install logger: {message}")]
    Logging { message: String },
}

impl MonitorError {
    /// Configuration problems exit with 2, like a usage error; the rest with 1.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            _ => 1,
        }
    }
}
