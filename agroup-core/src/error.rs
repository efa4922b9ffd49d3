use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgroupError {
    #[error("invalid config value for {key}: {value}")]
    InvalidConfig { key: String, value: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("no session files found under {path}")]
    NoEventFiles { path: PathBuf },

    #[error("event file is empty: {path}")]
    EmptyEventFile { path: PathBuf },

    #[error("event file is not valid UTF-8: {path}")]
    NonUtf8EventFile { path: PathBuf },

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid json line in {path} at line {line}: {source}")]
    InvalidJsonLine {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, AgroupError>;
