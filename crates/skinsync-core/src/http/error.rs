//! Request error type.

use std::path::PathBuf;

/// Why a request ended in `Error` (or could not produce a result).
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported scheme {0:?} (only http and https)")]
    UnsupportedScheme(String),
    #[error("i/o error, cannot create folder for {}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("i/o error, cannot open file {}", .path.display())]
    OpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("i/o error, cannot write file {}", .path.display())]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("i/o error, cannot close file {}", .path.display())]
    CloseFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("libcurl error: {0}")]
    Curl(#[from] curl::Error),
    #[error("response exceeds {limit} bytes")]
    TooLarge { limit: u64 },
    #[error("request aborted")]
    Aborted,
    #[error("no in-memory result (file destination or request not done)")]
    NoResult,
    #[error("invalid JSON response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("request worker stopped: {0}")]
    Worker(String),
}
