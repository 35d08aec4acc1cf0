pub use anyhow::{anyhow, bail, format_err, Context, Error, Result};
pub use log::{debug, error, info, trace, warn};

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A single url that could not be retrieved.
///
/// These are never fatal for a run, the url is reported and skipped.
#[derive(Debug, Error)]
#[error("Download from {url} failed: {cause}")]
pub struct FetchFailure {
    pub url: String,
    pub cause: FetchCause,
}

impl FetchFailure {
    pub fn new(url: impl Into<String>, cause: impl Into<FetchCause>) -> FetchFailure {
        FetchFailure {
            url: url.into(),
            cause: cause.into(),
        }
    }

    /// The http status code, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self.cause {
            FetchCause::Status(code) => Some(code),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchCause {
    #[error("status code {0}")]
    Status(u16),
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

/// Compressed content that could not be read to the end.
#[derive(Debug, Error)]
#[error("Failed to decode {path:?}: {source}")]
pub struct DecodeFailure {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// A contents line without a path/package separator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Malformed contents line: {line:?}")]
pub struct ParseFailure {
    pub line: String,
}
