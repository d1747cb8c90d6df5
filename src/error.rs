use thiserror::Error;

/// Errors returned by the search core.
///
/// Payloads are plain strings so one outcome can be cloned out to every
/// caller waiting on the same initialization.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
    #[error("{0} is not initialized")]
    NotInitialized(&'static str),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("empty result: {0}")]
    EmptyResult(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("no record for command {0}")]
    NotFound(String),

    #[error("command {0} has no summary")]
    MissingSummary(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("all {attempted} attempted {what} failed")]
    AllFailed { what: &'static str, attempted: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Parse(e.to_string())
    }
}
