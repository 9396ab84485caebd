use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by the portal client.
#[derive(Debug, Error)]
pub enum Error {
    /// Login form token missing or credentials rejected.
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Expected HTML or JSON structure was absent.
    #[error("parse error: {0}")]
    Parse(String),

    /// XSRF token extraction or the launch call failed.
    #[error("join failed: {0}")]
    Join(String),

    #[error("no upcoming session: {0}")]
    NoUpcomingSession(String),
}

#[derive(Debug, Error)]
pub enum NetworkError {
    /// Connect failure, timeout or body read error.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{url} responded with {status}")]
    Status { url: String, status: StatusCode },

    #[error("too many redirects starting from {0}")]
    TooManyRedirects(String),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Network(NetworkError::Transport(e))
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::Parse(format!("invalid url: {e}"))
    }
}
