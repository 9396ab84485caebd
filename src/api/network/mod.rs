mod session;

pub use session::{SessionClient, SessionCookieStore};

use crate::error::{Error, NetworkError, Result};
use async_trait::async_trait;
use reqwest::{
    Method, StatusCode,
    header::{HeaderMap, HeaderName, HeaderValue},
};
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// One outgoing portal request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    /// Already url-encoded form body.
    pub form: Option<String>,
    pub headers: HeaderMap,
    pub follow_redirects: bool,
}

impl Request {
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: Url) -> Self {
        Self::new(Method::POST, url)
    }

    fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            form: None,
            headers: HeaderMap::new(),
            follow_redirects: true,
        }
    }

    pub fn form<T: Serialize + ?Sized>(mut self, data: &T) -> Result<Self> {
        let body = serde_urlencoded::to_string(data)
            .map_err(|e| Error::Parse(format!("cannot encode form: {e}")))?;
        self.form = Some(body);
        Ok(self)
    }

    pub fn header(mut self, name: &'static str, value: &str) -> Result<Self> {
        let value = HeaderValue::from_str(value)
            .map_err(|_| Error::Parse(format!("invalid value for header {name}")))?;
        self.headers.insert(HeaderName::from_static(name), value);
        Ok(self)
    }

    /// Hand back the first response as is, so its `Set-Cookie` headers can be inspected.
    pub fn no_redirect(mut self) -> Self {
        self.follow_redirects = false;
        self
    }
}

/// A fully read response.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub url: Url,
    pub body: String,
}

impl Reply {
    pub fn error_for_status(self) -> Result<Self> {
        if self.status.is_client_error() || self.status.is_server_error() {
            return Err(NetworkError::Status {
                url: self.url.to_string(),
                status: self.status,
            }
            .into());
        }
        Ok(self)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|e| {
            debug!(
                "JSON decode failed for {} at line {}, column {}: {}",
                self.url,
                e.line(),
                e.column(),
                e
            );
            debug!(body = %self.body);
            Error::Parse(format!("unexpected JSON from {}: {e}", self.url.path()))
        })
    }
}

/// HTTP capability the portal entities talk through.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> Result<Reply>;

    /// Value of cookie `name` stored for the host of `url`.
    fn cookie(&self, name: &str, url: &Url) -> Option<Arc<str>>;

    /// Every cookie stored for the host of `url`.
    fn cookies(&self, url: &Url) -> Vec<(String, String)>;
}
