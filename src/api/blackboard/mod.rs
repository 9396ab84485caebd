mod account;
mod course;
mod endpoints;
mod login;
mod profile;
mod session;
pub mod time;

pub use account::Account;
pub use course::{Course, CourseDetails};
pub use endpoints::{Endpoint, Endpoints};
pub use login::{Credentials, NONCE_FIELD, ROUTER_COOKIE, SessionCookies, authenticate, extract_nonce};
pub use profile::{AccountDetails, extract_embedded_json};
pub use session::{LaunchPayload, NextStart, Occurrence, Session, SessionRecord, extract_xsrf_token};

use crate::api::network::{Reply, Request, Transport};
use crate::error::Result;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Listing envelope used by the `learn/api/v1` endpoints.
#[derive(Deserialize, Debug)]
pub(crate) struct Page<T> {
    pub results: Vec<T>,
}

/// What every entity needs to reach the portal after login.
pub(crate) struct Portal {
    pub transport: Arc<dyn Transport>,
    pub endpoints: Endpoints,
    pub cookies: SessionCookies,
}

impl Portal {
    pub async fn get(&self, endpoint: Endpoint<'_>) -> Result<Reply> {
        let url = self.endpoints.url(&endpoint)?;
        self.transport.send(Request::get(url)).await?.error_for_status()
    }

    pub async fn get_json<T: DeserializeOwned>(&self, endpoint: Endpoint<'_>) -> Result<T> {
        self.get(endpoint).await?.json()
    }
}
