use super::endpoints::{Endpoint, Endpoints};
use super::session::extract_xsrf_token;
use crate::api::network::{Request, Transport};
use crate::error::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

/// Name of the hidden login form field carrying the one-time nonce.
pub const NONCE_FIELD: &str = "blackboard.platform.security.NonceUtil.nonce";

/// Session cookie that carries the XSRF token once logged in.
pub const ROUTER_COOKIE: &str = "BbRouter";

pub struct Credentials {
    pub identifier: String,
    secret: String,
}

impl Credentials {
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Serialize, Debug)]
struct LoginApiBody<'a> {
    user_id: &'a str,
    password: &'a str,
    login: &'static str,  // fixed "Sign In"
    action: &'static str, // fixed "login"
    new_loc: &'static str,
    #[serde(rename = "blackboard.platform.security.NonceUtil.nonce")]
    nonce: String,
}

impl<'a> LoginApiBody<'a> {
    fn password(credentials: &'a Credentials, nonce: String) -> Self {
        Self {
            user_id: &credentials.identifier,
            password: &credentials.secret,
            login: "Sign In",
            action: "login",
            new_loc: "",
            nonce,
        }
    }
}

/// Cookies issued to an authenticated session, by name.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SessionCookies(BTreeMap<String, String>);

impl SessionCookies {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for SessionCookies {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Debug for SessionCookies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

/// Value of the login form's nonce `<input>`.
pub fn extract_nonce(html: &str) -> Result<String> {
    extract_input_value(html, NONCE_FIELD).ok_or_else(|| {
        Error::Authentication("login page has no nonce field, page layout may have changed".into())
    })
}

fn extract_input_value(html: &str, name: &str) -> Option<String> {
    let bytes = html.as_bytes();
    let needle = format!("name=\"{name}\"");
    let mut offset = 0;

    while let Some(start_pos) = memchr::memmem::find(&bytes[offset..], b"<input") {
        let tag_start = offset + start_pos;
        let tag_end = memchr::memchr(b'>', &bytes[tag_start..])? + tag_start;
        let tag_content = &bytes[tag_start..tag_end];

        if memchr::memmem::find(tag_content, needle.as_bytes()).is_some()
            && let Some(v_pos) = memchr::memmem::find(tag_content, b"value=\"")
        {
            let remaining = &tag_content[v_pos + 7..];
            if let Some(v_end) = memchr::memchr(b'"', remaining) {
                return Some(std::str::from_utf8(&remaining[..v_end]).ok()?.to_string());
            }
        }

        offset = tag_end + 1;
    }
    None
}

/// Log in with a fresh nonce and return the cookies of the new session.
///
/// The portal answers the credential post with a redirect whether or not the
/// credentials were accepted, so success is judged by the presence of a `BbRouter`
/// cookie carrying an XSRF token.
pub async fn authenticate(
    transport: &dyn Transport,
    endpoints: &Endpoints,
    credentials: &Credentials,
) -> Result<SessionCookies> {
    let login_page = transport
        .send(Request::get(endpoints.url(&Endpoint::LoginPage)?))
        .await?
        .error_for_status()?;
    let nonce = extract_nonce(&login_page.body)?;
    debug!("login nonce found");

    let body = LoginApiBody::password(credentials, nonce);
    let request = Request::post(endpoints.url(&Endpoint::Login)?)
        .form(&body)?
        .no_redirect();
    let reply = transport.send(request).await?;
    if reply.status.is_server_error() {
        reply.error_for_status()?;
    }

    let router = transport.cookie(ROUTER_COOKIE, endpoints.base());
    if !router.is_some_and(|value| extract_xsrf_token(&value).is_ok()) {
        return Err(Error::Authentication(format!(
            "credentials for {} were rejected",
            credentials.identifier
        )));
    }

    info!(user = %credentials.identifier, "logged in");
    Ok(transport.cookies(endpoints.base()).into_iter().collect())
}
