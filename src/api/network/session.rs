use super::{Reply, Request, Transport};
use crate::error::{NetworkError, Result};
use ahash::RandomState;
use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use cookie::Cookie;
use dashmap::{DashMap, DashSet};
use reqwest::{
    Client, Method, StatusCode,
    header::{CONTENT_TYPE, COOKIE, HeaderValue, LOCATION, SET_COOKIE, USER_AGENT},
};
use smol_str::SmolStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

const MAX_REDIRECTS: u8 = 20;

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

pub struct SessionCookieStore {
    // Key: host, Value: Map<cookie_name, cookie_value>
    raw_data: DashMap<SmolStr, DashMap<SmolStr, Arc<str>>, RandomState>,
    header_cache: DashMap<SmolStr, HeaderValue, RandomState>,
    dirty: DashSet<SmolStr, RandomState>,
}

impl Default for SessionCookieStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionCookieStore {
    pub fn new() -> Self {
        Self {
            raw_data: DashMap::with_hasher(RandomState::default()),
            header_cache: DashMap::with_hasher(RandomState::default()),
            dirty: DashSet::with_hasher(RandomState::default()),
        }
    }

    pub fn get_header(&self, host: &str) -> Option<HeaderValue> {
        // rebuild only the host whose cookies changed
        if self.dirty.remove(host).is_some() {
            self.rebuild_cache_internal(host);
        }

        self.header_cache.get(host).map(|v| v.value().clone())
    }

    pub fn add_cookie_str(&self, host: &str, cookie_str: &str) {
        if let Ok(cookie) = Cookie::parse(cookie_str) {
            self.set(host, cookie.name(), cookie.value());
        }
    }

    pub fn set(&self, host: &str, key: &str, value: &str) {
        let host = SmolStr::new(host);

        let domain_map = self.raw_data.entry(host.clone()).or_default();
        domain_map.insert(SmolStr::new(key), Arc::from(value));

        self.dirty.insert(host);
    }

    fn rebuild_cache_internal(&self, host: &str) {
        if let Some(domain_ref) = self.raw_data.get(host) {
            let host_key = domain_ref.key().clone();
            let domain_map = domain_ref.value();

            let mut buf = BytesMut::with_capacity(domain_map.len() * 40);

            for item in domain_map.iter() {
                let (k, v) = (item.key(), item.value());

                if !buf.is_empty() {
                    buf.put_slice(b"; ");
                }
                buf.put_slice(k.as_bytes());
                buf.put_u8(b'=');
                buf.put_slice(v.as_bytes());
            }

            if let Ok(hv) = HeaderValue::from_maybe_shared(buf.freeze()) {
                self.header_cache.insert(host_key, hv);
            }
        }
    }

    pub fn get(&self, host: &str, key: &str) -> Option<Arc<str>> {
        self.raw_data
            .get(host)
            .and_then(|domain_store| domain_store.get(key).map(|v| v.value().clone()))
    }

    pub fn snapshot(&self, host: &str) -> Vec<(String, String)> {
        self.raw_data
            .get(host)
            .map(|domain_store| {
                domain_store
                    .iter()
                    .map(|item| (item.key().to_string(), item.value().to_string()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Production transport: one reqwest client, a private cookie jar and manual redirects
/// so that cookies set on intermediate hops are kept.
pub struct SessionClient {
    client: Client,
    cookie_store: Arc<SessionCookieStore>,
    ua: HeaderValue,
}

impl SessionClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(NetworkError::Transport)?;

        Ok(Self {
            client,
            cookie_store: Arc::new(SessionCookieStore::new()),
            ua: HeaderValue::from_static(BROWSER_UA),
        })
    }
}

#[async_trait]
impl Transport for SessionClient {
    async fn send(&self, request: Request) -> Result<Reply> {
        let Request {
            mut method,
            mut url,
            mut form,
            headers,
            follow_redirects,
        } = request;
        let origin = url.to_string();
        let mut redirect_count = 0;

        loop {
            if redirect_count > MAX_REDIRECTS {
                return Err(NetworkError::TooManyRedirects(origin).into());
            }

            debug!("{} {}", method, url);

            let mut builder = self
                .client
                .request(method.clone(), url.clone())
                .header(USER_AGENT, &self.ua);

            for (key, value) in headers.iter() {
                builder = builder.header(key, value);
            }

            if let Some(c) = self
                .cookie_store
                .get_header(url.host_str().unwrap_or_default())
            {
                builder = builder.header(COOKIE, c);
            }

            if let Some(ref b) = form {
                builder = builder
                    .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(b.clone());
            }

            let resp = builder.send().await?;

            for cookie in resp.headers().get_all(SET_COOKIE) {
                if let Ok(c_str) = cookie.to_str() {
                    self.cookie_store
                        .add_cookie_str(resp.url().host_str().unwrap_or_default(), c_str);
                }
            }

            if follow_redirects
                && resp.status().is_redirection()
                && let Some(loc) = resp.headers().get(LOCATION)
                && let Ok(loc) = loc.to_str()
            {
                let next_url = resp.url().join(loc)?;

                match resp.status() {
                    StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND | StatusCode::SEE_OTHER => {
                        method = Method::GET;
                        form = None;
                    }
                    // method and body are preserved
                    StatusCode::TEMPORARY_REDIRECT | StatusCode::PERMANENT_REDIRECT => {}
                    _ => return read_reply(resp).await,
                }

                trace!(from = %url, to = %next_url, "following redirect");
                url = next_url;
                redirect_count += 1;
                continue;
            }

            return read_reply(resp).await;
        }
    }

    fn cookie(&self, name: &str, url: &Url) -> Option<Arc<str>> {
        self.cookie_store
            .get(url.host_str().unwrap_or_default(), name)
    }

    fn cookies(&self, url: &Url) -> Vec<(String, String)> {
        self.cookie_store
            .snapshot(url.host_str().unwrap_or_default())
    }
}

async fn read_reply(resp: reqwest::Response) -> Result<Reply> {
    let status = resp.status();
    let url = resp.url().clone();
    let body = resp.text().await?;
    trace!(%status, %url, len = body.len(), "response read");
    Ok(Reply { status, url, body })
}
