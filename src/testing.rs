//! In-memory portal for unit tests.

use crate::api::blackboard::{CourseDetails, Endpoints, Portal, ROUTER_COOKIE, SessionCookies};
use crate::api::network::{Reply, Request, Transport};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use dashmap::DashMap;
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use url::Url;

pub const BASE_URL: &str = "https://portal.test";

#[derive(Default)]
struct Inner {
    routes: DashMap<String, (StatusCode, String)>,
    calls: DashMap<String, usize>,
    grants: DashMap<String, Vec<(String, String)>>,
    jar: DashMap<String, String>,
    requests: Mutex<Vec<Request>>,
}

/// Canned replies keyed by method and path; unknown routes answer 404.
#[derive(Clone, Default)]
pub struct StubTransport {
    inner: Arc<Inner>,
}

fn key(method: &Method, path: &str) -> String {
    format!("{method} {path}")
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints::parse(BASE_URL).unwrap()
    }

    pub fn route(&self, method: Method, path: &str, status: StatusCode, body: impl Into<String>) {
        self.inner
            .routes
            .insert(key(&method, path), (status, body.into()));
    }

    /// Set cookie `name` once any request hits `path`.
    pub fn grant_cookie(&self, path: &str, name: &str, value: &str) {
        self.inner
            .grants
            .entry(path.to_string())
            .or_default()
            .push((name.to_string(), value.to_string()));
    }

    pub fn calls(&self, method: Method, path: &str) -> usize {
        self.inner
            .calls
            .get(&key(&method, path))
            .map(|count| *count)
            .unwrap_or(0)
    }

    pub fn last_request(&self, method: Method, path: &str) -> Option<Request> {
        self.inner
            .requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.method == method && r.url.path() == path)
            .cloned()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(&self, request: Request) -> Result<Reply> {
        let route = key(&request.method, request.url.path());
        *self.inner.calls.entry(route.clone()).or_default() += 1;

        if let Some(grants) = self.inner.grants.get(request.url.path()) {
            for (name, value) in grants.iter() {
                self.inner.jar.insert(name.clone(), value.clone());
            }
        }

        let (status, body) = self
            .inner
            .routes
            .get(&route)
            .map(|r| r.value().clone())
            .unwrap_or((StatusCode::NOT_FOUND, String::new()));
        let url = request.url.clone();
        self.inner.requests.lock().unwrap().push(request);
        Ok(Reply { status, url, body })
    }

    fn cookie(&self, name: &str, _url: &Url) -> Option<Arc<str>> {
        self.inner.jar.get(name).map(|v| Arc::from(v.value().as_str()))
    }

    fn cookies(&self, _url: &Url) -> Vec<(String, String)> {
        self.inner
            .jar
            .iter()
            .map(|item| (item.key().clone(), item.value().clone()))
            .collect()
    }
}

/// Portal handle already logged in, with a `BbRouter` cookie carrying token `tok`.
pub(crate) fn portal_with(stub: StubTransport) -> Arc<Portal> {
    let endpoints = stub.endpoints();
    let cookies: SessionCookies = [(ROUTER_COOKIE.to_string(), "expires:1,xsrf:tok".to_string())]
        .into_iter()
        .collect();
    Arc::new(Portal {
        transport: Arc::new(stub),
        endpoints,
        cookies,
    })
}

pub fn login_page(nonce: &str) -> String {
    format!(
        r#"<html><form id="login-form">
<input type="text" name="user_id" id="user_id" value="">
<input type="hidden" name="blackboard.platform.security.NonceUtil.nonce" value="{nonce}">
</form></html>"#
    )
}

pub fn course_details(id: &str) -> CourseDetails {
    serde_json::from_value(json!({ "id": id })).unwrap()
}

pub fn occurrence_json(start: DateTime<Utc>, end: DateTime<Utc>) -> Value {
    json!({
        "startTime": start.to_rfc3339_opts(SecondsFormat::Millis, true),
        "endTime": end.to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

pub fn session_json(id: &str, occurrences: Vec<Value>) -> Value {
    json!({ "id": id, "name": id, "occurrences": occurrences })
}
