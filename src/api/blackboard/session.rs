use super::course::CourseDetails;
use super::endpoints::Endpoint;
use super::login::ROUTER_COOKIE;
use super::time::{deserialize_utc, to_local};
use super::Portal;
use crate::api::network::Request;
use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::{debug, info, warn};

const XSRF_MARKER: &str = "xsrf:";
const XSRF_HEADER: &str = "x-blackboard-xsrf";

/// One scheduled time window of a session.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    pub id: Option<String>,
    #[serde(deserialize_with = "deserialize_utc")]
    pub start_time: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_utc")]
    pub end_time: DateTime<Utc>,
}

impl Occurrence {
    pub fn has_ended_at(&self, now: DateTime<Utc>) -> bool {
        self.end_time < now
    }

    pub fn local_start(&self) -> DateTime<FixedOffset> {
        to_local(self.start_time)
    }

    pub fn local_end(&self) -> DateTime<FixedOffset> {
        to_local(self.end_time)
    }
}

/// Raw session metadata as listed by the collaborate endpoint.
#[derive(Deserialize, Debug, Clone)]
pub struct SessionRecord {
    pub id: String,
    pub name: Option<String>,
    #[serde(default)]
    pub occurrences: Vec<Occurrence>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Sort key for "which session starts next". `Never` sorts after every instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NextStart {
    At(DateTime<Utc>),
    Never,
}

#[derive(Deserialize, Debug, Clone)]
pub struct LaunchPayload {
    pub url: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub struct Session {
    portal: Arc<Portal>,
    course: Arc<CourseDetails>,
    record: SessionRecord,
}

impl Session {
    pub(crate) fn new(portal: Arc<Portal>, course: Arc<CourseDetails>, mut record: SessionRecord) -> Self {
        if !record
            .occurrences
            .is_sorted_by_key(|occurrence| occurrence.start_time)
        {
            warn!(session = %record.id, "occurrences arrived out of order, sorting by start time");
            record
                .occurrences
                .sort_by_key(|occurrence| occurrence.start_time);
        }
        Self {
            portal,
            course,
            record,
        }
    }

    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn name(&self) -> Option<&str> {
        self.record.name.as_deref()
    }

    pub fn course(&self) -> &CourseDetails {
        &self.course
    }

    pub fn record(&self) -> &SessionRecord {
        &self.record
    }

    /// Occurrences in ascending start order.
    pub fn occurrences(&self) -> &[Occurrence] {
        &self.record.occurrences
    }

    pub fn next_occurrence(&self) -> Option<&Occurrence> {
        self.next_occurrence_at(Utc::now())
    }

    /// First occurrence still running or yet to come at `now`.
    pub fn next_occurrence_at(&self, now: DateTime<Utc>) -> Option<&Occurrence> {
        self.record
            .occurrences
            .iter()
            .find(|occurrence| !occurrence.has_ended_at(now))
    }

    pub fn next_start_at(&self, now: DateTime<Utc>) -> NextStart {
        self.next_occurrence_at(now)
            .map_or(NextStart::Never, |occurrence| NextStart::At(occurrence.start_time))
    }

    /// Order two sessions by their next start; sessions with nothing ahead come last.
    pub fn cmp_next_at(&self, other: &Session, now: DateTime<Utc>) -> Ordering {
        self.next_start_at(now).cmp(&other.next_start_at(now))
    }

    /// Ask the portal for a launch URL for this session.
    pub async fn join(&self) -> Result<LaunchPayload> {
        let router = self
            .portal
            .cookies
            .get(ROUTER_COOKIE)
            .ok_or_else(|| Error::Join(format!("no {ROUTER_COOKIE} cookie in session")))?;
        let token = extract_xsrf_token(router)?;

        let url = self.portal.endpoints.url(&Endpoint::Launch {
            course_id: &self.course.id,
            session_id: &self.record.id,
        })?;
        debug!(session = %self.record.id, course = %self.course.id, "launching session");

        let request = Request::post(url).header(XSRF_HEADER, token)?;
        let reply = self.portal.transport.send(request).await?;
        if !reply.status.is_success() {
            return Err(Error::Join(format!(
                "launch of session {} answered {}",
                self.record.id, reply.status
            )));
        }

        let payload: LaunchPayload = serde_json::from_str(&reply.body)
            .map_err(|e| Error::Join(format!("unexpected launch response: {e}")))?;
        info!(session = %self.record.id, "launch url issued");
        Ok(payload)
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.record.id == other.record.id && self.course.id == other.course.id
    }
}

impl Eq for Session {}

impl Hash for Session {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.record.id.hash(state);
        self.course.id.hash(state);
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.record.id)
            .field("course", &self.course.id)
            .field("name", &self.record.name)
            .field("occurrences", &self.record.occurrences.len())
            .finish()
    }
}

/// Token that follows `xsrf:` in a `BbRouter` cookie value.
pub fn extract_xsrf_token(cookie: &str) -> Result<&str> {
    let start = cookie
        .find(XSRF_MARKER)
        .ok_or_else(|| Error::Join(format!("cookie has no {XSRF_MARKER} token")))?
        + XSRF_MARKER.len();
    match &cookie[start..] {
        "" => Err(Error::Join("cookie carries an empty xsrf token".into())),
        token => Ok(token),
    }
}
