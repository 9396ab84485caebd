use super::endpoints::Endpoint;
use super::session::{Occurrence, Session, SessionRecord};
use super::time::to_local;
use super::{Page, Portal};
use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

/// Single-course record with instructor and availability expansions.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CourseDetails {
    /// Primary key, looks like `_1234_1`.
    pub id: String,
    /// Human readable code, looks like `20CST-311_KRG_2A`.
    pub course_id: Option<String>,
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub struct Course {
    course_id: String,
    portal: Arc<Portal>,
    details: OnceCell<Arc<CourseDetails>>,
    sessions: OnceCell<Vec<Session>>,
}

impl Course {
    pub(crate) fn new(course_id: impl Into<String>, portal: Arc<Portal>) -> Self {
        Self {
            course_id: course_id.into(),
            portal,
            details: OnceCell::new(),
            sessions: OnceCell::new(),
        }
    }

    pub fn course_id(&self) -> &str {
        &self.course_id
    }

    /// Detailed metadata, fetched on first use.
    pub async fn course(&self) -> Result<&CourseDetails> {
        Ok(self.details_shared().await?.as_ref())
    }

    async fn details_shared(&self) -> Result<&Arc<CourseDetails>> {
        self.details
            .get_or_try_init(|| async {
                debug!(course = %self.course_id, "fetching course details");
                let details: CourseDetails = self
                    .portal
                    .get_json(Endpoint::Course {
                        course_id: &self.course_id,
                    })
                    .await?;
                Ok::<_, Error>(Arc::new(details))
            })
            .await
    }

    /// Virtual classroom sessions of this course, fetched on first use.
    pub async fn sessions(&self) -> Result<&[Session]> {
        let sessions = self
            .sessions
            .get_or_try_init(|| async {
                let details = self.details_shared().await?.clone();
                debug!(course = %self.course_id, "fetching sessions");
                let page: Page<SessionRecord> = self
                    .portal
                    .get_json(Endpoint::Sessions {
                        course_id: &self.course_id,
                    })
                    .await?;
                Ok::<_, Error>(
                    page.results
                        .into_iter()
                        .map(|record| Session::new(self.portal.clone(), details.clone(), record))
                        .collect(),
                )
            })
            .await?;
        Ok(sessions)
    }

    pub async fn next_session(&self) -> Result<Option<&Session>> {
        self.next_session_at(Utc::now()).await
    }

    /// Session whose next occurrence starts soonest; sessions with nothing ahead are skipped.
    pub async fn next_session_at(&self, now: DateTime<Utc>) -> Result<Option<&Session>> {
        let next = self
            .sessions()
            .await?
            .iter()
            .filter_map(|session| {
                session
                    .next_occurrence_at(now)
                    .map(|occurrence| (session, occurrence.start_time))
            })
            .min_by_key(|(_, start)| *start)
            .map(|(session, _)| session);
        Ok(next)
    }

    pub async fn next_occurrence(&self) -> Result<Option<&Occurrence>> {
        self.next_occurrence_at(Utc::now()).await
    }

    pub async fn next_occurrence_at(&self, now: DateTime<Utc>) -> Result<Option<&Occurrence>> {
        Ok(self
            .next_session_at(now)
            .await?
            .and_then(|session| session.next_occurrence_at(now)))
    }

    pub async fn start_time(&self) -> Result<DateTime<FixedOffset>> {
        self.start_time_at(Utc::now()).await
    }

    /// Local start of the next occurrence.
    pub async fn start_time_at(&self, now: DateTime<Utc>) -> Result<DateTime<FixedOffset>> {
        Ok(to_local(self.upcoming(now).await?.start_time))
    }

    pub async fn end_time(&self) -> Result<DateTime<FixedOffset>> {
        self.end_time_at(Utc::now()).await
    }

    pub async fn end_time_at(&self, now: DateTime<Utc>) -> Result<DateTime<FixedOffset>> {
        Ok(to_local(self.upcoming(now).await?.end_time))
    }

    async fn upcoming(&self, now: DateTime<Utc>) -> Result<&Occurrence> {
        self.next_occurrence_at(now).await?.ok_or_else(|| {
            Error::NoUpcomingSession(format!("course {} has nothing scheduled", self.course_id))
        })
    }
}

impl fmt::Debug for Course {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Course")
            .field("course_id", &self.course_id)
            .finish_non_exhaustive()
    }
}
