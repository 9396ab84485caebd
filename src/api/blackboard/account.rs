use super::course::Course;
use super::endpoints::{Endpoint, Endpoints};
use super::login::{Credentials, SessionCookies, authenticate};
use super::profile::{AccountDetails, extract_embedded_json};
use super::session::{Occurrence, Session};
use super::{Page, Portal};
use crate::api::network::{SessionClient, Transport};
use crate::config::PortalConfig;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Membership {
    course_id: String,
}

/// An authenticated portal user.
pub struct Account {
    portal: Arc<Portal>,
    profile_marker: String,
    details: OnceCell<AccountDetails>,
    courses: OnceCell<Vec<Course>>,
}

impl Account {
    /// Log in over HTTP using the portal settings from the config file.
    pub async fn login(config: &PortalConfig, credentials: Credentials) -> Result<Self> {
        let transport = SessionClient::new(Duration::from_secs(config.timeout_secs))?;
        let endpoints = Endpoints::parse(&config.base_url)?;
        Self::with_transport(
            Arc::new(transport),
            endpoints,
            config.profile_marker.clone(),
            credentials,
        )
        .await
    }

    pub async fn with_transport(
        transport: Arc<dyn Transport>,
        endpoints: Endpoints,
        profile_marker: impl Into<String>,
        credentials: Credentials,
    ) -> Result<Self> {
        let cookies = authenticate(transport.as_ref(), &endpoints, &credentials).await?;
        Ok(Self {
            portal: Arc::new(Portal {
                transport,
                endpoints,
                cookies,
            }),
            profile_marker: profile_marker.into(),
            details: OnceCell::new(),
            courses: OnceCell::new(),
        })
    }

    pub fn cookies(&self) -> &SessionCookies {
        &self.portal.cookies
    }

    /// Identity scraped from the profile page, fetched on first use.
    pub async fn details(&self) -> Result<&AccountDetails> {
        self.details
            .get_or_try_init(|| async {
                let page = self.portal.get(Endpoint::Profile).await?;
                let details: AccountDetails =
                    extract_embedded_json(&page.body, &self.profile_marker)?;
                info!(id = %details.id, name = %details.display_name(), "account details loaded");
                Ok::<_, Error>(details)
            })
            .await
    }

    /// Enrolled courses in the order the portal lists them, fetched on first use.
    pub async fn courses(&self) -> Result<&[Course]> {
        let courses = self
            .courses
            .get_or_try_init(|| async {
                let user_id = self.details().await?.id.clone();
                let page: Page<Membership> = self
                    .portal
                    .get_json(Endpoint::Memberships { user_id: &user_id })
                    .await?;
                debug!(count = page.results.len(), "memberships listed");
                Ok::<_, Error>(
                    page.results
                        .into_iter()
                        .map(|membership| Course::new(membership.course_id, self.portal.clone()))
                        .collect(),
                )
            })
            .await?;
        Ok(courses)
    }

    /// Handle for a course known by id; not cached on the account.
    pub fn course(&self, course_id: impl Into<String>) -> Course {
        Course::new(course_id, self.portal.clone())
    }

    pub async fn next_course(&self) -> Result<Option<&Course>> {
        self.next_course_at(Utc::now()).await
    }

    /// Course whose next session starts soonest; ties keep the portal's order.
    pub async fn next_course_at(&self, now: DateTime<Utc>) -> Result<Option<&Course>> {
        let mut best: Option<(&Course, DateTime<Utc>)> = None;
        for course in self.courses().await? {
            let Some(start) = course
                .next_occurrence_at(now)
                .await?
                .map(|occurrence| occurrence.start_time)
            else {
                continue;
            };
            if best.is_none_or(|(_, best_start)| start < best_start) {
                best = Some((course, start));
            }
        }
        if let Some((course, start)) = best {
            debug!(course = %course.course_id(), %start, "next course selected");
        }
        Ok(best.map(|(course, _)| course))
    }

    pub async fn next_session(&self) -> Result<Option<&Session>> {
        self.next_session_at(Utc::now()).await
    }

    pub async fn next_session_at(&self, now: DateTime<Utc>) -> Result<Option<&Session>> {
        match self.next_course_at(now).await? {
            Some(course) => course.next_session_at(now).await,
            None => Ok(None),
        }
    }

    pub async fn next_occurrence(&self) -> Result<Option<&Occurrence>> {
        self.next_occurrence_at(Utc::now()).await
    }

    pub async fn next_occurrence_at(&self, now: DateTime<Utc>) -> Result<Option<&Occurrence>> {
        match self.next_course_at(now).await? {
            Some(course) => course.next_occurrence_at(now).await,
            None => Ok(None),
        }
    }
}
