use crate::error::{Error, Result};
use url::Url;

/// Logical portal operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint<'a> {
    LoginPage,
    Login,
    Memberships { user_id: &'a str },
    Course { course_id: &'a str },
    Sessions { course_id: &'a str },
    Launch { course_id: &'a str, session_id: &'a str },
    Profile,
}

impl Endpoint<'_> {
    pub const fn template(&self) -> &'static str {
        match self {
            Endpoint::LoginPage => "/",
            Endpoint::Login => "/webapps/login/",
            Endpoint::Memberships { .. } => "/learn/api/v1/users/{user_id}/memberships",
            Endpoint::Course { .. } => "/learn/api/v1/courses/{course_id}",
            Endpoint::Sessions { .. } => "/learn/api/v1/courses/{course_id}/collabultra/sessions",
            Endpoint::Launch { .. } => {
                "/learn/api/v1/courses/{course_id}/collabultra/sessions/{session_id}/launch"
            }
            Endpoint::Profile => "/ultra/profile",
        }
    }

    fn params(&self) -> Vec<(&'static str, &str)> {
        match *self {
            Endpoint::Memberships { user_id } => vec![("user_id", user_id)],
            Endpoint::Course { course_id } | Endpoint::Sessions { course_id } => {
                vec![("course_id", course_id)]
            }
            Endpoint::Launch {
                course_id,
                session_id,
            } => vec![("course_id", course_id), ("session_id", session_id)],
            _ => Vec::new(),
        }
    }

    fn query(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Endpoint::Memberships { .. } => &[
                (
                    "expand",
                    "course.effectiveAvailability,course.permissions,courseRole",
                ),
                ("includeCount", "true"),
                ("limit", "10000"),
            ],
            Endpoint::Course { .. } => &[(
                "expand",
                "instructorsMembership,instructorsMembership.courseRole,effectiveAvailability,isChild",
            )],
            Endpoint::Sessions { .. } => &[("expand", "sessionInstances")],
            _ => &[],
        }
    }
}

/// Resolves endpoints against one portal host.
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: Url,
}

impl Endpoints {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    pub fn parse(base: &str) -> Result<Self> {
        Ok(Self::new(Url::parse(base)?))
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn url(&self, endpoint: &Endpoint<'_>) -> Result<Url> {
        let params = endpoint.params();
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| Error::Parse(format!("{} cannot be a base url", self.base)))?;
            segments.pop_if_empty();
            for part in endpoint.template().split('/').filter(|p| !p.is_empty()) {
                match part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                    Some(name) => {
                        let value = params
                            .iter()
                            .find(|(key, _)| *key == name)
                            .map(|(_, value)| *value)
                            .ok_or_else(|| Error::Parse(format!("no value for {{{name}}}")))?;
                        segments.push(value);
                    }
                    None => {
                        segments.push(part);
                    }
                }
            }
            if endpoint.template().ends_with('/') {
                segments.push("");
            }
        }

        let query = endpoint.query();
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints() -> Endpoints {
        Endpoints::parse("https://cuchd.blackboard.com").unwrap()
    }

    #[test]
    fn launch_fills_both_placeholders() -> anyhow::Result<()> {
        let url = endpoints().url(&Endpoint::Launch {
            course_id: "_1234_1",
            session_id: "abcd",
        })?;
        assert_eq!(
            url.as_str(),
            "https://cuchd.blackboard.com/learn/api/v1/courses/_1234_1/collabultra/sessions/abcd/launch"
        );
        Ok(())
    }

    #[test]
    fn memberships_disable_paging() -> anyhow::Result<()> {
        let url = endpoints().url(&Endpoint::Memberships { user_id: "_82232_1" })?;
        assert_eq!(url.path(), "/learn/api/v1/users/_82232_1/memberships");
        let pairs: Vec<_> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("limit".to_string(), "10000".to_string())));
        assert!(pairs.contains(&("includeCount".to_string(), "true".to_string())));
        Ok(())
    }

    #[test]
    fn sessions_expand_instances() -> anyhow::Result<()> {
        let url = endpoints().url(&Endpoint::Sessions { course_id: "_7_1" })?;
        assert_eq!(url.path(), "/learn/api/v1/courses/_7_1/collabultra/sessions");
        assert_eq!(url.query(), Some("expand=sessionInstances"));
        Ok(())
    }

    #[test]
    fn login_keeps_trailing_slash() -> anyhow::Result<()> {
        let url = endpoints().url(&Endpoint::Login)?;
        assert_eq!(url.as_str(), "https://cuchd.blackboard.com/webapps/login/");
        assert_eq!(endpoints().url(&Endpoint::LoginPage)?.as_str(), "https://cuchd.blackboard.com/");
        Ok(())
    }

    #[test]
    fn ids_are_escaped_as_path_segments() -> anyhow::Result<()> {
        let url = endpoints().url(&Endpoint::Course { course_id: "a/b" })?;
        assert_eq!(url.path(), "/learn/api/v1/courses/a%2Fb");
        Ok(())
    }

    #[test]
    fn base_path_prefix_is_kept() -> anyhow::Result<()> {
        let endpoints = Endpoints::parse("https://portal.example/bb/")?;
        let url = endpoints.url(&Endpoint::Profile)?;
        assert_eq!(url.as_str(), "https://portal.example/bb/ultra/profile");
        Ok(())
    }
}
