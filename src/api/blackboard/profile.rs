use crate::error::{Error, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Identity of the logged-in user, as embedded in the profile page.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AccountDetails {
    /// Primary key, looks like `_82232_1`.
    pub id: String,
    pub user_name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub email_address: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AccountDetails {
    pub fn display_name(&self) -> String {
        match (&self.given_name, &self.family_name) {
            (Some(given), Some(family)) => format!("{given} {family}"),
            (Some(name), None) | (None, Some(name)) => name.clone(),
            (None, None) => self.user_name.clone().unwrap_or_else(|| self.id.clone()),
        }
    }
}

/// Parse the JSON value that follows `marker` on the same line of `html`.
pub fn extract_embedded_json<T: DeserializeOwned>(html: &str, marker: &str) -> Result<T> {
    let start = memchr::memmem::find(html.as_bytes(), marker.as_bytes())
        .ok_or_else(|| Error::Parse(format!("marker {marker:?} not found in page")))?
        + marker.len();
    let rest = &html[start..];
    let line = match memchr::memchr(b'\n', rest.as_bytes()) {
        Some(end) => &rest[..end],
        None => rest,
    };

    // trailing `;` or markup after the object is ignored
    serde_json::Deserializer::from_str(line.trim_start())
        .into_iter::<T>()
        .next()
        .ok_or_else(|| Error::Parse(format!("nothing follows marker {marker:?}")))?
        .map_err(|e| Error::Parse(format!("embedded JSON after {marker:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "<html><script>\n  var ctx = {\"locale\":\"en\", \"user\":{\"id\":\"_82232_1\",\"userName\":\"20BCS1\",\"givenName\":\"Asha\",\"familyName\":\"Rao\",\"avatar\":null}, \"x\":1};\n</script></html>";

    #[test]
    fn user_object_is_read_after_marker() -> anyhow::Result<()> {
        let details: AccountDetails = extract_embedded_json(PAGE, "\"user\":")?;
        assert_eq!(details.id, "_82232_1");
        assert_eq!(details.user_name.as_deref(), Some("20BCS1"));
        assert_eq!(details.display_name(), "Asha Rao");
        assert!(details.extra.contains_key("avatar"));
        Ok(())
    }

    #[test]
    fn missing_marker_is_a_parse_error() {
        let result = extract_embedded_json::<AccountDetails>(PAGE, "currentUser = ");
        assert!(matches!(result, Err(Error::Parse(_))));
    }

    #[test]
    fn object_cut_by_line_break_is_a_parse_error() {
        let page = "\"user\":{\"id\":\n\"_1_1\"}";
        let result = extract_embedded_json::<AccountDetails>(page, "\"user\":");
        assert!(matches!(result, Err(Error::Parse(_))));
    }

    #[test]
    fn display_name_falls_back_to_user_name() -> anyhow::Result<()> {
        let details: AccountDetails =
            extract_embedded_json("\"user\": {\"id\":\"_9_1\",\"userName\":\"u9\"};", "\"user\":")?;
        assert_eq!(details.display_name(), "u9");
        Ok(())
    }
}
