use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset, Local, Utc};
use serde::{Deserialize, Deserializer};

/// Parse an ISO-8601 timestamp; a trailing `Z` means UTC.
pub fn parse_utc(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Parse(format!("invalid timestamp {s:?}: {e}")))
}

pub(crate) fn deserialize_utc<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_utc(&raw).map_err(serde::de::Error::custom)
}

/// Shift a UTC instant into the local zone.
///
/// The offset is taken from the current wall clock, not from `utc`'s own date, so an
/// instant on the other side of a daylight saving change comes out one hour off.
pub fn to_local(utc: DateTime<Utc>) -> DateTime<FixedOffset> {
    let offset = *Local::now().offset();
    utc.with_timezone(&offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn zulu_suffix_is_utc() -> anyhow::Result<()> {
        let parsed = parse_utc("2024-01-01T10:00:00Z")?;
        let expected = DateTime::parse_from_rfc3339("2024-01-01T10:00:00+00:00")?;
        assert_eq!(parsed, expected);
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());
        Ok(())
    }

    #[test]
    fn explicit_offsets_are_normalized() -> anyhow::Result<()> {
        let parsed = parse_utc("2024-01-01T15:30:00+05:30")?;
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());
        Ok(())
    }

    #[test]
    fn fractional_seconds_are_accepted() -> anyhow::Result<()> {
        let parsed = parse_utc("2024-01-01T10:00:00.000Z")?;
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());
        Ok(())
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(parse_utc("next tuesday"), Err(Error::Parse(_))));
    }

    #[test]
    fn local_time_is_the_same_instant() {
        let utc = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let local = to_local(utc);
        assert_eq!(local, utc);
        assert_eq!(local.offset(), Local::now().offset());
    }
}
