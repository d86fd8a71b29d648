use crate::prelude::ParseError;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parses a detection timestamp into its canonical instant.
///
/// Representations without an offset are taken as UTC. The backend emits
/// naive timestamps from some code paths, so this cannot be tightened
/// without breaking older records.
pub fn parse_instant(raw: &str) -> Result<DateTime<Utc>, ParseError> {
    let value = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ParseError::Timestamp(raw.to_string()))
}

pub(crate) fn deserialize_instant<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_instant(&raw).map_err(serde::de::Error::custom)
}

pub(crate) fn deserialize_optional_instant<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => parse_instant(&raw)
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn offset_less_values_are_utc() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
        assert_eq!(parse_instant("2024-05-01T08:30:00").unwrap(), expected);
        assert_eq!(parse_instant("2024-05-01 08:30:00").unwrap(), expected);
        assert_eq!(parse_instant("2024-05-01T08:30").unwrap(), expected);
    }

    #[test]
    fn offsets_are_normalised() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 1, 30, 0).unwrap();
        assert_eq!(parse_instant("2024-05-01T08:30:00+07:00").unwrap(), expected);
        assert_eq!(parse_instant("2024-05-01T01:30:00Z").unwrap(), expected);
    }

    #[test]
    fn fractional_seconds_survive() {
        let parsed = parse_instant("2024-05-01T08:30:00.250").unwrap();
        assert_eq!(parsed.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            parse_instant("yesterday"),
            Err(ParseError::Timestamp(_))
        ));
    }
}
