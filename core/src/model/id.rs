use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Opaque identifier assigned by the backing store: integer or string.
///
/// Decoding goes through `FromStr`, so `"5"` on the wire is the same id as `5`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

pub type IncidentId = RecordId;
pub type CameraId = RecordId;

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(value) => write!(f, "{}", value),
            RecordId::Text(value) => f.write_str(value),
        }
    }
}

impl FromStr for RecordId {
    type Err = Infallible;

    /// Digit-only input becomes the integer form so that `"3"` and `3` compare equal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Ok(trimmed
            .parse::<i64>()
            .map(RecordId::Int)
            .unwrap_or_else(|_| RecordId::Text(trimmed.to_string())))
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(RecordIdVisitor)
    }
}

struct RecordIdVisitor;

impl<'de> Visitor<'de> for RecordIdVisitor {
    type Value = RecordId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an integer or string id")
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<RecordId, E> {
        Ok(RecordId::Int(value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<RecordId, E> {
        i64::try_from(value)
            .map(RecordId::Int)
            .map_err(|_| E::custom(format!("id {value} out of range")))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<RecordId, E> {
        Ok(RecordId::from(value))
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        RecordId::Int(value)
    }
}

impl From<i32> for RecordId {
    fn from(value: i32) -> Self {
        RecordId::Int(i64::from(value))
    }
}

impl From<u32> for RecordId {
    fn from(value: u32) -> Self {
        RecordId::Int(i64::from(value))
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        match value.parse() {
            Ok(id) => id,
            Err(never) => match never {},
        }
    }
}
