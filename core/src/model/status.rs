use crate::model::incident::IncidentRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
    New,
    #[serde(alias = "ack")]
    Acknowledged,
}

pub fn derive_status(record: &IncidentRecord) -> IncidentStatus {
    if record.acknowledged {
        IncidentStatus::Acknowledged
    } else {
        IncidentStatus::New
    }
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::New => "new",
            IncidentStatus::Acknowledged => "acknowledged",
        }
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IncidentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(IncidentStatus::New),
            "ack" | "acknowledged" => Ok(IncidentStatus::Acknowledged),
            other => Err(format!("unknown status {other:?}")),
        }
    }
}
