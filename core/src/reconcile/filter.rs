use crate::model::time::deserialize_optional_instant;
use crate::model::{derive_status, CameraId, IncidentRecord, IncidentStatus};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// View filters. Every unset criterion matches everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncidentFilters {
    #[serde(deserialize_with = "deserialize_optional_instant")]
    pub from: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "deserialize_optional_instant")]
    pub to: Option<DateTime<Utc>>,
    pub camera_id: Option<CameraId>,
    pub status: Option<IncidentStatus>,
}

impl IncidentFilters {
    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.to.is_none() && self.camera_id.is_none() && self.status.is_none()
    }

    /// Query parameters understood by the snapshot endpoint.
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(from) = self.from {
            query.push(("from", from.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        if let Some(to) = self.to {
            query.push(("to", to.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        if let Some(camera_id) = &self.camera_id {
            query.push(("cameraId", camera_id.to_string()));
        }
        if let Some(status) = self.status {
            query.push(("status", status.as_str().to_string()));
        }
        query
    }
}

/// Conjunction of the active criteria; time bounds are inclusive.
pub fn matches(record: &IncidentRecord, filters: &IncidentFilters) -> bool {
    if let Some(from) = filters.from {
        if record.detected_at < from {
            return false;
        }
    }
    if let Some(to) = filters.to {
        if record.detected_at > to {
            return false;
        }
    }
    if let Some(camera_id) = &filters.camera_id {
        if record.camera_id.as_ref() != Some(camera_id) {
            return false;
        }
    }
    if let Some(status) = filters.status {
        if derive_status(record) != status {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{parse_instant, RecordId};

    fn record_at(raw: &str) -> IncidentRecord {
        IncidentRecord::new(RecordId::Int(1), parse_instant(raw).unwrap()).with_camera(3)
    }

    #[test]
    fn empty_filters_match_everything() {
        let filters = IncidentFilters::default();
        assert!(filters.is_empty());
        assert!(matches(&record_at("2024-05-01T08:00:00Z"), &filters));
    }

    #[test]
    fn time_bounds_are_inclusive() {
        let filters = IncidentFilters {
            from: Some(parse_instant("2024-05-01T08:00:00Z").unwrap()),
            to: Some(parse_instant("2024-05-01T09:00:00Z").unwrap()),
            ..Default::default()
        };
        assert!(matches(&record_at("2024-05-01T08:00:00Z"), &filters));
        assert!(matches(&record_at("2024-05-01T09:00:00Z"), &filters));
        assert!(!matches(&record_at("2024-05-01T09:00:01Z"), &filters));
        assert!(!matches(&record_at("2024-05-01T07:59:59Z"), &filters));
    }

    #[test]
    fn bounds_compare_instants_not_strings() {
        // 15:00+07:00 is 08:00Z.
        let filters = IncidentFilters {
            to: Some(parse_instant("2024-05-01T15:00:00+07:00").unwrap()),
            ..Default::default()
        };
        assert!(matches(&record_at("2024-05-01T08:00:00"), &filters));
        assert!(!matches(&record_at("2024-05-01T08:00:01"), &filters));
    }

    #[test]
    fn criteria_combine_conjunctively() {
        let filters = IncidentFilters {
            camera_id: Some(RecordId::from("3")),
            status: Some(IncidentStatus::New),
            ..Default::default()
        };
        let record = record_at("2024-05-01T08:00:00Z");
        assert!(matches(&record, &filters));
        assert!(!matches(&record.clone().acked_by("bob"), &filters));
        assert!(!matches(&record.with_camera(4), &filters));
    }

    #[test]
    fn quoted_camera_filter_matches_integer_camera() {
        let filters: IncidentFilters =
            serde_json::from_str(r#"{"camera_id": "3", "status": "ack"}"#).unwrap();
        assert_eq!(filters.camera_id, Some(RecordId::Int(3)));
        let record = record_at("2024-05-01T08:00:00Z").acked_by("eve");
        assert!(matches(&record, &filters));
    }

    #[test]
    fn unknown_camera_fails_camera_filter() {
        let mut record = record_at("2024-05-01T08:00:00Z");
        record.camera_id = None;
        let filters = IncidentFilters {
            camera_id: Some(RecordId::Int(3)),
            ..Default::default()
        };
        assert!(!matches(&record, &filters));
    }

    #[test]
    fn query_uses_backend_parameter_names() {
        let filters = IncidentFilters {
            from: Some(parse_instant("2024-05-01T08:00").unwrap()),
            camera_id: Some(RecordId::Int(2)),
            status: Some(IncidentStatus::Acknowledged),
            ..Default::default()
        };
        assert_eq!(
            filters.to_query(),
            vec![
                ("from", "2024-05-01T08:00:00Z".to_string()),
                ("cameraId", "2".to_string()),
                ("status", "acknowledged".to_string()),
            ]
        );
    }

    #[test]
    fn filters_deserialize_from_form_values() {
        let filters: IncidentFilters =
            serde_json::from_str(r#"{"from": "2024-05-01T08:00", "to": "", "status": "ack"}"#)
                .unwrap();
        assert!(filters.from.is_some());
        assert!(filters.to.is_none());
        assert_eq!(filters.status, Some(IncidentStatus::Acknowledged));
    }
}
