use crate::model::id::{CameraId, IncidentId, RecordId};
use crate::model::severity::{self, classify, SeverityTier};
use crate::model::time::deserialize_instant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One detected fall event, as listed by the snapshot endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentRecord {
    pub id: IncidentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<RecordId>,
    #[serde(default)]
    pub camera_id: Option<CameraId>,
    #[serde(rename = "ts", deserialize_with = "deserialize_instant")]
    pub detected_at: DateTime<Utc>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default, deserialize_with = "severity::deserialize_lenient")]
    pub severity: Option<SeverityTier>,
    #[serde(rename = "ack", default)]
    pub acknowledged: bool,
    #[serde(rename = "ack_by", default)]
    pub acknowledged_by: Option<String>,
    #[serde(default)]
    pub snapshot_path: Option<String>,
    #[serde(default)]
    pub clip_path: Option<String>,
}

impl IncidentRecord {
    pub fn new(id: IncidentId, detected_at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: None,
            camera_id: None,
            detected_at,
            confidence: None,
            severity: None,
            acknowledged: false,
            acknowledged_by: None,
            snapshot_path: None,
            clip_path: None,
        }
    }

    pub fn with_camera(mut self, camera_id: impl Into<CameraId>) -> Self {
        self.camera_id = Some(camera_id.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn acked_by(mut self, actor: impl Into<String>) -> Self {
        self.acknowledged = true;
        self.acknowledged_by = Some(actor.into());
        self
    }

    /// Confidence with a missing score read as 0.
    pub fn confidence_score(&self) -> f64 {
        self.confidence.unwrap_or(0.0)
    }

    /// Precomputed tier when the source supplied one, otherwise derived from confidence.
    pub fn severity_tier(&self) -> SeverityTier {
        self.severity
            .unwrap_or_else(|| classify(self.confidence_score()))
    }

    /// Drops an actor that came without an acknowledgement.
    pub(crate) fn normalized(mut self) -> Self {
        if !self.acknowledged {
            self.acknowledged_by = None;
        }
        self
    }

    /// Takes every field `incoming` provides, keeping ours where it is silent.
    /// Acknowledgement is left to the caller.
    pub(crate) fn overlay(&mut self, incoming: &IncidentRecord) {
        self.detected_at = incoming.detected_at;
        overlay_field(&mut self.user_id, &incoming.user_id);
        overlay_field(&mut self.camera_id, &incoming.camera_id);
        overlay_field(&mut self.confidence, &incoming.confidence);
        overlay_field(&mut self.severity, &incoming.severity);
        overlay_field(&mut self.snapshot_path, &incoming.snapshot_path);
        overlay_field(&mut self.clip_path, &incoming.clip_path);
    }
}

fn overlay_field<T: Clone>(target: &mut Option<T>, incoming: &Option<T>) {
    if incoming.is_some() {
        target.clone_from(incoming);
    }
}
