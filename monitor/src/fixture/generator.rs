use chrono::{DateTime, Duration, Utc};
use incidentcore::model::{classify, RecordId};
use incidentcore::IncidentRecord;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Configuration for generating synthetic fall incidents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureConfig {
    pub seed: u64,
    pub cameras: u32,
    pub history: usize,
    pub interval_ms: u64,
    pub ack_ratio: f64,
    pub noise_ratio: f64,
    pub token: Option<String>,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            cameras: 4,
            history: 40,
            interval_ms: 3000,
            ack_ratio: 0.3,
            noise_ratio: 0.2,
            token: None,
        }
    }
}

impl FixtureConfig {
    fn normalized_cameras(&self) -> u32 {
        self.cameras.max(1)
    }
}

/// Seeded source of incident rows and channel frames. Ids only ever grow.
pub struct IncidentGenerator {
    config: FixtureConfig,
    rng: StdRng,
    next_id: i64,
}

impl IncidentGenerator {
    pub fn new(config: FixtureConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            rng,
            next_id: 1,
        }
    }

    /// Past incidents ending at `now`, most recent first.
    pub fn history(&mut self, now: DateTime<Utc>) -> Vec<IncidentRecord> {
        let count = self.config.history;
        let mut rows: Vec<IncidentRecord> = (0..count)
            .map(|step| {
                let age = Duration::seconds(90 * (count - step) as i64);
                let mut record = self.incident(now - age);
                if self.rng.gen_bool(self.config.ack_ratio.clamp(0.0, 1.0)) {
                    record = record.acked_by("operator");
                }
                record
            })
            .collect();
        rows.reverse();
        rows
    }

    pub fn incident(&mut self, detected_at: DateTime<Utc>) -> IncidentRecord {
        let id = self.next_id;
        self.next_id += 1;
        let camera = self.rng.gen_range(1..=self.config.normalized_cameras());
        let confidence: f64 = self.rng.gen_range(0.3..1.0);
        let mut record = IncidentRecord::new(RecordId::Int(id), detected_at)
            .with_camera(i64::from(camera))
            .with_confidence((confidence * 1000.0).round() / 1000.0);
        record.severity = Some(classify(confidence));
        record.snapshot_path = Some(format!("event_{id}.jpg"));
        record.clip_path = Some(format!("event_{id}.mp4"));
        record
    }

    pub fn roll_noise(&mut self) -> bool {
        self.rng.gen_bool(self.config.noise_ratio.clamp(0.0, 1.0))
    }

    /// A frame the console must ignore: another message kind or broken JSON.
    pub fn noise_frame(&mut self) -> String {
        if self.rng.gen_bool(0.5) {
            json!({
                "type": "camera_status",
                "camera_id": self.rng.gen_range(1..=self.config.normalized_cameras()),
                "online": true,
            })
            .to_string()
        } else {
            "{\"type\": \"fall_event\", \"event_id\": ".to_string()
        }
    }
}

/// Channel notification in the backend's `fall_event` shape.
pub fn fall_event_frame(record: &IncidentRecord) -> String {
    json!({
        "type": "fall_event",
        "event_id": record.id,
        "user_id": record.user_id,
        "camera_id": record.camera_id,
        "ts": record.detected_at.to_rfc3339(),
        "confidence": record.confidence,
        "severity": record.severity,
        "status": if record.acknowledged { "acknowledged" } else { "new" },
        "snapshot_url": record.snapshot_path.as_ref().map(|path| format!("/clips/{path}")),
        "clip_url": record.clip_path.as_ref().map(|path| format!("/clips/{path}")),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use incidentcore::ingest::stream::{parse_message, ChannelMessage};

    #[test]
    fn history_is_most_recent_first_with_unique_ids() {
        let now = Utc::now();
        let mut generator = IncidentGenerator::new(FixtureConfig {
            history: 10,
            ..Default::default()
        });
        let rows = generator.history(now);
        assert_eq!(rows.len(), 10);
        for pair in rows.windows(2) {
            assert!(pair[0].detected_at > pair[1].detected_at);
            assert_ne!(pair[0].id, pair[1].id);
        }
        assert!(rows.iter().all(|row| row.detected_at < now));
    }

    #[test]
    fn same_seed_replays_the_same_scores() {
        let now = Utc::now();
        let config = FixtureConfig {
            seed: 13,
            history: 5,
            ..Default::default()
        };
        let a = IncidentGenerator::new(config.clone()).history(now);
        let b = IncidentGenerator::new(config).history(now);
        let scores = |rows: &[IncidentRecord]| rows.iter().map(|r| r.confidence).collect::<Vec<_>>();
        assert_eq!(scores(&a), scores(&b));
    }

    #[test]
    fn frames_parse_as_fall_events() {
        let mut generator = IncidentGenerator::new(FixtureConfig::default());
        let record = generator.incident(Utc::now());
        match parse_message(&fall_event_frame(&record)).unwrap() {
            ChannelMessage::FallEvent(event) => {
                let parsed = event.into_record();
                assert_eq!(parsed.id, record.id);
                assert_eq!(parsed.severity, record.severity);
            }
            ChannelMessage::Other => panic!("expected a fall event"),
        }
    }

    #[test]
    fn noise_frames_never_parse_as_incidents() {
        let mut generator = IncidentGenerator::new(FixtureConfig {
            seed: 7,
            ..Default::default()
        });
        for _ in 0..20 {
            let frame = generator.noise_frame();
            assert!(!matches!(parse_message(&frame), Ok(ChannelMessage::FallEvent(_))));
        }
    }
}
