//! Bounded, deduplicated incident collection fed by both the snapshot loader
//! and the live stream.
//!
//! Each entry keeps the two representations separately and materialises the
//! visible record from them, so the visible state of an id does not depend on
//! whether the snapshot or the live observation arrived first. Live fields win
//! over snapshot fields wherever the live side provides them. Acknowledgement
//! is latched: once any observation reported it, it stays set.

use crate::model::{IncidentId, IncidentRecord};
use crate::prelude::ReconcilerConfig;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Which path an observation came through. Live ranks above snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Provenance {
    Snapshot,
    Live,
}

#[derive(Debug, Clone, PartialEq)]
struct Acknowledgement {
    by: Option<String>,
    source: Provenance,
}

#[derive(Debug, Clone)]
struct Entry {
    snapshot: Option<IncidentRecord>,
    live: Option<IncidentRecord>,
    ack: Option<Acknowledgement>,
    arrival: u64,
    visible: IncidentRecord,
}

impl Entry {
    fn observe(record: IncidentRecord, source: Provenance, arrival: u64) -> Self {
        let mut entry = Self {
            snapshot: None,
            live: None,
            ack: None,
            arrival,
            visible: record.clone(),
        };
        entry.absorb(record, source);
        entry
    }

    fn absorb(&mut self, record: IncidentRecord, source: Provenance) {
        if record.acknowledged {
            let replaces = self
                .ack
                .as_ref()
                .map_or(true, |current| source >= current.source);
            if replaces {
                self.ack = Some(Acknowledgement {
                    by: record.acknowledged_by.clone(),
                    source,
                });
            }
        }
        match source {
            Provenance::Snapshot => self.snapshot = Some(record),
            Provenance::Live => match self.live.as_mut() {
                Some(live) => live.overlay(&record),
                None => self.live = Some(record),
            },
        }
        self.materialise();
    }

    fn materialise(&mut self) {
        let mut visible = match (&self.snapshot, &self.live) {
            (Some(snapshot), Some(live)) => {
                let mut merged = snapshot.clone();
                merged.overlay(live);
                merged
            }
            (Some(only), None) | (None, Some(only)) => only.clone(),
            (None, None) => return,
        };
        visible.acknowledged = self.ack.is_some();
        visible.acknowledged_by = self.ack.as_ref().and_then(|ack| ack.by.clone());
        self.visible = visible;
    }

    fn provenance(&self) -> Provenance {
        if self.live.is_some() {
            Provenance::Live
        } else {
            Provenance::Snapshot
        }
    }

    fn sort_key(&self) -> (DateTime<Utc>, Provenance, u64) {
        (self.visible.detected_at, self.provenance(), self.arrival)
    }
}

/// What one ingest call did to the collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    pub inserted: usize,
    pub merged: usize,
    /// Snapshot-only entries that a newer snapshot no longer lists.
    pub superseded: usize,
    /// Ids pushed out by the capacity bound.
    pub evicted: Vec<IncidentId>,
}

impl IngestReport {
    pub fn retained(&self, id: &IncidentId) -> bool {
        !self.evicted.contains(id)
    }
}

/// Ordered most-recent first: later `detected_at`, then live over snapshot,
/// then later arrival.
pub struct Reconciler {
    config: ReconcilerConfig,
    entries: Vec<Entry>,
    index: HashMap<IncidentId, usize>,
    next_arrival: u64,
}

impl Reconciler {
    pub fn new(config: ReconcilerConfig) -> Self {
        Self {
            config,
            entries: Vec::with_capacity(config.capacity),
            index: HashMap::with_capacity(config.capacity),
            next_arrival: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(ReconcilerConfig {
            capacity: capacity.max(1),
        })
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replaces the snapshot-derived members. Entries that have a live
    /// observation are kept even when the snapshot does not list them, and
    /// relisted entries keep their acknowledgement.
    pub fn ingest_snapshot(&mut self, records: Vec<IncidentRecord>) -> IngestReport {
        let mut report = IngestReport::default();

        let listed: HashSet<IncidentId> = records.iter().map(|r| r.id.clone()).collect();
        let before = self.entries.len();
        self.entries
            .retain(|entry| entry.live.is_some() || listed.contains(&entry.visible.id));
        report.superseded = before - self.entries.len();
        self.reindex();

        // The first listed record gets the latest arrival so it wins timestamp ties.
        let batch = records.len() as u64;
        let base = self.next_arrival;
        self.next_arrival += batch;
        for (position, record) in records.into_iter().enumerate() {
            let arrival = base + (batch - 1 - position as u64);
            let record = record.normalized();
            match self.index.get(&record.id).copied() {
                Some(slot) => {
                    let entry = &mut self.entries[slot];
                    if entry.live.is_none() {
                        entry.arrival = arrival;
                    }
                    entry.absorb(record, Provenance::Snapshot);
                    report.merged += 1;
                }
                None => {
                    self.index.insert(record.id.clone(), self.entries.len());
                    self.entries
                        .push(Entry::observe(record, Provenance::Snapshot, arrival));
                    report.inserted += 1;
                }
            }
        }

        report.evicted = self.settle();
        report
    }

    /// Idempotent upsert of one live observation.
    pub fn ingest_live(&mut self, record: IncidentRecord) -> IngestReport {
        let mut report = IngestReport::default();
        let record = record.normalized();
        match self.index.get(&record.id).copied() {
            Some(slot) => {
                let arrival = self.next_arrival;
                let entry = &mut self.entries[slot];
                if entry.live.is_none() {
                    entry.arrival = arrival;
                    self.next_arrival += 1;
                }
                entry.absorb(record, Provenance::Live);
                report.merged = 1;
            }
            None => {
                let arrival = self.next_arrival;
                self.next_arrival += 1;
                self.index.insert(record.id.clone(), self.entries.len());
                self.entries
                    .push(Entry::observe(record, Provenance::Live, arrival));
                report.inserted = 1;
            }
        }
        report.evicted = self.settle();
        report
    }

    pub fn get(&self, id: &IncidentId) -> Option<&IncidentRecord> {
        self.index.get(id).map(|&slot| &self.entries[slot].visible)
    }

    pub fn contains(&self, id: &IncidentId) -> bool {
        self.index.contains_key(id)
    }

    pub fn provenance(&self, id: &IncidentId) -> Option<Provenance> {
        self.index.get(id).map(|&slot| self.entries[slot].provenance())
    }

    /// Visible records, most recent first.
    pub fn records(&self) -> impl Iterator<Item = &IncidentRecord> {
        self.entries.iter().map(|entry| &entry.visible)
    }

    pub fn snapshot(&self) -> Vec<IncidentRecord> {
        self.records().cloned().collect()
    }

    /// Restores ordering and the capacity bound, returning evicted ids.
    fn settle(&mut self) -> Vec<IncidentId> {
        self.entries
            .sort_by(|a, b| compare_recent_first(a.sort_key(), b.sort_key()));
        let evicted = if self.entries.len() > self.config.capacity {
            self.entries
                .drain(self.config.capacity..)
                .map(|entry| entry.visible.id)
                .collect()
        } else {
            Vec::new()
        };
        self.reindex();
        evicted
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (slot, entry) in self.entries.iter().enumerate() {
            self.index.insert(entry.visible.id.clone(), slot);
        }
    }
}

fn compare_recent_first(
    a: (DateTime<Utc>, Provenance, u64),
    b: (DateTime<Utc>, Provenance, u64),
) -> Ordering {
    b.cmp(&a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{derive_status, IncidentStatus, RecordId, SeverityTier};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    fn incident(id: i64, offset_secs: i64) -> IncidentRecord {
        IncidentRecord::new(RecordId::Int(id), t0() + Duration::seconds(offset_secs))
    }

    fn ids(reconciler: &Reconciler) -> Vec<RecordId> {
        reconciler.records().map(|r| r.id.clone()).collect()
    }

    fn assert_ordered(reconciler: &Reconciler) {
        let records = reconciler.snapshot();
        for pair in records.windows(2) {
            assert!(pair[0].detected_at >= pair[1].detected_at);
        }
    }

    #[test]
    fn quoted_live_id_merges_with_integer_snapshot_id() {
        let snapshot = crate::ingest::snapshot::decode_snapshot(
            br#"[{"id": 5, "camera_id": 1, "ts": "2024-05-01T08:00:00Z", "confidence": 0.5, "ack": false}]"#,
        )
        .unwrap();
        let live = match crate::ingest::stream::parse_message(
            r#"{"type": "fall_event", "event_id": "5", "camera_id": "1", "ts": "2024-05-01T08:00:00Z", "confidence": 0.7}"#,
        )
        .unwrap()
        {
            crate::ingest::ChannelMessage::FallEvent(event) => event.into_record(),
            crate::ingest::ChannelMessage::Other => panic!("expected a fall event"),
        };

        let mut reconciler = Reconciler::with_capacity(200);
        reconciler.ingest_snapshot(snapshot);
        let report = reconciler.ingest_live(live);

        assert_eq!(report.merged, 1);
        assert_eq!(reconciler.len(), 1);
        let merged = reconciler.get(&RecordId::Int(5)).unwrap();
        assert_eq!(merged.confidence, Some(0.7));
        assert_eq!(merged.camera_id, Some(RecordId::Int(1)));
    }

    #[test]
    fn live_without_ack_keeps_snapshot_unacknowledged() {
        let mut reconciler = Reconciler::with_capacity(200);
        reconciler.ingest_snapshot(vec![incident(1, 0).with_confidence(0.9)]);
        reconciler.ingest_live(incident(1, 0).with_confidence(0.9));

        let merged = reconciler.get(&RecordId::Int(1)).unwrap();
        assert!(!merged.acknowledged);
        assert_eq!(merged.severity_tier(), SeverityTier::Critical);
        assert_eq!(reconciler.len(), 1);
    }

    #[test]
    fn late_stale_snapshot_cannot_clear_acknowledgement() {
        let mut reconciler = Reconciler::with_capacity(200);
        reconciler.ingest_live(incident(5, 0).with_confidence(0.6));
        reconciler.ingest_live(incident(5, 0).acked_by("alice"));
        reconciler.ingest_snapshot(vec![incident(5, 0)]);

        let merged = reconciler.get(&RecordId::Int(5)).unwrap();
        assert!(merged.acknowledged);
        assert_eq!(merged.acknowledged_by.as_deref(), Some("alice"));
        assert_eq!(merged.confidence, Some(0.6));
    }

    #[test]
    fn unacknowledged_live_cannot_clear_snapshot_acknowledgement() {
        let mut reconciler = Reconciler::with_capacity(10);
        reconciler.ingest_snapshot(vec![incident(2, 0).acked_by("bob")]);
        reconciler.ingest_live(incident(2, 0));
        let merged = reconciler.get(&RecordId::Int(2)).unwrap();
        assert_eq!(derive_status(merged), IncidentStatus::Acknowledged);
        assert_eq!(merged.acknowledged_by.as_deref(), Some("bob"));
    }

    #[test]
    fn evicts_the_oldest_past_capacity() {
        let mut reconciler = Reconciler::with_capacity(200);
        for id in 0..201 {
            let report = reconciler.ingest_live(incident(id, id));
            assert!(reconciler.len() <= 200);
            if id == 200 {
                assert_eq!(report.evicted, vec![RecordId::Int(0)]);
            }
        }
        assert_eq!(reconciler.len(), 200);
        assert!(!reconciler.contains(&RecordId::Int(0)));
        assert_eq!(ids(&reconciler)[0], RecordId::Int(200));
        assert_ordered(&reconciler);
    }

    #[test]
    fn same_timestamp_orders_by_arrival() {
        let mut reconciler = Reconciler::with_capacity(3);
        for id in 0..4 {
            reconciler.ingest_live(incident(id, 0));
        }
        assert_eq!(
            ids(&reconciler),
            vec![RecordId::Int(3), RecordId::Int(2), RecordId::Int(1)]
        );
    }

    #[test]
    fn live_outranks_snapshot_on_equal_timestamp() {
        let mut reconciler = Reconciler::with_capacity(10);
        reconciler.ingest_live(incident(1, 0));
        reconciler.ingest_snapshot(vec![incident(2, 0), incident(3, 0)]);
        assert_eq!(
            ids(&reconciler),
            vec![RecordId::Int(1), RecordId::Int(2), RecordId::Int(3)]
        );
    }

    #[test]
    fn out_of_order_live_record_is_placed_by_detection_time() {
        let mut reconciler = Reconciler::with_capacity(10);
        reconciler.ingest_live(incident(1, 10));
        reconciler.ingest_live(incident(2, 30));
        reconciler.ingest_live(incident(3, 20));
        assert_eq!(
            ids(&reconciler),
            vec![RecordId::Int(2), RecordId::Int(3), RecordId::Int(1)]
        );
    }

    #[test]
    fn live_ingest_is_idempotent() {
        let mut once = Reconciler::with_capacity(10);
        let mut twice = Reconciler::with_capacity(10);
        once.ingest_snapshot(vec![incident(1, 5), incident(2, 0)]);
        twice.ingest_snapshot(vec![incident(1, 5), incident(2, 0)]);

        let record = incident(3, 2).with_camera(4).with_confidence(0.7);
        once.ingest_live(record.clone());
        twice.ingest_live(record.clone());
        let report = twice.ingest_live(record);

        assert_eq!(report.merged, 1);
        assert_eq!(once.snapshot(), twice.snapshot());
    }

    #[test]
    fn snapshot_and_live_commute_per_id() {
        let mut snap = incident(9, 0).with_camera(1).with_confidence(0.5);
        snap.snapshot_path = Some("snap_9.jpg".into());
        let live = incident(9, 0).with_confidence(0.8).acked_by("carol");

        let mut snapshot_first = Reconciler::with_capacity(10);
        snapshot_first.ingest_snapshot(vec![snap.clone()]);
        snapshot_first.ingest_live(live.clone());

        let mut live_first = Reconciler::with_capacity(10);
        live_first.ingest_live(live);
        live_first.ingest_snapshot(vec![snap]);

        let a = snapshot_first.get(&RecordId::Int(9)).unwrap();
        let b = live_first.get(&RecordId::Int(9)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.confidence, Some(0.8));
        assert_eq!(a.camera_id, Some(RecordId::Int(1)));
        assert_eq!(a.snapshot_path.as_deref(), Some("snap_9.jpg"));
        assert_eq!(a.acknowledged_by.as_deref(), Some("carol"));
    }

    #[test]
    fn conflicting_actors_resolve_towards_live() {
        let snap = incident(4, 0).acked_by("from-snapshot");
        let live = incident(4, 0).acked_by("from-live");

        let mut a = Reconciler::with_capacity(4);
        a.ingest_snapshot(vec![snap.clone()]);
        a.ingest_live(live.clone());

        let mut b = Reconciler::with_capacity(4);
        b.ingest_live(live);
        b.ingest_snapshot(vec![snap]);

        assert_eq!(a.get(&RecordId::Int(4)), b.get(&RecordId::Int(4)));
        assert_eq!(
            a.get(&RecordId::Int(4)).and_then(|r| r.acknowledged_by.clone()),
            Some("from-live".into())
        );
    }

    #[test]
    fn reload_keeps_live_records_and_drops_unlisted_snapshot_rows() {
        let mut reconciler = Reconciler::with_capacity(10);
        reconciler.ingest_snapshot(vec![incident(1, 0), incident(2, -5)]);
        reconciler.ingest_live(incident(3, 10));

        let report = reconciler.ingest_snapshot(vec![incident(1, 0)]);
        assert_eq!(report.superseded, 1);
        assert!(reconciler.contains(&RecordId::Int(3)));
        assert!(reconciler.contains(&RecordId::Int(1)));
        assert!(!reconciler.contains(&RecordId::Int(2)));
        assert_eq!(reconciler.provenance(&RecordId::Int(3)), Some(Provenance::Live));
    }

    #[test]
    fn relisted_snapshot_row_keeps_acknowledgement() {
        let mut reconciler = Reconciler::with_capacity(10);
        reconciler.ingest_snapshot(vec![incident(7, 0).acked_by("dave")]);
        reconciler.ingest_snapshot(vec![incident(7, 0)]);
        let merged = reconciler.get(&RecordId::Int(7)).unwrap();
        assert!(merged.acknowledged);
        assert_eq!(merged.acknowledged_by.as_deref(), Some("dave"));
    }

    #[test]
    fn snapshot_larger_than_capacity_is_truncated() {
        let mut reconciler = Reconciler::with_capacity(3);
        let rows = (0..5).rev().map(|id| incident(id, id)).collect();
        let report = reconciler.ingest_snapshot(rows);
        assert_eq!(reconciler.len(), 3);
        assert_eq!(report.evicted, vec![RecordId::Int(1), RecordId::Int(0)]);
    }

    #[test]
    fn actor_without_acknowledgement_is_dropped() {
        let mut reconciler = Reconciler::with_capacity(3);
        let mut record = incident(1, 0);
        record.acknowledged_by = Some("ghost".into());
        reconciler.ingest_live(record);
        assert_eq!(reconciler.get(&RecordId::Int(1)).unwrap().acknowledged_by, None);
    }
}
