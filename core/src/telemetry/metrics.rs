use std::sync::Mutex;

pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub live_ingested: usize,
    pub snapshots_applied: usize,
    pub snapshot_failures: usize,
    pub discarded: usize,
    pub evicted: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    pub fn record_live(&self) {
        self.update(|metrics| metrics.live_ingested += 1);
    }

    pub fn record_snapshot(&self) {
        self.update(|metrics| metrics.snapshots_applied += 1);
    }

    pub fn record_snapshot_failure(&self) {
        self.update(|metrics| metrics.snapshot_failures += 1);
    }

    pub fn record_discarded(&self) {
        self.update(|metrics| metrics.discarded += 1);
    }

    pub fn record_evicted(&self, count: usize) {
        self.update(|metrics| metrics.evicted += count);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            *metrics
        } else {
            MetricsSnapshot::default()
        }
    }

    fn update(&self, apply: impl FnOnce(&mut MetricsSnapshot)) {
        if let Ok(mut metrics) = self.inner.lock() {
            apply(&mut metrics);
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = MetricsRecorder::new();
        metrics.record_live();
        metrics.record_live();
        metrics.record_evicted(3);
        metrics.record_discarded();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.live_ingested, 2);
        assert_eq!(snapshot.evicted, 3);
        assert_eq!(snapshot.discarded, 1);
        assert_eq!(snapshot.snapshot_failures, 0);
    }
}
