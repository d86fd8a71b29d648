use crate::model::IncidentId;
use crate::prelude::HighlightConfig;
use std::collections::HashMap;
use tokio::time::Instant;

/// Tracks which incidents should render as "just arrived".
///
/// Expiry is an explicit deadline per id, checked lazily on read and removed
/// by `sweep`; there are no timer callbacks to leak when the view goes away.
#[derive(Debug)]
pub struct HighlightTracker {
    config: HighlightConfig,
    deadlines: HashMap<IncidentId, Instant>,
}

impl HighlightTracker {
    pub fn new(config: HighlightConfig) -> Self {
        Self {
            config,
            deadlines: HashMap::new(),
        }
    }

    pub fn mark_new(&mut self, id: IncidentId) {
        self.mark_new_at(id, Instant::now());
    }

    /// A repeated mark moves the deadline instead of stacking another one.
    pub fn mark_new_at(&mut self, id: IncidentId, now: Instant) {
        self.deadlines.insert(id, now + self.config.delay);
    }

    pub fn is_new(&self, id: &IncidentId) -> bool {
        self.is_new_at(id, Instant::now())
    }

    pub fn is_new_at(&self, id: &IncidentId, now: Instant) -> bool {
        self.deadlines
            .get(id)
            .is_some_and(|deadline| now < *deadline)
    }

    /// Drops expired markers and returns how many went.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let before = self.deadlines.len();
        self.deadlines.retain(|_, deadline| now < *deadline);
        before - self.deadlines.len()
    }

    pub fn forget(&mut self, id: &IncidentId) {
        self.deadlines.remove(id);
    }

    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }

    pub fn clear(&mut self) {
        self.deadlines.clear();
    }
}
