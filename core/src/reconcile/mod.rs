pub mod filter;
pub mod highlight;
pub mod reconciler;

pub use filter::{matches, IncidentFilters};
pub use highlight::HighlightTracker;
pub use reconciler::{IngestReport, Provenance, Reconciler};
