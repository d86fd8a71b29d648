//! Incident stream reconciliation for the fall-detection monitoring console.
//!
//! A view merges a point-in-time snapshot of incidents from the REST backend
//! with the unbounded push channel of newly detected ones into a single
//! bounded, deduplicated, recency-ordered collection, and derives the
//! presentation state (severity tier, acknowledgement status, transient
//! "new" highlight) for each row.

pub mod ingest;
pub mod model;
pub mod prelude;
pub mod reconcile;
pub mod telemetry;
pub mod view;

pub use model::{IncidentId, IncidentRecord, IncidentStatus, SeverityTier};
pub use prelude::{ParseError, TransportError, ViewConfig};
pub use reconcile::{IncidentFilters, Reconciler};
pub use view::{IncidentRow, IncidentView};
