pub mod id;
pub mod incident;
pub mod severity;
pub mod status;
pub mod time;

pub use id::{CameraId, IncidentId, RecordId};
pub use incident::IncidentRecord;
pub use severity::{classify, SeverityTier};
pub use status::{derive_status, IncidentStatus};
pub use time::parse_instant;
