pub mod driver;
pub mod session;

pub use driver::{drive, DriveOutcome, ViewCommand};
pub use session::{IncidentRow, IncidentView, LoadOutcome, LoadTicket, ViewStats};
