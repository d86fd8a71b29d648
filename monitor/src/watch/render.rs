use chrono_tz::Tz;
use incidentcore::view::ViewStats;
use incidentcore::{IncidentRow, IncidentStatus, IncidentView};

/// Prints the head of a view after each change.
pub struct RowPrinter {
    timezone: Tz,
    max_rows: usize,
}

impl RowPrinter {
    pub fn new(timezone: Tz, max_rows: usize) -> Self {
        Self { timezone, max_rows }
    }

    pub fn print(&self, view: &IncidentView) {
        let rows = view.rows();
        println!("{}", format_stats(&view.stats(), rows.len()));
        for row in rows.iter().take(self.max_rows) {
            println!("  {}", format_row(row, self.timezone));
        }
        if rows.is_empty() {
            println!("  No incidents recorded.");
        }
    }
}

pub fn format_stats(stats: &ViewStats, shown: usize) -> String {
    format!(
        "[incidents] total {} | new {} | acked {} | critical {} | matching {}",
        stats.total, stats.pending, stats.acknowledged, stats.critical, shown
    )
}

pub fn format_row(row: &IncidentRow, timezone: Tz) -> String {
    let camera = row
        .record
        .camera_id
        .as_ref()
        .map(|id| format!("Camera {}", id))
        .unwrap_or_else(|| "Unknown".into());
    let status = match row.status {
        IncidentStatus::New => "NEW".to_string(),
        IncidentStatus::Acknowledged => match &row.record.acknowledged_by {
            Some(actor) => format!("ACK by {}", actor),
            None => "ACK".to_string(),
        },
    };
    let marker = if row.is_new { " *" } else { "" };
    format!(
        "#{:<6} {:<12} {}  {:<8} {:.2}  {}{}",
        row.record.id.to_string(),
        camera,
        row.record
            .detected_at
            .with_timezone(&timezone)
            .format("%Y-%m-%d %H:%M:%S"),
        row.severity.as_str(),
        row.record.confidence_score(),
        status,
        marker
    )
}
