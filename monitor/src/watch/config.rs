use anyhow::{anyhow, Context};
use chrono_tz::Tz;
use clap::ValueEnum;
use incidentcore::model::{parse_instant, IncidentStatus, RecordId};
use incidentcore::{IncidentFilters, ViewConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    /// Incident list, bounded at 200 rows
    List,
    /// Live/dashboard feed, bounded at 20 rows
    Live,
}

impl ViewKind {
    pub fn name(&self) -> &'static str {
        match self {
            ViewKind::List => "incident-list",
            ViewKind::Live => "live-feed",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub api_url: String,
    pub token: Option<String>,
    pub view: ViewKind,
    pub capacity: Option<usize>,
    pub highlight_ms: Option<u64>,
    pub limit: usize,
    pub filters: IncidentFilters,
    pub display_timezone: String,
    pub max_rows: usize,
    /// Reload the snapshot on this period; unset loads once.
    pub refresh_secs: Option<u64>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".into(),
            token: None,
            view: ViewKind::List,
            capacity: None,
            highlight_ms: None,
            limit: 200,
            filters: IncidentFilters::default(),
            display_timezone: "Asia/Ho_Chi_Minh".into(),
            max_rows: 10,
            refresh_secs: None,
        }
    }
}

/// Values passed explicitly on the command line. Each one set replaces the
/// corresponding config value; unset ones leave it alone.
#[derive(Clone, Debug, Default)]
pub struct WatchOverrides {
    pub api_url: Option<String>,
    pub token: Option<String>,
    pub view: Option<ViewKind>,
    pub filters: FilterArgs,
    pub limit: Option<usize>,
    pub timezone: Option<String>,
    pub capacity: Option<usize>,
    pub max_rows: Option<usize>,
    pub refresh_secs: Option<u64>,
}

/// Raw filter values as typed on the command line.
#[derive(Clone, Debug, Default)]
pub struct FilterArgs {
    pub from: Option<String>,
    pub to: Option<String>,
    pub camera: Option<String>,
    pub status: Option<String>,
}

impl MonitorConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading monitor config {}", path_ref.display()))?;
        let config: MonitorConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing monitor config {}", path_ref.display()))?;
        Ok(config)
    }

    /// Layers explicitly passed flags over this config. An empty filter
    /// value clears that filter.
    pub fn apply(&mut self, overrides: WatchOverrides) -> anyhow::Result<()> {
        let parsed = parse_filters(&overrides.filters)?;
        if overrides.filters.from.is_some() {
            self.filters.from = parsed.from;
        }
        if overrides.filters.to.is_some() {
            self.filters.to = parsed.to;
        }
        if overrides.filters.camera.is_some() {
            self.filters.camera_id = parsed.camera_id;
        }
        if overrides.filters.status.is_some() {
            self.filters.status = parsed.status;
        }
        if let Some(api_url) = overrides.api_url {
            self.api_url = api_url;
        }
        if let Some(token) = overrides.token {
            self.token = Some(token);
        }
        if let Some(view) = overrides.view {
            self.view = view;
        }
        if let Some(limit) = overrides.limit {
            self.limit = limit;
        }
        if let Some(timezone) = overrides.timezone {
            self.display_timezone = timezone;
        }
        if overrides.capacity.is_some() {
            self.capacity = overrides.capacity;
        }
        if let Some(max_rows) = overrides.max_rows {
            self.max_rows = max_rows;
        }
        if overrides.refresh_secs.is_some() {
            self.refresh_secs = overrides.refresh_secs;
        }
        Ok(())
    }

    pub fn to_view_config(&self) -> ViewConfig {
        let base = match self.view {
            ViewKind::List => ViewConfig::list(),
            ViewKind::Live => ViewConfig::live(),
        };
        ViewConfig {
            capacity: self.capacity.unwrap_or(base.capacity),
            highlight_ms: self.highlight_ms.unwrap_or(base.highlight_ms),
            ..base
        }
    }

    pub fn timezone(&self) -> anyhow::Result<Tz> {
        self.display_timezone
            .parse::<Tz>()
            .map_err(|err| anyhow!("unknown display timezone {}: {}", self.display_timezone, err))
    }
}

pub fn parse_filters(args: &FilterArgs) -> anyhow::Result<IncidentFilters> {
    let instant = |raw: &Option<String>, name: &str| -> anyhow::Result<_> {
        raw.as_deref()
            .filter(|value| !value.trim().is_empty())
            .map(|value| parse_instant(value).with_context(|| format!("parsing --{name}")))
            .transpose()
    };
    let status = args
        .status
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .map(|value| value.parse::<IncidentStatus>().map_err(|err| anyhow!(err)))
        .transpose()?;
    Ok(IncidentFilters {
        from: instant(&args.from, "from")?,
        to: instant(&args.to, "to")?,
        camera_id: args
            .camera
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .map(RecordId::from),
        status,
    })
}
