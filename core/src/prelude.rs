use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default bound for list views.
pub const LIST_CAPACITY: usize = 200;
/// Default bound for live/dashboard views.
pub const LIVE_CAPACITY: usize = 20;
/// Default lifetime of a "just arrived" marker.
pub const HIGHLIGHT_MS: u64 = 1200;

/// Shared configuration for one mounted view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub capacity: usize,
    pub highlight_ms: u64,
    pub sweep_ms: u64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self::list()
    }
}

impl ViewConfig {
    pub fn list() -> Self {
        Self {
            capacity: LIST_CAPACITY,
            highlight_ms: HIGHLIGHT_MS,
            sweep_ms: 250,
        }
    }

    pub fn live() -> Self {
        Self {
            capacity: LIVE_CAPACITY,
            ..Self::list()
        }
    }

    pub fn reconciler(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            capacity: self.capacity.max(1),
        }
    }

    pub fn highlight(&self) -> HighlightConfig {
        HighlightConfig {
            delay: Duration::from_millis(self.highlight_ms),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_ms.max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerConfig {
    pub capacity: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            capacity: LIST_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightConfig {
    pub delay: Duration,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(HIGHLIGHT_MS),
        }
    }
}

/// Snapshot load or channel connect failure. Surfaced, never retried here.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("backend answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode snapshot: {0}")]
    Decode(String),
    #[error("channel connect failed: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Malformed inbound data. The listener logs and discards these.
#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unrecognised timestamp {0:?}")]
    Timestamp(String),
    #[error("non-text frame")]
    NonText,
}

pub type TransportResult<T> = Result<T, TransportError>;
