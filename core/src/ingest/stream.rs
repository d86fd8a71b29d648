use crate::ingest::snapshot::api_endpoint;
use crate::model::severity::{self, SeverityTier};
use crate::model::time::deserialize_instant;
use crate::model::{CameraId, IncidentId, IncidentRecord, IncidentStatus, RecordId};
use crate::prelude::{ParseError, TransportError, TransportResult};
use crate::telemetry::MetricsRecorder;
use chrono::{DateTime, Utc};
use futures::stream::{self, Stream, StreamExt};
use log::{debug, info, warn};
use reqwest::Url;
use serde::Deserialize;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Inbound channel payload, discriminated by its `type` tag.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelMessage {
    FallEvent(FallEventMessage),
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FallEventMessage {
    pub event_id: IncidentId,
    #[serde(default)]
    pub user_id: Option<RecordId>,
    #[serde(default)]
    pub camera_id: Option<CameraId>,
    #[serde(deserialize_with = "deserialize_instant")]
    pub ts: DateTime<Utc>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default, deserialize_with = "severity::deserialize_lenient")]
    pub severity: Option<SeverityTier>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub ack: Option<bool>,
    #[serde(default)]
    pub ack_by: Option<String>,
    #[serde(default, alias = "snapshot_path")]
    pub snapshot_url: Option<String>,
    #[serde(default, alias = "clip_path")]
    pub clip_url: Option<String>,
}

impl FallEventMessage {
    pub fn into_record(self) -> IncidentRecord {
        let status_ack = self
            .status
            .as_deref()
            .and_then(|raw| raw.parse::<IncidentStatus>().ok())
            == Some(IncidentStatus::Acknowledged);
        let acknowledged = self.ack.unwrap_or(false) || status_ack;
        IncidentRecord {
            id: self.event_id,
            user_id: self.user_id,
            camera_id: self.camera_id,
            detected_at: self.ts,
            confidence: self.confidence,
            severity: self.severity,
            acknowledged,
            acknowledged_by: if acknowledged { self.ack_by } else { None },
            snapshot_path: self.snapshot_url.filter(|url| !url.is_empty()),
            clip_path: self.clip_url.filter(|url| !url.is_empty()),
        }
    }
}

pub fn parse_message(text: &str) -> Result<ChannelMessage, ParseError> {
    Ok(serde_json::from_str(text)?)
}

/// Builds `<ws base>/ws/events?token=...` from the REST base URL.
pub fn channel_url(api_base: &str, credential: &str) -> TransportResult<Url> {
    let mut url = api_endpoint(api_base, "ws/events")?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(TransportError::InvalidEndpoint(format!(
                "unsupported scheme {other}"
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| TransportError::InvalidEndpoint(format!("cannot use {scheme} for {api_base}")))?;
    url.query_pairs_mut().append_pair("token", credential);
    Ok(url)
}

/// Opens the push channel for one view.
#[derive(Debug, Clone)]
pub struct LiveStreamListener {
    api_base: String,
}

impl LiveStreamListener {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
        }
    }

    /// Connect failures are returned; reconnecting is the caller's business.
    pub async fn connect(&self, credential: &str) -> TransportResult<LiveSubscription<WsStream>> {
        let url = channel_url(&self.api_base, credential)?;
        let (socket, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
        info!("live channel connected to {}{}", url.host_str().unwrap_or("?"), url.path());
        Ok(LiveSubscription::from_frames(socket))
    }
}

/// One open subscription. Dropping it releases the socket.
pub struct LiveSubscription<S> {
    frames: S,
    metrics: Option<Arc<MetricsRecorder>>,
    ended: bool,
}

impl<S> LiveSubscription<S>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    pub fn from_frames(frames: S) -> Self {
        Self {
            frames,
            metrics: None,
            ended: false,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Next incident notification. `None` once the channel has ended; bad or
    /// unrelated frames are skipped, never surfaced.
    pub async fn next_incident(&mut self) -> Option<IncidentRecord> {
        if self.ended {
            return None;
        }
        while let Some(frame) = self.frames.next().await {
            let text = match frame {
                Ok(Message::Text(text)) => text,
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => text,
                    Err(_) => {
                        self.discard(ParseError::NonText);
                        continue;
                    }
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(err) => {
                    warn!("live channel dropped: {}", err);
                    break;
                }
            };
            match parse_message(&text) {
                Ok(ChannelMessage::FallEvent(event)) => return Some(event.into_record()),
                Ok(ChannelMessage::Other) => debug!("ignoring non-incident channel message"),
                Err(err) => self.discard(err),
            }
        }
        self.ended = true;
        None
    }

    /// Lazy sequence of incidents that ends with the channel.
    pub fn into_incidents(self) -> impl Stream<Item = IncidentRecord> {
        stream::unfold(self, |mut subscription| async move {
            subscription
                .next_incident()
                .await
                .map(|record| (record, subscription))
        })
    }

    fn discard(&self, err: ParseError) {
        debug!("discarding channel frame: {}", err);
        if let Some(metrics) = &self.metrics {
            metrics.record_discarded();
        }
    }
}

impl LiveSubscription<WsStream> {
    /// Sends a close frame, then releases the socket.
    pub async fn close(mut self) {
        if let Err(err) = self.frames.close(None).await {
            debug!("live channel close: {}", err);
        }
    }
}
