use crate::fixture::generator::{fall_event_frame, IncidentGenerator};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use incidentcore::model::{parse_instant, IncidentStatus, RecordId};
use incidentcore::reconcile::matches;
use incidentcore::{IncidentFilters, IncidentRecord};
use log::{debug, info};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use warp::http::StatusCode;
use warp::ws::{Message, WebSocket, Ws};
use warp::{Filter, Rejection, Reply};

const RETAINED_ROWS: usize = 500;
const MAX_PAGE: usize = 200;

/// In-memory stand-in for the backend's incident table and push hub.
pub struct FixtureState {
    rows: RwLock<Vec<IncidentRecord>>,
    feed: broadcast::Sender<String>,
    token: Option<String>,
}

pub type SharedState = Arc<FixtureState>;

impl FixtureState {
    pub fn new(history: Vec<IncidentRecord>, token: Option<String>) -> SharedState {
        let (feed, _) = broadcast::channel(64);
        Arc::new(Self {
            rows: RwLock::new(history),
            feed,
            token,
        })
    }

    pub fn list(&self, filters: &IncidentFilters, limit: usize) -> Vec<IncidentRecord> {
        match self.rows.read() {
            Ok(rows) => rows
                .iter()
                .filter(|row| matches(row, filters))
                .take(limit)
                .cloned()
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Stores a new row and pushes its notification to every client.
    pub fn publish(&self, record: IncidentRecord) {
        let frame = fall_event_frame(&record);
        if let Ok(mut rows) = self.rows.write() {
            rows.insert(0, record);
            rows.truncate(RETAINED_ROWS);
        }
        self.broadcast(frame);
    }

    pub fn broadcast(&self, frame: String) {
        // No subscribers is not an error for the fixture.
        let _ = self.feed.send(frame);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.feed.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.feed.receiver_count()
    }

    fn authorizes(&self, presented: Option<&String>) -> bool {
        match &self.token {
            Some(expected) => presented == Some(expected),
            None => true,
        }
    }
}

/// Parses `/events` query parameters the way the backend names them.
pub fn parse_query(query: &HashMap<String, String>) -> Result<(IncidentFilters, usize), String> {
    let non_empty = |key: &str| query.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());
    let instant = |key: &str| {
        non_empty(key)
            .map(|raw| parse_instant(raw).map_err(|err| format!("{key}: {err}")))
            .transpose()
    };
    let status = non_empty("status")
        .map(|raw| raw.parse::<IncidentStatus>())
        .transpose()?;
    let limit = match non_empty("limit") {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|err| format!("limit: {err}"))?,
        None => 50,
    };
    let filters = IncidentFilters {
        from: instant("from")?,
        to: instant("to")?,
        camera_id: non_empty("cameraId").map(RecordId::from),
        status,
    };
    Ok((filters, limit.clamp(1, MAX_PAGE)))
}

pub fn routes(state: SharedState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let state_filter = warp::any().map(move || state.clone());

    let events_route = warp::path("events")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(state_filter.clone())
        .map(|query: HashMap<String, String>, state: SharedState| {
            match parse_query(&query) {
                Ok((filters, limit)) => warp::reply::with_status(
                    warp::reply::json(&state.list(&filters, limit)),
                    StatusCode::OK,
                ),
                Err(detail) => warp::reply::with_status(
                    warp::reply::json(&json!({ "detail": detail })),
                    StatusCode::BAD_REQUEST,
                ),
            }
        });

    let channel_route = warp::path!("ws" / "events")
        .and(warp::ws())
        .and(warp::query::<HashMap<String, String>>())
        .and(state_filter)
        .map(|ws: Ws, query: HashMap<String, String>, state: SharedState| {
            if !state.authorizes(query.get("token")) {
                return warp::reply::with_status("invalid token", StatusCode::UNAUTHORIZED)
                    .into_response();
            }
            let feed = state.subscribe();
            ws.on_upgrade(move |socket| push_to_client(socket, feed, state))
                .into_response()
        });

    events_route.or(channel_route)
}

async fn push_to_client(
    socket: WebSocket,
    mut feed: broadcast::Receiver<String>,
    state: SharedState,
) {
    let (mut outbound, mut inbound) = socket.split();
    info!(
        "[fixture] channel client connected ({} open)",
        state.subscriber_count()
    );
    loop {
        tokio::select! {
            frame = feed.recv() => match frame {
                Ok(text) => {
                    if outbound.send(Message::text(text)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("[fixture] client lagged, skipped {} frames", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            message = inbound.next() => match message {
                Some(Ok(message)) if message.is_close() => break,
                Some(Ok(_)) => {}
                _ => break,
            },
        }
    }
    drop(feed);
    info!(
        "[fixture] channel client disconnected ({} open)",
        state.subscriber_count()
    );
}

/// Emits one incident per interval, with occasional frames clients must ignore.
pub async fn run_feed(state: SharedState, mut generator: IncidentGenerator, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if generator.roll_noise() {
            state.broadcast(generator.noise_frame());
        }
        let record = generator.incident(Utc::now());
        info!(
            "[fixture] incident #{} camera {:?} confidence {:?}",
            record.id, record.camera_id, record.confidence
        );
        state.publish(record);
    }
}
