use crate::ingest::{LiveSubscription, SnapshotSource};
use crate::model::IncidentRecord;
use crate::prelude::{TransportError, TransportResult};
use crate::reconcile::IncidentFilters;
use crate::telemetry::MetricsSnapshot;
use crate::view::session::{IncidentView, LoadOutcome};
use futures::Stream;
use log::{info, warn};
use std::future::Future;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

/// Requests accepted by a view while it is being driven.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewCommand {
    /// Fetch a fresh snapshot for the current filters.
    Reload,
    /// Swap the filters and fetch a snapshot for them.
    SetFilters(IncidentFilters),
}

pub struct DriveOutcome<S> {
    pub metrics: MetricsSnapshot,
    /// Failure of the most recent load, cleared by a later successful one.
    pub load_error: Option<TransportError>,
    pub live_ended: bool,
    /// Subscription that was still open at shutdown. It is no longer polled.
    pub subscription: Option<LiveSubscription<S>>,
}

/// Runs one view on the current task until `shutdown` flips to true.
///
/// Snapshot loads, live delivery, commands and highlight expiry are
/// multiplexed with `select!`, so every mutation of the view is applied whole
/// before the next one starts. `render` is called after each visible change.
/// A command starts a new load and abandons the one in flight. On shutdown
/// the view is unmounted before returning and an unfinished load is dropped
/// with it; a still-open subscription is handed back for the caller to close.
pub async fn drive<L, S, F>(
    view: &mut IncidentView,
    source: &L,
    subscription: Option<LiveSubscription<S>>,
    mut commands: mpsc::Receiver<ViewCommand>,
    mut shutdown: watch::Receiver<bool>,
    mut render: F,
) -> DriveOutcome<S>
where
    L: SnapshotSource,
    S: Stream<Item = Result<Message, WsError>> + Unpin,
    F: FnMut(&IncidentView),
{
    let mut subscription = subscription;
    let mut load_error = None;
    let mut live_ended = subscription.is_none();
    let mut commands_open = true;

    let mut ticket = view.begin_load();
    let load = start_load(source, view.filters().clone());
    tokio::pin!(load);
    let mut load_pending = true;

    let mut sweep = time::interval(view.config().sweep_interval());
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

    while !*shutdown.borrow() {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            result = &mut load, if load_pending => {
                load_pending = false;
                match view.complete_load(ticket, result) {
                    Ok(LoadOutcome::Applied(_)) => {
                        load_error = None;
                        render(view);
                    }
                    Ok(LoadOutcome::Dropped) => {}
                    Err(err) => {
                        load_error = Some(err);
                        render(view);
                    }
                }
            }
            command = commands.recv(), if commands_open => match command {
                Some(ViewCommand::Reload) => {
                    ticket = view.begin_load();
                    load.set(start_load(source, view.filters().clone()));
                    load_pending = true;
                }
                Some(ViewCommand::SetFilters(filters)) => {
                    ticket = view.set_filters(filters);
                    load.set(start_load(source, view.filters().clone()));
                    load_pending = true;
                    render(view);
                }
                None => commands_open = false,
            },
            incident = next_live(&mut subscription), if !live_ended => {
                match incident {
                    Some(record) => {
                        if view.on_live(record) {
                            render(view);
                        }
                    }
                    None => {
                        warn!("live channel ended; view keeps its last state");
                        live_ended = true;
                        subscription = None;
                    }
                }
            }
            _ = sweep.tick() => {
                if view.sweep(Instant::now()) > 0 {
                    render(view);
                }
            }
        }
    }

    view.unmount();
    info!("view driver stopped");
    DriveOutcome {
        metrics: view.metrics().snapshot(),
        load_error,
        live_ended,
        subscription,
    }
}

/// Owns its filters so a later command can replace the load in place.
fn start_load<'a, L: SnapshotSource>(
    source: &'a L,
    filters: IncidentFilters,
) -> impl Future<Output = TransportResult<Vec<IncidentRecord>>> + 'a {
    async move { source.load(&filters).await }
}

async fn next_live<S>(subscription: &mut Option<LiveSubscription<S>>) -> Option<IncidentRecord>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    match subscription {
        Some(live) => live.next_incident().await,
        None => None,
    }
}
