use crate::watch::config::MonitorConfig;
use crate::watch::render::RowPrinter;
use anyhow::Context;
use incidentcore::ingest::{HttpSnapshotLoader, LiveStreamListener};
use incidentcore::view::{drive, ViewCommand};
use incidentcore::IncidentView;
use log::{info, warn};
use std::time::Duration;
use tokio::signal;
use tokio::sync::{mpsc, watch};

/// Mounts one view against the backend and renders it until Ctrl+C.
pub async fn run(config: MonitorConfig) -> anyhow::Result<()> {
    let printer = RowPrinter::new(config.timezone()?, config.max_rows);
    let mut view = IncidentView::new(
        config.view.name(),
        config.to_view_config(),
        config.filters.clone(),
    );

    let loader = HttpSnapshotLoader::new(&config.api_url, config.token.clone(), config.limit)
        .context("configuring snapshot loader")?;
    info!("loading snapshots from {} (limit {})", loader.endpoint(), loader.limit());
    let credential = config.token.clone().unwrap_or_default();
    let subscription = match LiveStreamListener::new(config.api_url.clone())
        .connect(&credential)
        .await
    {
        Ok(subscription) => Some(subscription.with_metrics(view.metrics())),
        Err(err) => {
            warn!("live channel unavailable, showing snapshot only: {}", err);
            None
        }
    };

    let refresh_secs = config.refresh_secs;
    let (command_tx, command_rx) = mpsc::channel(4);
    let refresh = async move {
        let Some(secs) = refresh_secs.filter(|secs| *secs > 0) else {
            return;
        };
        let mut ticker = tokio::time::interval(Duration::from_secs(secs));
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if command_tx.send(ViewCommand::Reload).await.is_err() {
                        break;
                    }
                }
                _ = command_tx.closed() => break,
            }
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let stop = async move {
        if let Err(err) = signal::ctrl_c().await {
            warn!("awaiting Ctrl+C failed: {}", err);
        }
        let _ = shutdown_tx.send(true);
    };
    let run = drive(&mut view, &loader, subscription, command_rx, shutdown_rx, |view| {
        printer.print(view)
    });
    let (mut outcome, (), ()) = tokio::join!(run, stop, refresh);

    if let Some(subscription) = outcome.subscription.take() {
        subscription.close().await;
    }
    if let Some(err) = &outcome.load_error {
        warn!("snapshot was not loaded: {}", err);
    }
    info!(
        "session closed: live {} snapshots {} failures {} discarded {} evicted {}",
        outcome.metrics.live_ingested,
        outcome.metrics.snapshots_applied,
        outcome.metrics.snapshot_failures,
        outcome.metrics.discarded,
        outcome.metrics.evicted
    );
    Ok(())
}
