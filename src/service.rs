//! Wiring of the store, importer, clustering run and HTTP API into the
//! commands the binary exposes.

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use crate::cluster::run::{ClusterReport, exec_cluster};
use crate::config::Settings;
use crate::http::{self, AppState};
use crate::importer::{ImportSummary, exec_import};
use crate::storage::ChunkStore;

/// Opens the store at `settings.data_path`, loading its snapshot if present.
pub fn open_store(settings: &Settings) -> anyhow::Result<Arc<ChunkStore>> {
    let store = ChunkStore::open(&settings.data_path, settings.dimension)
        .with_context(|| format!("failed to open store '{}'", settings.data_path.display()))?;
    Ok(Arc::new(store))
}

fn save_store(store: &ChunkStore) -> anyhow::Result<()> {
    store.save().context("failed to save store")?;
    tracing::info!(rows = store.len(), "store saved");
    Ok(())
}

/// Serves the HTTP API until `shutdown` is cancelled, then saves the store.
///
/// Import and clustering, when enabled, run in the background in that order
/// while requests are served.
pub async fn serve(settings: Settings, shutdown: CancellationToken) -> anyhow::Result<()> {
    let store = open_store(&settings)?;

    let background = tokio::spawn(background_jobs(
        Arc::clone(&store),
        settings.clone(),
        shutdown.child_token(),
    ));

    let state = AppState::new(store.clone(), settings.dimension);
    let served = http::serve(&settings.server.bind, state, shutdown.clone()).await;

    shutdown.cancel();
    if let Err(e) = background.await {
        tracing::error!(error = %e, "background jobs aborted");
    }

    save_store(&store)?;
    served
}

async fn background_jobs(store: Arc<ChunkStore>, settings: Settings, cancel: CancellationToken) {
    // Failures are logged by exec_import / exec_cluster
    if settings.run_import {
        let _ = exec_import(
            Arc::clone(&store),
            settings.import.to_config(settings.dimension),
            settings.import.progress_interval(),
            cancel.clone(),
        )
        .await;
    }

    if settings.run_cluster && !cancel.is_cancelled() {
        let _ = exec_cluster(
            store,
            settings.cluster.to_job(),
            settings.cluster.timeout(),
            cancel,
        )
        .await;
    }
}

/// Runs one import and saves whatever was inserted, even on failure.
pub async fn import_once(
    settings: &Settings,
    cancel: CancellationToken,
) -> anyhow::Result<ImportSummary> {
    let store = open_store(settings)?;
    let result = exec_import(
        Arc::clone(&store),
        settings.import.to_config(settings.dimension),
        settings.import.progress_interval(),
        cancel,
    )
    .await;

    save_store(&store)?;
    Ok(result?)
}

/// Runs one clustering pass and saves the labels written so far.
pub async fn cluster_once(
    settings: &Settings,
    cancel: CancellationToken,
) -> anyhow::Result<ClusterReport> {
    let store = open_store(settings)?;
    let result = exec_cluster(
        Arc::clone(&store),
        settings.cluster.to_job(),
        settings.cluster.timeout(),
        cancel,
    )
    .await;

    save_store(&store)?;
    Ok(result?)
}
