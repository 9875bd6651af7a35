//! Result aggregation and pipeline assembly (spec.md §4.5).
//!
//! Four collector tasks (fetch-errors, transform-errors, success-refs,
//! push-errors) update the shared result under one mutex; partial failure
//! never aborts the pipeline — callers inspect `result.failed` and
//! `result.errors` themselves.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use agdir_client::DirectoryClient;
use agdir_oci::StoreBackend;
use agdir_record::RecordRef;
use agdir_sign::Signer;

use crate::dedup::DedupChecker;
use crate::error::ImporterError;
use crate::fetcher::{FetcherFilters, McpFetcher};
use crate::pusher::{push_records, PusherConfig};
use crate::transform::{transform_items, McpTransform};

#[derive(Debug, Clone, Default)]
pub struct PipelineResult {
    pub total: u64,
    pub skipped: u64,
    pub imported: u64,
    pub failed: u64,
    pub errors: Vec<String>,
    pub refs: Vec<RecordRef>,
}

pub type SharedPipelineResult = Arc<Mutex<PipelineResult>>;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub concurrency: usize,
    pub dry_run: bool,
    pub force: bool,
    pub debug: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig { concurrency: 5, dry_run: false, force: false, debug: false }
    }
}

/// Runs Fetcher -> optional DedupChecker -> Transformer -> Pusher (or, in
/// dry-run mode, Fetcher -> optional DedupChecker -> Transformer -> drain).
/// Returns the aggregated result even when individual records failed
/// (spec.md §4.5: "the pipeline returns `(result, nil)`").
#[tracing::instrument(skip_all, fields(concurrency = config.concurrency, dry_run = config.dry_run, force = config.force))]
pub async fn run_pipeline<B>(
    fetcher: &McpFetcher,
    filters: FetcherFilters,
    dedup: Option<Arc<DedupChecker>>,
    backend: Arc<B>,
    client: Arc<DirectoryClient<B>>,
    signer: Option<Arc<dyn Signer>>,
    config: PipelineConfig,
    cancel: CancellationToken,
) -> Result<PipelineResult, ImporterError>
where
    B: StoreBackend + ?Sized + 'static,
{
    let result: SharedPipelineResult = Arc::new(Mutex::new(PipelineResult::default()));

    let (items_rx, fetch_err_rx) = fetcher.run(filters, cancel.clone());

    let filtered_rx = if !config.force {
        if let Some(dedup) = dedup.clone() {
            tracing::debug!("dedup filter active");
            apply_dedup(items_rx, dedup, result.clone())
        } else {
            items_rx
        }
    } else {
        tracing::debug!("force set; skipping dedup filter");
        items_rx
    };

    let (records_rx, _transform_done) = transform_items(filtered_rx, McpTransform, config.concurrency, result.clone(), cancel.clone());

    if config.dry_run {
        drain(records_rx).await;
    } else {
        push_records(
            records_rx,
            backend,
            client,
            signer,
            PusherConfig { debug: config.debug, force: config.force },
            result.clone(),
            cancel.clone(),
        )
        .await;
    }

    if let Ok(Some(err)) = fetch_err_rx.await {
        tracing::warn!(error = %err, "fetcher reported an error");
        let mut guard = result.lock().await;
        guard.errors.push(err.to_string());
    }

    let final_result = result.lock().await.clone();
    tracing::info!(
        total = final_result.total,
        skipped = final_result.skipped,
        imported = final_result.imported,
        failed = final_result.failed,
        "pipeline finished"
    );
    Ok(final_result)
}

fn apply_dedup(
    mut items: tokio::sync::mpsc::Receiver<crate::source::SourceItem>,
    dedup: Arc<DedupChecker>,
    result: SharedPipelineResult,
) -> tokio::sync::mpsc::Receiver<crate::source::SourceItem> {
    let (tx, rx) = tokio::sync::mpsc::channel(64);
    tokio::spawn(async move {
        while let Some(item) = items.recv().await {
            if dedup.is_known(&item).await {
                result.lock().await.skipped += 1;
                continue;
            }
            if tx.send(item).await.is_err() {
                break;
            }
        }
    });
    rx
}

async fn drain(mut records: tokio::sync::mpsc::Receiver<agdir_record::Record>) {
    while records.recv().await.is_some() {}
}
