//! Transformer (spec.md §4.5, stage 3). `N` concurrent workers fan out from
//! one filtered channel; each worker counts, transforms, and either forwards
//! or records a failure without stopping the others.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use agdir_record::{OasfV0_7_0, Payload, Record};

use crate::error::ImporterError;
use crate::pipeline::SharedPipelineResult;
use crate::source::SourceItem;

/// Produces a canonical record from one source item. Source-specific:
/// one implementation per fetcher variant.
pub trait SourceTransform: Send + Sync {
    fn transform(&self, item: &SourceItem) -> Result<Record, ImporterError>;
}

/// Optional enrichment hook (spec.md §4.5): replaces the record's `skills`
/// field with the output of an external LLM interface, preserving every
/// other field untouched.
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich_skills(&self, record: &Record) -> Result<Vec<String>, ImporterError>;
}

pub struct McpTransform;

impl SourceTransform for McpTransform {
    fn transform(&self, item: &SourceItem) -> Result<Record, ImporterError> {
        match item {
            SourceItem::Mcp(item) => Ok(Record::new(Payload::OasfV0_7_0(OasfV0_7_0 {
                name: item.name.clone(),
                version: item.version.clone(),
                description: item.description.clone(),
                skills: item.skills.clone(),
                created_at: (!item.updated_at.is_empty()).then(|| item.updated_at.clone()),
                ..Default::default()
            }))),
            SourceItem::Unknown(value) => Err(ImporterError::TransformFailed(format!("no transform for source item: {value}"))),
        }
    }
}

async fn apply_enrichment(record: &mut Record, enricher: &dyn Enricher) -> Result<(), ImporterError> {
    let skills = enricher.enrich_skills(record).await?;
    if let Some(Payload::OasfV0_7_0(p)) = record.payload_mut() {
        p.skills = skills;
    }
    Ok(())
}

/// Spawns `concurrency` workers consuming `input` concurrently (source order
/// is not preserved, per spec.md §5) and returns the output channel plus a
/// handle that resolves once every worker has exited and the channel is
/// closed.
pub fn transform_items(
    input: mpsc::Receiver<SourceItem>,
    transform: impl SourceTransform + 'static,
    concurrency: usize,
    result: SharedPipelineResult,
    cancel: CancellationToken,
) -> (mpsc::Receiver<Record>, tokio::task::JoinHandle<()>) {
    transform_items_enriched(input, transform, None, concurrency, result, cancel)
}

pub fn transform_items_enriched(
    input: mpsc::Receiver<SourceItem>,
    transform: impl SourceTransform + 'static,
    enricher: Option<Arc<dyn Enricher>>,
    concurrency: usize,
    result: SharedPipelineResult,
    cancel: CancellationToken,
) -> (mpsc::Receiver<Record>, tokio::task::JoinHandle<()>) {
    let (out_tx, out_rx) = mpsc::channel(64);
    let input = Arc::new(Mutex::new(input));
    let transform = Arc::new(transform);

    let concurrency = concurrency.max(1);
    let mut workers = Vec::with_capacity(concurrency);

    for _ in 0..concurrency {
        let input = input.clone();
        let transform = transform.clone();
        let enricher = enricher.clone();
        let out_tx = out_tx.clone();
        let result = result.clone();
        let cancel = cancel.clone();

        workers.push(tokio::spawn(async move {
            loop {
                let item = {
                    let mut guard = input.lock().await;
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        item = guard.recv() => item,
                    }
                };
                let item = match item {
                    Some(item) => item,
                    None => break,
                };

                result.lock().await.total += 1;

                let transformed = transform.transform(&item);
                let mut record = match transformed {
                    Ok(record) => record,
                    Err(e) => {
                        let mut guard = result.lock().await;
                        guard.failed += 1;
                        guard.errors.push(e.to_string());
                        continue;
                    }
                };

                if let Some(enricher) = &enricher {
                    if let Err(e) = apply_enrichment(&mut record, enricher.as_ref()).await {
                        let mut guard = result.lock().await;
                        guard.failed += 1;
                        guard.errors.push(e.to_string());
                        continue;
                    }
                }

                if out_tx.send(record).await.is_err() {
                    break;
                }
            }
        }));
    }

    drop(out_tx);
    // the workers each hold their own clone of out_tx; the channel closes
    // once every worker (and this function's now-dropped clone) has exited.

    let done = tokio::spawn(async move {
        for worker in workers {
            let _ = worker.await;
        }
    });

    (out_rx, done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::McpSourceItem;

    fn item(name: &str) -> SourceItem {
        SourceItem::Mcp(McpSourceItem {
            id: name.into(),
            name: name.into(),
            version: "1.0.0".into(),
            description: String::new(),
            updated_at: String::new(),
            skills: vec![],
            raw: serde_json::json!({}),
        })
    }

    #[tokio::test]
    async fn transforms_all_items_and_counts_totals() {
        let (tx, rx) = mpsc::channel(8);
        for n in ["a", "b", "c"] {
            tx.send(item(n)).await.unwrap();
        }
        drop(tx);

        let result: SharedPipelineResult = Arc::new(Mutex::new(crate::pipeline::PipelineResult::default()));
        let (mut out, done) = transform_items(rx, McpTransform, 2, result.clone(), CancellationToken::new());

        let mut names = Vec::new();
        while let Some(record) = out.recv().await {
            names.push(agdir_record::RecordData::name(&record).to_string());
        }
        done.await.unwrap();

        names.sort();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(result.lock().await.total, 3);
        assert_eq!(result.lock().await.failed, 0);
    }

    #[tokio::test]
    async fn unknown_variant_fails_without_stopping_other_workers() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(item("ok")).await.unwrap();
        tx.send(SourceItem::Unknown(serde_json::json!({"x": 1}))).await.unwrap();
        drop(tx);

        let result: SharedPipelineResult = Arc::new(Mutex::new(crate::pipeline::PipelineResult::default()));
        let (mut out, done) = transform_items(rx, McpTransform, 1, result.clone(), CancellationToken::new());

        let mut count = 0;
        while out.recv().await.is_some() {
            count += 1;
        }
        done.await.unwrap();

        assert_eq!(count, 1);
        assert_eq!(result.lock().await.total, 2);
        assert_eq!(result.lock().await.failed, 1);
    }
}
