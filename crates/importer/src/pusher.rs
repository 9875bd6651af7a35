//! Pusher (spec.md §4.5, stage 4). Deliberately sequential: the directory
//! RPC aborts the whole stream on the first validation error, so per-record
//! isolation requires one call at a time rather than a concurrent fan-out
//! (spec.md §9).

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use agdir_client::DirectoryClient;
use agdir_oci::StoreBackend;
use agdir_record::{Payload, Record};
use agdir_sign::{sign_cid, Signer};

use crate::pipeline::SharedPipelineResult;

#[derive(Debug, Clone, Default)]
pub struct PusherConfig {
    pub debug: bool,
    pub force: bool,
}

fn strip_debug_annotation(record: &mut Record) {
    if let Some(Payload::OasfV0_7_0(p)) = record.payload_mut() {
        p.annotations.remove("debug");
    }
    if let Some(Payload::OasfV1_0_0(p)) = record.payload_mut() {
        p.annotations.remove("debug");
    }
}

/// Consumes `records` sequentially, pushing each and optionally invoking the
/// sign hook on success. Never aborts on a single-record failure; counts and
/// errors accumulate in `result`.
pub async fn push_records<B>(
    mut records: mpsc::Receiver<Record>,
    backend: Arc<B>,
    client: Arc<DirectoryClient<B>>,
    signer: Option<Arc<dyn Signer>>,
    config: PusherConfig,
    result: SharedPipelineResult,
    cancel: CancellationToken,
) where
    B: StoreBackend + ?Sized + 'static,
{
    loop {
        let item = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            item = records.recv() => item,
        };
        let mut record = match item {
            Some(r) => r,
            None => break,
        };

        if config.debug {
            strip_debug_annotation(&mut record);
        }

        match client.push(record).await {
            Ok(r#ref) => {
                if let Some(signer) = &signer {
                    if let Err(e) = sign_cid(backend.as_ref(), &r#ref.cid, signer.as_ref()).await {
                        tracing::warn!(cid = %r#ref.cid, error = %e, "sign-hook failed after successful push");
                        result.lock().await.errors.push(format!("sign failed for {}: {e}", r#ref.cid));
                    }
                }
                let mut guard = result.lock().await;
                guard.imported += 1;
                guard.refs.push(r#ref);
            }
            Err(e) => {
                let mut guard = result.lock().await;
                guard.failed += 1;
                guard.errors.push(e.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineResult;
    use agdir_oci::LocalDir;
    use agdir_record::{OasfV0_7_0, Payload};
    use tokio::sync::Mutex;

    #[tokio::test]
    async fn pushes_sequentially_and_counts_success() {
        let td = tempfile::TempDir::new().unwrap();
        let backend = Arc::new(LocalDir::new(td.path().to_path_buf()));
        let client = Arc::new(DirectoryClient::new(backend.clone()));

        let (tx, rx) = mpsc::channel(4);
        for name in ["one", "two"] {
            tx.send(Record::new(Payload::OasfV0_7_0(OasfV0_7_0 { name: name.into(), ..Default::default() })))
                .await
                .unwrap();
        }
        drop(tx);

        let result: SharedPipelineResult = Arc::new(Mutex::new(PipelineResult::default()));
        push_records(rx, backend, client, None, PusherConfig::default(), result.clone(), CancellationToken::new()).await;

        let guard = result.lock().await;
        assert_eq!(guard.imported, 2);
        assert_eq!(guard.failed, 0);
        assert_eq!(guard.refs.len(), 2);
    }
}
