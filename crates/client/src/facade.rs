//! Directory client facade (spec.md §4.4): the single entry point a caller
//! composes everything else through. Generalized from `crates/providers`'
//! `Provider` trait (one async method per external capability) into three
//! thin facades (`StoreService`, `SignService`) plus a search seam, all
//! driven through `agdir_stream`'s patterns where the RPC surface is itself
//! streamed.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use agdir_oci::{ReferrerArtifact, ReferrerKind, StoreBackend, ZotRegistry};
use agdir_record::{Record, RecordMeta, RecordRef};
use agdir_sign::{sign_cid, verify_cid, Signer, Verifier};
use agdir_stream::{client_stream, CancellationToken, StreamError, Transport};

use crate::error::ClientError;
use crate::search::{SearchProvider, SearchQuery};

/// Adapts a single `Record` handed through the client-stream pattern into
/// one `StoreBackend::push` call. The input side of `client_stream` is
/// always exactly one item in this facade: the wire contract allows a
/// multi-chunk upload, but nothing below the transport cares how many
/// `send`s produced the buffered record.
struct PushTransport<B: StoreBackend + ?Sized> {
    backend: Arc<B>,
    buffered: Mutex<Option<Record>>,
}

#[async_trait::async_trait]
impl<B: StoreBackend + ?Sized> Transport<Record, RecordRef> for PushTransport<B> {
    async fn send(&self, item: Record) -> Result<(), StreamError> {
        *self.buffered.lock().await = Some(item);
        Ok(())
    }

    async fn recv(&self) -> Result<Option<RecordRef>, StreamError> {
        Ok(None)
    }

    async fn close_send(&self) {}

    async fn close_and_recv(&self) -> Result<RecordRef, StreamError> {
        let record = self.buffered.lock().await.take();
        match record {
            Some(record) => self
                .backend
                .push(&record)
                .await
                .map_err(|e| StreamError::Internal(e.to_string())),
            None => Err(StreamError::Internal("push: no record was sent".into())),
        }
    }
}

/// The directory client (spec.md §4.4). Generic over the storage backend so
/// callers can plug `LocalDir`, `GenericRegistry`, or `ZotRegistry` without
/// the facade branching on backend type.
pub struct DirectoryClient<B: StoreBackend + ?Sized> {
    backend: Arc<B>,
    zot: Option<Arc<ZotRegistry>>,
    search: Option<Arc<dyn SearchProvider>>,
}

impl<B: StoreBackend + ?Sized + 'static> DirectoryClient<B> {
    pub fn new(backend: Arc<B>) -> Self {
        DirectoryClient { backend, zot: None, search: None }
    }

    pub fn with_zot(mut self, zot: Arc<ZotRegistry>) -> Self {
        self.zot = Some(zot);
        self
    }

    pub fn with_search(mut self, search: Arc<dyn SearchProvider>) -> Self {
        self.search = Some(search);
        self
    }

    /// Push RPC: client-stream, `stream Record -> RecordRef` (spec.md §6).
    pub async fn push(&self, record: Record) -> Result<RecordRef, ClientError> {
        let transport = Arc::new(PushTransport { backend: self.backend.clone(), buffered: Mutex::new(None) });
        let (tx, rx) = mpsc::channel(1);
        tx.send(record).await.map_err(|_| ClientError::InvalidInput("push: channel closed early".into()))?;
        drop(tx);
        let r#ref = client_stream(rx, transport, CancellationToken::new()).await?;
        Ok(r#ref)
    }

    pub async fn pull(&self, r#ref: &RecordRef) -> Result<Record, ClientError> {
        Ok(self.backend.pull(r#ref).await?)
    }

    pub async fn lookup(&self, r#ref: &RecordRef) -> Result<RecordMeta, ClientError> {
        Ok(self.backend.lookup(r#ref).await?)
    }

    pub async fn delete(&self, r#ref: &RecordRef) -> Result<(), ClientError> {
        Ok(self.backend.delete(r#ref).await?)
    }

    /// PullBatch RPC: concurrent fetch, results reassembled in request order
    /// by index (spec.md §4.4 — stronger ordering guarantee than the general
    /// concurrent-bidi pattern gives, because the facade tags each fetch
    /// with its position instead of relying on arrival order).
    pub async fn pull_batch(&self, refs: Vec<RecordRef>) -> Result<Vec<Record>, ClientError> {
        let mut tasks = Vec::with_capacity(refs.len());
        for (index, r#ref) in refs.into_iter().enumerate() {
            let backend = self.backend.clone();
            tasks.push(tokio::spawn(async move {
                let result = backend.pull(&r#ref).await;
                (index, result)
            }));
        }

        let mut slots: Vec<Option<Record>> = (0..tasks.len()).map(|_| None).collect();
        for task in tasks {
            let (index, result) = task
                .await
                .map_err(|e| ClientError::InvalidInput(format!("pull_batch: task panicked: {e}")))?;
            slots[index] = Some(result?);
        }

        Ok(slots.into_iter().map(|r| r.expect("every index was filled above")).collect())
    }

    pub async fn push_referrer(&self, host: &RecordRef, referrer: ReferrerArtifact) -> Result<(), ClientError> {
        Ok(self.backend.push_referrer(host, referrer).await?)
    }

    pub async fn pull_referrer(&self, host: &RecordRef, kind: ReferrerKind) -> Result<Vec<ReferrerArtifact>, ClientError> {
        Ok(self.backend.pull_referrers(&host.cid, Some(kind)).await?)
    }

    /// SearchCIDs RPC: server-stream in the wire contract; here, one call
    /// into the (opaque, external) search index forwarded as a channel of
    /// CIDs so callers consume it the same way regardless of backing store.
    pub fn search_cids(&self, queries: Vec<SearchQuery>, limit: Option<u32>, offset: Option<u32>) -> mpsc::Receiver<Result<String, ClientError>> {
        let (tx, rx) = mpsc::channel(64);
        let search = self.search.clone();
        tokio::spawn(async move {
            let Some(search) = search else {
                let _ = tx.send(Err(ClientError::InvalidInput("search_cids: no search provider configured".into()))).await;
                return;
            };
            match search.search_cids(&queries, limit, offset).await {
                Ok(cids) => {
                    for cid in cids {
                        if tx.send(Ok(cid)).await.is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                }
            }
        });
        rx
    }

    /// Sign RPC (spec.md §4.6). `signer` supplies the key-based path;
    /// OIDC/bundle-based signing is an external collaborator concern
    /// (spec.md §1) and is not dispatched here.
    pub async fn sign(&self, cid: &str, provider: agdir_sign::SignProvider, signer: &dyn Signer) -> Result<(), ClientError> {
        match provider {
            agdir_sign::SignProvider::Key => Ok(sign_cid(self.backend.as_ref(), cid, signer).await?),
            agdir_sign::SignProvider::Oidc => {
                Err(ClientError::InvalidInput("sign: OIDC provider is an external collaborator, not handled by this client".into()))
            }
        }
    }

    pub async fn verify(&self, cid: &str, verifier: &dyn Verifier) -> Result<bool, ClientError> {
        Ok(verify_cid(self.backend.as_ref(), self.zot.as_deref(), cid, verifier).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agdir_oci::LocalDir;
    use agdir_record::{OasfV0_7_0, Payload};
    use agdir_sign::{Ed25519Signer, Ed25519Verifier, SignProvider};
    use async_trait::async_trait;

    struct StaticSearch(Vec<String>);

    #[async_trait]
    impl SearchProvider for StaticSearch {
        async fn search_cids(&self, _queries: &[SearchQuery], _limit: Option<u32>, _offset: Option<u32>) -> Result<Vec<String>, ClientError> {
            Ok(self.0.clone())
        }
    }

    fn record(name: &str) -> Record {
        Record::new(Payload::OasfV0_7_0(OasfV0_7_0 { name: name.into(), ..Default::default() }))
    }

    #[tokio::test]
    async fn push_then_pull_round_trips() {
        let td = tempfile::TempDir::new().unwrap();
        let backend = Arc::new(LocalDir::new(td.path().to_path_buf()));
        let client = DirectoryClient::new(backend);

        let r#ref = client.push(record("push-pull")).await.unwrap();
        let pulled = client.pull(&r#ref).await.unwrap();
        assert_eq!(pulled.name(), "push-pull");
    }

    #[tokio::test]
    async fn pull_batch_preserves_request_order() {
        let td = tempfile::TempDir::new().unwrap();
        let backend = Arc::new(LocalDir::new(td.path().to_path_buf()));
        let client = DirectoryClient::new(backend);

        let mut refs = Vec::new();
        for name in ["a", "b", "c"] {
            refs.push(client.push(record(name)).await.unwrap());
        }

        let records = client.pull_batch(refs.clone()).await.unwrap();
        let names: Vec<_> = records.iter().map(|r| r.name()).collect();
        let expected: Vec<_> = refs.iter().map(|r| r.cid.clone()).collect();
        let actual: Vec<_> = records.iter().map(|r| r.get_cid()).collect();
        assert_eq!(actual, expected);
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn search_cids_streams_provider_results() {
        let td = tempfile::TempDir::new().unwrap();
        let backend = Arc::new(LocalDir::new(td.path().to_path_buf()));
        let client = DirectoryClient::new(backend).with_search(Arc::new(StaticSearch(vec!["cid-a".into(), "cid-b".into()])));

        let mut rx = client.search_cids(vec![], None, None);
        let mut seen = Vec::new();
        while let Some(item) = rx.recv().await {
            seen.push(item.unwrap());
        }
        assert_eq!(seen, vec!["cid-a", "cid-b"]);
    }

    #[tokio::test]
    async fn sign_then_verify_round_trips() {
        let td = tempfile::TempDir::new().unwrap();
        let backend = Arc::new(LocalDir::new(td.path().to_path_buf()));
        let client = DirectoryClient::new(backend);

        let r#ref = client.push(record("signed")).await.unwrap();
        let signer = Ed25519Signer::generate();
        client.sign(&r#ref.cid, SignProvider::Key, &signer).await.unwrap();

        let verified = client.verify(&r#ref.cid, &Ed25519Verifier).await.unwrap();
        assert!(verified);
    }

    #[tokio::test]
    async fn sign_rejects_oidc_provider() {
        let td = tempfile::TempDir::new().unwrap();
        let backend = Arc::new(LocalDir::new(td.path().to_path_buf()));
        let client = DirectoryClient::new(backend);
        let signer = Ed25519Signer::generate();

        let err = client.sign("anything", SignProvider::Oidc, &signer).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidInput(_)));
    }
}
