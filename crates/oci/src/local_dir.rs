//! `LocalDir` backend: filesystem-rooted OCI store for tests and mounted
//! volumes (spec.md §4.2). Layout mirrors `crates/episodes`' deterministic,
//! path-based store: ensure-dir before every write, content-addressed blobs,
//! one small index file per lookup axis (here: tags).

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use agdir_record::{annotations_to_meta, Record, RecordMeta, RecordRef};

use crate::backend::StoreBackend;
use crate::error::OciError;
use crate::manifest::{Descriptor, Manifest, ReferrerArtifact, ReferrerKind};

pub struct LocalDir {
    root: PathBuf,
}

impl LocalDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalDir { root: root.into() }
    }

    fn blobs_dir(&self) -> PathBuf {
        self.root.join("blobs")
    }

    fn manifests_dir(&self) -> PathBuf {
        self.root.join("manifests")
    }

    fn tags_dir(&self) -> PathBuf {
        self.root.join("tags")
    }

    fn referrers_dir(&self, host_cid: &str) -> PathBuf {
        self.root.join("referrers").join(sanitize(host_cid))
    }

    fn ensure_dirs(&self) -> Result<(), OciError> {
        fs::create_dir_all(self.blobs_dir())?;
        fs::create_dir_all(self.manifests_dir())?;
        fs::create_dir_all(self.tags_dir())?;
        Ok(())
    }

    fn digest_path(dir: &Path, digest: &str) -> PathBuf {
        dir.join(digest.replace(':', "_"))
    }

    fn exists(&self, dir: &Path, digest: &str) -> bool {
        Self::digest_path(dir, digest).exists()
    }

    fn write_if_absent(&self, dir: &Path, digest: &str, bytes: &[u8]) -> Result<(), OciError> {
        let path = Self::digest_path(dir, digest);
        if path.exists() {
            return Ok(());
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn read(&self, dir: &Path, digest: &str) -> Result<Vec<u8>, OciError> {
        let path = Self::digest_path(dir, digest);
        fs::read(&path).map_err(|_| OciError::NotFound(format!("{digest} missing under {}", dir.display())))
    }

    fn tag_path(&self, cid: &str) -> PathBuf {
        self.tags_dir().join(sanitize(cid))
    }
}

fn sanitize(s: &str) -> String {
    s.replace(['/', ':'], "_")
}

#[async_trait]
impl StoreBackend for LocalDir {
    async fn push(&self, record: &Record) -> Result<RecordRef, OciError> {
        self.ensure_dirs()?;
        let (bytes, annotations) = crate::manifest::record_bytes_and_annotations(record)?;
        let config = Descriptor::for_bytes(crate::manifest::RECORD_MEDIA_TYPE, &bytes);
        self.write_if_absent(&self.blobs_dir(), &config.digest, &bytes)?;

        let manifest = Manifest::for_record(&bytes, annotations);
        let manifest_bytes = manifest.to_canonical_bytes()?;
        let manifest_digest = agdir_common::sha256_oci_digest(&manifest_bytes);
        self.write_if_absent(&self.manifests_dir(), &manifest_digest, &manifest_bytes)?;

        let cid = record.get_cid();
        if cid.is_empty() {
            return Err(OciError::InvalidInput("cannot push a record with no CID".into()));
        }
        fs::write(self.tag_path(&cid), &manifest_digest)?;
        Ok(RecordRef::new(cid))
    }

    async fn lookup(&self, r: &RecordRef) -> Result<RecordMeta, OciError> {
        let tag_path = self.tag_path(&r.cid);
        if !tag_path.exists() {
            return Err(OciError::NotFound(format!("tag {} not found", r.cid)));
        }
        let manifest_digest = fs::read_to_string(&tag_path)?;
        let manifest_bytes = self.read(&self.manifests_dir(), &manifest_digest)?;
        let manifest: Manifest = serde_json::from_slice(&manifest_bytes)?;
        Ok(annotations_to_meta(r.cid.clone(), &manifest.annotations))
    }

    async fn pull(&self, r: &RecordRef) -> Result<Record, OciError> {
        let tag_path = self.tag_path(&r.cid);
        if !tag_path.exists() {
            return Err(OciError::NotFound(format!("tag {} not found", r.cid)));
        }
        let manifest_digest = fs::read_to_string(&tag_path)?;
        let manifest_bytes = self.read(&self.manifests_dir(), &manifest_digest)?;
        let manifest: Manifest = serde_json::from_slice(&manifest_bytes)?;
        let record_bytes = self.read(&self.blobs_dir(), &manifest.config.digest)?;
        Ok(Record::unmarshal_record(&record_bytes)?)
    }

    async fn delete(&self, r: &RecordRef) -> Result<(), OciError> {
        let tag_path = self.tag_path(&r.cid);
        if tag_path.exists() {
            fs::remove_file(tag_path)?;
        }
        Ok(())
    }

    async fn push_referrer(&self, host: &RecordRef, referrer: ReferrerArtifact) -> Result<(), OciError> {
        let dir = self.referrers_dir(&host.cid);
        fs::create_dir_all(&dir)?;
        let config = Descriptor::for_bytes(referrer.kind.media_type(), &referrer.bytes);
        self.write_if_absent(&self.blobs_dir(), &config.digest, &referrer.bytes)?;

        let subject = Descriptor::for_bytes(
            crate::manifest::MANIFEST_MEDIA_TYPE,
            host.cid.as_bytes(),
        );
        let manifest = referrer.manifest_for(&subject);
        let manifest_bytes = manifest.to_canonical_bytes()?;
        let manifest_digest = agdir_common::sha256_oci_digest(&manifest_bytes);
        let path = dir.join(sanitize(&manifest_digest));
        fs::write(path, manifest_bytes)?;
        Ok(())
    }

    async fn walk_referrers(
        &self,
        host_cid: &str,
        kind: Option<ReferrerKind>,
        f: &mut (dyn FnMut(ReferrerArtifact) -> Result<(), OciError> + Send),
    ) -> Result<(), OciError> {
        let dir = self.referrers_dir(host_cid);
        if !dir.exists() {
            return Ok(());
        }
        let mut entries: Vec<_> = fs::read_dir(&dir)?.filter_map(|e| e.ok()).collect();
        entries.sort_by_key(|e| e.file_name());
        for entry in entries {
            let manifest_bytes = fs::read(entry.path())?;
            let manifest: Manifest = serde_json::from_slice(&manifest_bytes)?;
            let artifact_kind = match ReferrerKind::from_media_type(&manifest.config.media_type) {
                Some(k) => k,
                None => continue,
            };
            if let Some(want) = kind {
                if want != artifact_kind {
                    continue;
                }
            }
            let bytes = self.read(&self.blobs_dir(), &manifest.config.digest)?;
            f(ReferrerArtifact {
                kind: artifact_kind,
                bytes,
                annotations: manifest.annotations,
            })?;
        }
        Ok(())
    }

    async fn is_ready(&self) -> Result<bool, OciError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agdir_record::{OasfV0_7_0, Payload};
    use tempfile::TempDir;

    fn store() -> (TempDir, LocalDir) {
        let td = TempDir::new().unwrap();
        let backend = LocalDir::new(td.path().to_path_buf());
        (td, backend)
    }

    fn sample_record() -> Record {
        Record::new(Payload::OasfV0_7_0(OasfV0_7_0 {
            name: "local-dir-test".into(),
            version: "1.0.0".into(),
            ..Default::default()
        }))
    }

    #[tokio::test]
    async fn s8_push_lookup_pull_round_trip() {
        let (_td, backend) = store();
        let record = sample_record();
        let expected_cid = record.get_cid();

        let r#ref = backend.push(&record).await.unwrap();
        assert_eq!(r#ref.cid, expected_cid);

        let meta = backend.lookup(&r#ref).await.unwrap();
        assert_eq!(meta.cid, expected_cid);

        let pulled = backend.pull(&r#ref).await.unwrap();
        assert_eq!(pulled.marshal_canonical().unwrap(), record.marshal_canonical().unwrap());
    }

    #[tokio::test]
    async fn s9_idempotent_push() {
        let (_td, backend) = store();
        let record = sample_record();
        let ref1 = backend.push(&record).await.unwrap();
        let ref2 = backend.push(&record).await.unwrap();
        assert_eq!(ref1.cid, ref2.cid);
    }

    #[tokio::test]
    async fn lookup_missing_tag_is_not_found() {
        let (_td, backend) = store();
        let err = backend.lookup(&RecordRef::new("missing")).await.unwrap_err();
        assert!(matches!(err, OciError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_removes_tag() {
        let (_td, backend) = store();
        let record = sample_record();
        let r#ref = backend.push(&record).await.unwrap();
        backend.delete(&r#ref).await.unwrap();
        assert!(matches!(backend.lookup(&r#ref).await, Err(OciError::NotFound(_))));
    }

    #[tokio::test]
    async fn push_and_walk_referrer() {
        let (_td, backend) = store();
        let record = sample_record();
        let r#ref = backend.push(&record).await.unwrap();

        let artifact = ReferrerArtifact::new(ReferrerKind::Signature, b"sig-bytes".to_vec());
        backend.push_referrer(&r#ref, artifact).await.unwrap();

        let referrers = backend.pull_referrers(&r#ref.cid, Some(ReferrerKind::Signature)).await.unwrap();
        assert_eq!(referrers.len(), 1);
        assert_eq!(referrers[0].bytes, b"sig-bytes");
    }
}
