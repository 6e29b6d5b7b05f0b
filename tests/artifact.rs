//! Artifact Cache Integration Tests
//!
//! Exercises the verify-then-cache protocol with a stub transport: a valid
//! cached jar must never hit the network, anything else triggers exactly
//! one transfer, and bad remote bytes are a fatal integrity error.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use pumlgen::artifact::{file_sha256, AcquireError, ArtifactCache, ArtifactSpec, Transport};
use tempfile::TempDir;

const PAYLOAD: &[u8] = b"plantuml jar payload";

// SHA-256 of PAYLOAD
const PAYLOAD_SHA256: &str = "47b9b362b90b1a8dda195a0a05e17e544af555cbb30052b61adb223c5bb3e671";

const SPEC: ArtifactSpec = ArtifactSpec {
    url: "https://example.invalid/plantuml.jar",
    sha256: PAYLOAD_SHA256,
};

/// Serves fixed bytes and counts how many transfers were requested.
struct FixedTransport {
    payload: Vec<u8>,
    fetches: Arc<AtomicUsize>,
}

impl FixedTransport {
    fn new(payload: &[u8]) -> (Self, Arc<AtomicUsize>) {
        let fetches = Arc::new(AtomicUsize::new(0));
        (
            Self {
                payload: payload.to_vec(),
                fetches: Arc::clone(&fetches),
            },
            fetches,
        )
    }
}

#[async_trait]
impl Transport for FixedTransport {
    async fn fetch(&self, _url: &str, dest: &Path) -> anyhow::Result<()> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        tokio::fs::write(dest, &self.payload).await?;
        Ok(())
    }
}

#[tokio::test]
async fn test_valid_cache_skips_transfer() {
    let dir = TempDir::new().unwrap();
    let jar = dir.path().join("plantuml.jar");
    tokio::fs::write(&jar, PAYLOAD).await.unwrap();

    let (transport, fetches) = FixedTransport::new(PAYLOAD);
    let cache = ArtifactCache::with_transport(transport);

    let handle = cache.acquire(&SPEC, &jar).await.unwrap();
    assert_eq!(handle, jar);
    assert_eq!(fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_file_triggers_one_transfer() {
    let dir = TempDir::new().unwrap();
    let jar = dir.path().join("plantuml.jar");

    let (transport, fetches) = FixedTransport::new(PAYLOAD);
    let cache = ArtifactCache::with_transport(transport);

    let handle = cache.acquire(&SPEC, &jar).await.unwrap();
    assert_eq!(handle, jar);
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
    assert_eq!(tokio::fs::read(&jar).await.unwrap(), PAYLOAD);
}

#[tokio::test]
async fn test_corrupt_cache_is_refetched() {
    let dir = TempDir::new().unwrap();
    let jar = dir.path().join("plantuml.jar");
    tokio::fs::write(&jar, b"truncated garbage").await.unwrap();

    let (transport, fetches) = FixedTransport::new(PAYLOAD);
    let cache = ArtifactCache::with_transport(transport);

    // Wrong digest on disk, good bytes remote: one transfer, no error
    let handle = cache.acquire(&SPEC, &jar).await.unwrap();
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
    assert_eq!(file_sha256(&handle).await.unwrap(), PAYLOAD_SHA256);
}

#[tokio::test]
async fn test_bad_remote_bytes_fail_integrity() {
    let dir = TempDir::new().unwrap();
    let jar = dir.path().join("plantuml.jar");

    let (transport, fetches) = FixedTransport::new(b"not the artifact");
    let cache = ArtifactCache::with_transport(transport);

    let err = cache.acquire(&SPEC, &jar).await.unwrap_err();
    assert!(matches!(err, AcquireError::Integrity { .. }));
    // Exactly one attempt, never retried
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_acquire_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let jar = dir.path().join("plantuml.jar");

    let (transport, fetches) = FixedTransport::new(PAYLOAD);
    let cache = ArtifactCache::with_transport(transport);

    // First call fetches, second call verifies the cache and stops there
    cache.acquire(&SPEC, &jar).await.unwrap();
    cache.acquire(&SPEC, &jar).await.unwrap();
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

/// Transport that fails without writing anything.
struct BrokenTransport;

#[async_trait]
impl Transport for BrokenTransport {
    async fn fetch(&self, url: &str, _dest: &Path) -> anyhow::Result<()> {
        anyhow::bail!("connection refused: {}", url)
    }
}

#[tokio::test]
async fn test_failed_transfer_leaves_no_cache_file() {
    let dir = TempDir::new().unwrap();
    let jar = dir.path().join("plantuml.jar");

    let cache = ArtifactCache::with_transport(BrokenTransport);
    let err = cache.acquire(&SPEC, &jar).await.unwrap_err();
    assert!(matches!(err, AcquireError::Transfer { .. }));

    // The temp-write/rename protocol must not leave partial bytes behind
    assert!(!jar.exists());
}
