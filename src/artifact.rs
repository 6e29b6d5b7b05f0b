//! PlantUML jar acquisition with a digest-verified local cache.
//!
//! [`ArtifactCache::acquire`] is idempotent and safe to call on every hook
//! invocation: a cached jar whose SHA-256 matches the pinned digest is
//! returned without touching the network; a missing or corrupt jar triggers
//! exactly one transfer. The transfer writes to a temporary file in the
//! cache directory and renames it into place only once the bytes are on
//! disk, so an interrupted download never leaves partial bytes at the cache
//! path.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

/// Pinned PlantUML release.
pub const PLANTUML_DIST: ArtifactSpec = ArtifactSpec {
    url: "https://github.com/plantuml/plantuml/releases/download/v1.2022.6/plantuml-1.2022.6.jar",
    sha256: "204def7102790f55d4adad7756b9c1c19cefcb16e7f7fbc056abb40f8cbe4eae",
};

/// A versioned remote artifact and its expected digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactSpec {
    /// Remote location of the artifact.
    pub url: &'static str,

    /// Lowercase hex SHA-256 of the artifact bytes.
    pub sha256: &'static str,
}

/// Errors from artifact acquisition. All are fatal to the run; none is
/// retried.
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("transfer from {url} failed: {source}")]
    Transfer {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("digest mismatch for {path}: expected {expected}, got {actual}")]
    Integrity {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Transport seam for fetching artifact bytes to a local file.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch `url` into `dest`, overwriting any existing content.
    async fn fetch(&self, url: &str, dest: &Path) -> anyhow::Result<()>;
}

/// HTTP transport backed by reqwest, streaming the response body to disk.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str, dest: &Path) -> anyhow::Result<()> {
        use anyhow::Context;
        use tokio::io::AsyncWriteExt;

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("request to {} failed", url))?
            .error_for_status()
            .context("server returned an error status")?;

        let mut file = tokio::fs::File::create(dest)
            .await
            .with_context(|| format!("failed to create {}", dest.display()))?;

        while let Some(chunk) = response
            .chunk()
            .await
            .context("failed to read response body")?
        {
            file.write_all(&chunk)
                .await
                .context("failed to write artifact bytes")?;
        }
        file.flush().await.context("failed to flush artifact file")?;

        Ok(())
    }
}

/// Digest-verified cache for a single artifact version.
pub struct ArtifactCache<T: Transport> {
    transport: T,
}

impl ArtifactCache<HttpTransport> {
    /// Cache backed by the default HTTP transport.
    pub fn new() -> Self {
        Self::with_transport(HttpTransport::new())
    }
}

impl Default for ArtifactCache<HttpTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> ArtifactCache<T> {
    /// Cache with a custom transport (used by tests).
    pub fn with_transport(transport: T) -> Self {
        Self { transport }
    }

    /// Resolve a verified local path for `spec`, fetching if needed.
    ///
    /// The returned path is only handed out after its digest has been
    /// verified in this call; a cached copy is never trusted across
    /// processes without re-verification.
    pub async fn acquire(
        &self,
        spec: &ArtifactSpec,
        local_path: &Path,
    ) -> Result<PathBuf, AcquireError> {
        if local_path.exists() {
            let digest = file_sha256(local_path).await?;
            if digest == spec.sha256 {
                debug!(path = %local_path.display(), "cached artifact is valid");
                return Ok(local_path.to_path_buf());
            }
            info!(path = %local_path.display(), "cached artifact failed verification, refetching");
        }

        self.transfer(spec, local_path).await?;

        let digest = file_sha256(local_path).await?;
        if digest != spec.sha256 {
            return Err(AcquireError::Integrity {
                path: local_path.to_path_buf(),
                expected: spec.sha256.to_string(),
                actual: digest,
            });
        }

        Ok(local_path.to_path_buf())
    }

    /// Fetch to a temp file in the cache directory, then rename into place.
    async fn transfer(&self, spec: &ArtifactSpec, local_path: &Path) -> Result<(), AcquireError> {
        info!(url = spec.url, "downloading artifact");

        let dir = local_path.parent().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "cache path has no parent directory",
            )
        })?;
        tokio::fs::create_dir_all(dir).await?;

        // Same directory as the final path, so the rename is atomic.
        let tmp = NamedTempFile::new_in(dir)?;
        self.transport
            .fetch(spec.url, tmp.path())
            .await
            .map_err(|source| AcquireError::Transfer {
                url: spec.url.to_string(),
                source,
            })?;

        tmp.persist(local_path).map_err(|e| e.error)?;
        Ok(())
    }
}

/// SHA-256 of a file's contents, streamed in 4096-byte chunks so memory use
/// stays bounded regardless of artifact size.
pub async fn file_sha256(path: &Path) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 4096];

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}
