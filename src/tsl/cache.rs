//! Local copies of trusted lists and change detection
//!
//! Each list is stored as `<TERRITORY>-<url hash>.xml` with a JSON sidecar
//! holding the ETag it was served with and the SHA-256 of the copy that ETag
//! describes. Writes go through a temporary file and a rename so readers
//! never observe a partial copy, and a sidecar that does not describe the
//! copy next to it is ignored.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ring::digest::{SHA256, digest};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::constants::{DIGEST_EXTENSION, ETAG_SIDECAR_EXTENSION};
use super::errors::TslResult;
use super::fetcher::{FetchRequest, FetchResponse, Fetcher};

/// Outcome of comparing content with its published digest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestCheck {
    Match,
    Mismatch,
    /// No digest is published or it could not be retrieved
    Unavailable,
}

/// Result of a conditional request against the cached copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revalidation {
    /// The server confirmed the cached copy, returned as read
    Fresh { cached: Vec<u8> },
    /// The server sent a different document
    Changed { body: Vec<u8>, etag: Option<String> },
    /// Nothing cached to compare against, or the request failed
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheMetadata {
    url: String,
    etag: Option<String>,
    /// Hex SHA-256 of the cached copy
    sha256: String,
    fetched_at: DateTime<Utc>,
}

/// On-disk cache of downloaded trusted lists
#[derive(Clone)]
pub struct DigestCache {
    dir: PathBuf,
    fetcher: Arc<dyn Fetcher>,
}

impl DigestCache {
    pub fn new(dir: impl Into<PathBuf>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            dir: dir.into(),
            fetcher,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn fetcher(&self) -> &Arc<dyn Fetcher> {
        &self.fetcher
    }

    /// Cache file of the list published at `url` for `territory`
    pub fn cache_path(&self, territory: &str, url: &str) -> PathBuf {
        self.dir.join(format!("{}.xml", cache_stem(territory, url)))
    }

    fn metadata_path(&self, territory: &str, url: &str) -> PathBuf {
        self.dir
            .join(format!("{}.xml.{ETAG_SIDECAR_EXTENSION}", cache_stem(territory, url)))
    }

    /// Cached copy, if one exists
    pub async fn read_cached(&self, territory: &str, url: &str) -> TslResult<Option<Vec<u8>>> {
        let path = self.cache_path(territory, url);
        match fs::read(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_metadata(&self, territory: &str, url: &str) -> Option<CacheMetadata> {
        let path = self.metadata_path(territory, url);
        let content = fs::read_to_string(&path).await.ok()?;
        match serde_json::from_str(&content) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!("Ignoring unreadable cache metadata {}: {e}", path.display());
                None
            }
        }
    }

    /// Store `content` and its ETag atomically
    pub async fn store(
        &self,
        territory: &str,
        url: &str,
        content: &[u8],
        etag: Option<String>,
    ) -> TslResult<()> {
        fs::create_dir_all(&self.dir).await?;

        let metadata = CacheMetadata {
            url: url.to_string(),
            etag,
            sha256: hex::encode(digest(&SHA256, content)),
            fetched_at: Utc::now(),
        };
        let metadata_json = serde_json::to_vec_pretty(&metadata)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        self.write_atomic(&self.cache_path(territory, url), content)
            .await?;
        self.write_atomic(&self.metadata_path(territory, url), &metadata_json)
            .await?;

        info!("Cached {url} for {territory}");
        Ok(())
    }

    async fn write_atomic(&self, path: &Path, content: &[u8]) -> TslResult<()> {
        let temp_path = self.dir.join(format!(".{}.tmp", Uuid::new_v4()));
        fs::write(&temp_path, content).await?;
        if let Err(e) = fs::rename(&temp_path, path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Send a conditional request for the cached copy of `url`.
    pub async fn revalidate(&self, territory: &str, url: &str, timeout: Duration) -> Revalidation {
        let Ok(Some(cached)) = self.read_cached(territory, url).await else {
            return Revalidation::Unknown;
        };
        let Some(metadata) = self.read_metadata(territory, url).await else {
            return Revalidation::Unknown;
        };
        if metadata.sha256 != hex::encode(digest(&SHA256, &cached)) {
            debug!("Cache metadata of {url} belongs to another copy");
            return Revalidation::Unknown;
        }
        let Some(etag) = metadata.etag else {
            debug!("No ETag cached for {url}");
            return Revalidation::Unknown;
        };

        let request = FetchRequest::new(url, timeout).with_etag(Some(etag.clone()));
        match self.fetcher.fetch(&request).await {
            Ok(FetchResponse::NotModified) => Revalidation::Fresh { cached },
            Ok(FetchResponse::Content {
                etag: Some(served), ..
            }) if served == etag => Revalidation::Fresh { cached },
            Ok(FetchResponse::Content { body, etag }) => Revalidation::Changed { body, etag },
            Err(e) => {
                debug!("Freshness check of {url} failed: {e}");
                Revalidation::Unknown
            }
        }
    }

    /// Returns true when the cached copy of `url` is still current.
    pub async fn check_freshness(&self, territory: &str, url: &str, timeout: Duration) -> bool {
        matches!(
            self.revalidate(territory, url, timeout).await,
            Revalidation::Fresh { .. }
        )
    }

    /// Compare `content` with the digest published next to `url`.
    pub async fn verify_digest(&self, url: &str, content: &[u8], timeout: Duration) -> DigestCheck {
        let digest_location = digest_url(url);
        let published = match self
            .fetcher
            .fetch(&FetchRequest::new(&digest_location, timeout))
            .await
        {
            Ok(FetchResponse::Content { body, .. }) => body,
            Ok(FetchResponse::NotModified) => return DigestCheck::Unavailable,
            Err(e) => {
                debug!("No digest available at {digest_location}: {e}");
                return DigestCheck::Unavailable;
            }
        };

        let Some(expected) = decode_published_digest(&published) else {
            warn!("Unrecognised digest format at {digest_location}");
            return DigestCheck::Unavailable;
        };

        if digest(&SHA256, content).as_ref() == expected.as_slice() {
            DigestCheck::Match
        } else {
            DigestCheck::Mismatch
        }
    }
}

/// Location of the digest published next to a list: the extension of the
/// last path segment is replaced by `.sha2`.
pub fn digest_url(url: &str) -> String {
    let path_end = url.find(['?', '#']).unwrap_or(url.len());
    let (path, suffix) = url.split_at(path_end);
    let segment_start = path.rfind('/').map_or(0, |i| i + 1);
    let stem = match path[segment_start..].rfind('.') {
        Some(dot) => &path[..segment_start + dot],
        None => path,
    };
    format!("{stem}.{DIGEST_EXTENSION}{suffix}")
}

/// A published digest is either 32 raw bytes or their hex form.
fn decode_published_digest(published: &[u8]) -> Option<Vec<u8>> {
    let digest_len = SHA256.output_len();
    if published.len() == digest_len {
        return Some(published.to_vec());
    }
    let text = std::str::from_utf8(published).ok()?;
    let decoded = hex::decode(text.trim()).ok()?;
    (decoded.len() == digest_len).then_some(decoded)
}

fn cache_stem(territory: &str, url: &str) -> String {
    let url_hash = digest(&SHA256, url.as_bytes());
    format!(
        "{}-{}",
        territory.to_uppercase(),
        &hex::encode(url_hash.as_ref())[..16]
    )
}
