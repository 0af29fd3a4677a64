//! An in-process blob service
//!
//! Reports the same property set as Azure block blobs, so everything above
//! the [`BlobService`] boundary behaves as it would against the real service.

use crate::client::{BlobListing, BlobProperties, BlobService, BlobSummary, ServiceResult};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Optional properties attached to a blob when it is stored
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    /// Content type, `application/octet-stream` when unset
    pub content_type: Option<String>,
    /// Extra properties by backend name (`Content-Encoding`, `Cache-Control`, ...)
    pub properties: Vec<(String, String)>,
    /// User metadata, stored as `x-ms-meta-<name>`
    pub user_metadata: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
struct StoredBlob {
    data: Bytes,
    created: DateTime<Utc>,
    last_modified: DateTime<Utc>,
    e_tag: String,
    options: PutOptions,
}

impl StoredBlob {
    fn properties(&self) -> BlobProperties {
        let mut native = vec![(
            "Content-Type".to_string(),
            self.options
                .content_type
                .clone()
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
        )];
        native.extend(self.options.properties.iter().cloned());

        let digest = md5::compute(&self.data);
        let created = self.created.format(HTTP_DATE_FORMAT).to_string();
        native.extend(
            [
                ("Content-MD5", STANDARD.encode(digest.0)),
                (
                    "Last-Modified",
                    self.last_modified.format(HTTP_DATE_FORMAT).to_string(),
                ),
                ("x-ms-creation-time", created.clone()),
                ("x-ms-blob-type", "BlockBlob".to_string()),
                ("x-ms-lease-state", "available".to_string()),
                ("x-ms-lease-status", "unlocked".to_string()),
                ("Content-Length", self.data.len().to_string()),
                ("ETag", self.e_tag.clone()),
                ("x-ms-server-encrypted", "true".to_string()),
                ("x-ms-access-tier", "Hot".to_string()),
                ("x-ms-access-tier-inferred", "true".to_string()),
                ("x-ms-access-tier-change-time", created),
                ("x-ms-legal-hold", "false".to_string()),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v)),
        );
        native.extend(
            self.options
                .user_metadata
                .iter()
                .map(|(k, v)| (format!("x-ms-meta-{}", k), v.clone())),
        );

        BlobProperties {
            size: self.data.len() as u64,
            last_modified: self.last_modified,
            e_tag: Some(self.e_tag.clone()),
            native,
        }
    }
}

/// Blob service holding every container in memory
#[derive(Debug, Default)]
pub struct MemoryService {
    containers: RwLock<BTreeMap<String, BTreeMap<String, StoredBlob>>>,
    version: AtomicU64,
    range_requests: AtomicUsize,
}

fn not_found(path: String) -> object_store::Error {
    object_store::Error::NotFound {
        path,
        source: "The specified resource does not exist.".into(),
    }
}

impl MemoryService {
    /// Create an empty service
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `container`, returning false if it already existed
    pub fn create_container(&self, container: &str) -> bool {
        let mut containers = self.containers.write();
        if containers.contains_key(container) {
            return false;
        }
        containers.insert(container.to_string(), BTreeMap::new());
        true
    }

    /// Store `data` under `key`, replacing any existing blob
    pub fn put_blob(&self, container: &str, key: &str, data: Bytes) -> ServiceResult<()> {
        self.put_blob_with(container, key, data, PutOptions::default())
    }

    /// Store `data` under `key` with explicit properties
    pub fn put_blob_with(
        &self,
        container: &str,
        key: &str,
        data: Bytes,
        options: PutOptions,
    ) -> ServiceResult<()> {
        let mut containers = self.containers.write();
        let blobs = containers
            .get_mut(container)
            .ok_or_else(|| not_found(container.to_string()))?;

        let now = Utc::now();
        let version = self.version.fetch_add(1, Ordering::Relaxed) + 1;
        let created = blobs.get(key).map(|blob| blob.created).unwrap_or(now);
        blobs.insert(
            key.to_string(),
            StoredBlob {
                data,
                created,
                last_modified: now,
                e_tag: format!("\"0x8DC{:013X}\"", version),
                options,
            },
        );
        Ok(())
    }

    /// Number of ranged fetches served so far
    pub fn range_requests(&self) -> usize {
        self.range_requests.load(Ordering::Relaxed)
    }

    fn with_blob<T>(
        &self,
        container: &str,
        key: &str,
        f: impl FnOnce(&StoredBlob) -> T,
    ) -> ServiceResult<T> {
        let containers = self.containers.read();
        let blob = containers
            .get(container)
            .and_then(|blobs| blobs.get(key))
            .ok_or_else(|| not_found(format!("{}/{}", container, key)))?;
        Ok(f(blob))
    }
}

impl BlobService for MemoryService {
    fn container_exists(&self, container: &str) -> ServiceResult<bool> {
        Ok(self.containers.read().contains_key(container))
    }

    fn list_containers(&self) -> ServiceResult<Vec<String>> {
        Ok(self.containers.read().keys().cloned().collect())
    }

    fn list_blobs(&self, container: &str, prefix: &str) -> ServiceResult<BlobListing> {
        let containers = self.containers.read();
        let blobs = containers
            .get(container)
            .ok_or_else(|| not_found(container.to_string()))?;

        let mut prefixes = BTreeSet::new();
        let mut listing = BlobListing::default();
        for (key, blob) in blobs.range(prefix.to_string()..) {
            let Some(rest) = key.strip_prefix(prefix) else {
                break;
            };
            match rest.find('/') {
                Some(idx) => {
                    prefixes.insert(format!("{}{}", prefix, &rest[..=idx]));
                }
                None => listing.blobs.push(BlobSummary {
                    key: key.clone(),
                    size: blob.data.len() as u64,
                    last_modified: blob.last_modified,
                }),
            }
        }
        listing.prefixes = prefixes.into_iter().collect();
        Ok(listing)
    }

    fn head(&self, container: &str, key: &str) -> ServiceResult<BlobProperties> {
        self.with_blob(container, key, StoredBlob::properties)
    }

    fn get_range(&self, container: &str, key: &str, range: Range<u64>) -> ServiceResult<Bytes> {
        self.range_requests.fetch_add(1, Ordering::Relaxed);
        self.with_blob(container, key, |blob| {
            let len = blob.data.len() as u64;
            let start = range.start.min(len);
            let end = range.end.min(len).max(start);
            blob.data.slice(start as usize..end as usize)
        })
    }
}
