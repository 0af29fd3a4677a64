//! The backend capability consumed by the filesystem
//!
//! A [`BlobService`] knows how to talk to one storage account. It performs
//! blocking calls and reports failures as `object_store` errors; the
//! filesystem layer translates those before they reach callers.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fmt;
use std::ops::Range;

/// Result type of backend calls
pub type ServiceResult<T> = std::result::Result<T, object_store::Error>;

/// Properties of a single blob as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobProperties {
    /// Size of the blob in bytes
    pub size: u64,
    /// Last modification time
    pub last_modified: DateTime<Utc>,
    /// Entity tag, if the backend reports one
    pub e_tag: Option<String>,
    /// Backend-native properties, by their backend names (e.g. `x-ms-blob-type`)
    pub native: Vec<(String, String)>,
}

impl BlobProperties {
    /// Look up a native property, ignoring ASCII case
    pub fn get(&self, name: &str) -> Option<&str> {
        self.native
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A blob seen while listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobSummary {
    /// Full key of the blob within its container
    pub key: String,
    /// Size in bytes
    pub size: u64,
    /// Last modification time
    pub last_modified: DateTime<Utc>,
}

/// One level of a delimited listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobListing {
    /// Common prefixes, each ending in `/`
    pub prefixes: Vec<String>,
    /// Blobs directly under the listed prefix
    pub blobs: Vec<BlobSummary>,
}

impl BlobListing {
    /// Whether the listing found nothing at all
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty() && self.blobs.is_empty()
    }
}

/// Blocking access to one storage account
pub trait BlobService: fmt::Debug + Send + Sync {
    /// Whether `container` exists
    fn container_exists(&self, container: &str) -> ServiceResult<bool>;

    /// Names of every container in the account
    fn list_containers(&self) -> ServiceResult<Vec<String>>;

    /// Delimited listing of `container` under `prefix` (empty or ending in `/`)
    fn list_blobs(&self, container: &str, prefix: &str) -> ServiceResult<BlobListing>;

    /// Properties of a blob
    fn head(&self, container: &str, key: &str) -> ServiceResult<BlobProperties>;

    /// Bytes `range` of a blob; the range must lie within the blob
    fn get_range(&self, container: &str, key: &str, range: Range<u64>) -> ServiceResult<Bytes>;
}
