//! Generic filesystem contract implemented by the blob adapter

use crate::metadata::MetadataRecord;
use crate::Result;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};

/// Kind of entry a path refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    /// A readable object
    File,
    /// A container or a key prefix with children
    Directory,
    /// Nothing exists at the path
    NotFound,
}

/// What is known about a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Path in `container/key` form
    pub path: String,
    /// Entry kind
    pub file_type: FileType,
    /// Size in bytes, for files
    pub size: Option<u64>,
    /// Last modification time, when the backend reports one
    pub mtime: Option<DateTime<Utc>>,
}

impl FileInfo {
    /// Info with only a path and type
    pub fn new(path: impl Into<String>, file_type: FileType) -> Self {
        Self {
            path: path.into(),
            file_type,
            size: None,
            mtime: None,
        }
    }

    /// Attach a size
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Attach a modification time
    pub fn with_mtime(mut self, mtime: DateTime<Utc>) -> Self {
        self.mtime = Some(mtime);
        self
    }

    /// Whether this is a file
    pub fn is_file(&self) -> bool {
        self.file_type == FileType::File
    }

    /// Final path component
    pub fn base_name(&self) -> &str {
        let trimmed = self.path.trim_end_matches('/');
        trimmed.rsplit('/').next().unwrap_or(trimmed)
    }
}

/// Token identifying the scheduling context a filesystem and its files belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IoContext {
    external_id: u64,
}

impl IoContext {
    /// A context with a caller-chosen id
    pub fn new(external_id: u64) -> Self {
        Self { external_id }
    }

    /// A context with a fresh, process-unique id
    pub fn unique() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self::new(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The id callers compare for affinity
    pub fn external_id(&self) -> u64 {
        self.external_id
    }
}

impl Default for IoContext {
    fn default() -> Self {
        Self::new(0)
    }
}

/// A sequential stream of bytes
pub trait InputStream: Send + Sync {
    /// Read up to `nbytes`; an empty result means end of stream
    fn read(&self, nbytes: usize) -> Result<Bytes>;

    /// Read into `buf`, returning the number of bytes written
    fn read_into(&self, buf: &mut [u8]) -> Result<usize>;

    /// Current position
    fn tell(&self) -> Result<u64>;

    /// Metadata of the underlying object
    fn read_metadata(&self) -> Result<MetadataRecord>;

    /// Release the stream; later operations fail
    fn close(&self) -> Result<()>;

    /// Whether `close` has been called
    fn closed(&self) -> bool;

    /// Context this stream was opened in
    fn io_context(&self) -> IoContext;
}

/// A seekable stream that also supports positional reads
pub trait RandomAccessFile: InputStream {
    /// Read up to `nbytes` at `position` without moving the cursor
    fn read_at(&self, position: u64, nbytes: usize) -> Result<Bytes>;

    /// Read into `buf` at `position` without moving the cursor
    fn read_at_into(&self, position: u64, buf: &mut [u8]) -> Result<usize>;

    /// Move the cursor
    fn seek(&self, position: u64) -> Result<()>;

    /// Total size in bytes
    fn size(&self) -> Result<u64>;
}

/// A hierarchical, read-only filesystem
pub trait FileSystem: Send + Sync {
    /// Short name of the implementation
    fn type_name(&self) -> &'static str;

    /// Context the filesystem hands to every file it opens
    fn io_context(&self) -> IoContext;

    /// Describe `path`; missing paths produce `FileType::NotFound`, not an error
    fn get_file_info(&self, path: &str) -> Result<FileInfo>;

    /// Immediate children of `path`
    fn list(&self, path: &str) -> Result<Vec<FileInfo>>;

    /// Open `path` for sequential reading
    fn open_input_stream(&self, path: &str) -> Result<Box<dyn InputStream>>;

    /// Open a previously described path for sequential reading
    fn open_input_stream_info(&self, info: &FileInfo) -> Result<Box<dyn InputStream>>;

    /// Open `path` for random access
    fn open_input_file(&self, path: &str) -> Result<Box<dyn RandomAccessFile>>;

    /// Open a previously described path for random access
    fn open_input_file_info(&self, info: &FileInfo) -> Result<Box<dyn RandomAccessFile>>;
}
