//! The filesystem facade over a blob service

use crate::client::{BlobListing, BlobService, ServiceResult};
use crate::config::BlobFsOptions;
use crate::credentials::SigningCapability;
use crate::error::translate;
use crate::fs::{FileInfo, FileSystem, FileType, InputStream, IoContext, RandomAccessFile};
use crate::object_store_service::{AzureStoreFactory, ObjectStoreService};
use crate::path::{is_root, StoragePath};
use crate::reader::{BlobInputStream, BlobRandomAccessFile, ObjectHandle};
use crate::{BlobFsError, Result};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// A read-only filesystem view of one storage account.
///
/// Containers appear as top-level directories and key prefixes as nested
/// directories. Every file opened holds a reference to the service client,
/// so the client lives as long as the longest-lived file.
pub struct BlobFileSystem {
    options: BlobFsOptions,
    service: Arc<dyn BlobService>,
    io_context: IoContext,
}

impl BlobFileSystem {
    /// Build a filesystem for the account described by `options`
    ///
    /// # Errors
    /// Returns `InvalidArgument` if the options fail validation, or `Io` if the
    /// client runtime cannot be started.
    pub fn make(options: BlobFsOptions) -> Result<Self> {
        Self::make_with_context(options, IoContext::default())
    }

    /// Like [`make`](Self::make), tagging every opened file with `io_context`
    pub fn make_with_context(options: BlobFsOptions, io_context: IoContext) -> Result<Self> {
        options.validate()?;

        let credential: Arc<dyn SigningCapability> = Arc::new(options.credential.clone());
        let factory = Arc::new(AzureStoreFactory::new(options.clone(), credential));
        let service = ObjectStoreService::new(factory, options.store_cache_size)?;

        info!(
            backend = ?options.backend,
            endpoint = %options.account_blob_url(),
            "Created blob filesystem"
        );
        Ok(Self::from_service(options, Arc::new(service), io_context))
    }

    /// Build a filesystem over an existing service, bypassing client construction
    pub fn from_service(
        options: BlobFsOptions,
        service: Arc<dyn BlobService>,
        io_context: IoContext,
    ) -> Self {
        Self {
            options,
            service,
            io_context,
        }
    }

    /// The options this filesystem was built from
    pub fn options(&self) -> &BlobFsOptions {
        &self.options
    }

    /// The shared service client
    pub fn service(&self) -> &Arc<dyn BlobService> {
        &self.service
    }

    /// Whether both filesystems were configured identically
    pub fn equals(&self, other: &BlobFileSystem) -> bool {
        self.options == other.options
    }

    /// The scheduling context handed to every opened file
    pub fn io_context(&self) -> IoContext {
        self.io_context
    }

    fn open_handle(&self, raw: &str, known_size: Option<u64>) -> Result<ObjectHandle> {
        let path = StoragePath::parse(raw)?;
        path.require_object()?;

        let size = match known_size {
            Some(size) => Some(size),
            None => {
                let properties = self
                    .service
                    .head(path.container(), path.key())
                    .map_err(|e| translate(e, &format!("open {}", path)))?;
                Some(properties.size)
            }
        };

        debug!(path = %path, size, "Opened blob");
        Ok(ObjectHandle::new(
            self.service.clone(),
            path,
            self.io_context,
            self.options.read_buffer_size,
            size,
        ))
    }

    fn open_handle_info(&self, info: &FileInfo) -> Result<ObjectHandle> {
        StoragePath::parse(&info.path)?.require_object()?;
        match info.file_type {
            FileType::NotFound => Err(BlobFsError::NotFound(format!(
                "'{}' does not exist",
                info.path
            ))),
            FileType::Directory => Err(BlobFsError::InvalidArgument(format!(
                "'{}' is a directory, not a file",
                info.path
            ))),
            FileType::File => self.open_handle(&info.path, info.size),
        }
    }

    /// Open `path` for sequential reading; the object must exist
    pub fn open_input_stream(&self, path: &str) -> Result<BlobInputStream> {
        self.open_handle(path, None).map(BlobInputStream::new)
    }

    /// Open a described file for sequential reading.
    ///
    /// A `File` info with a known size is trusted and opened without a round-trip.
    pub fn open_input_stream_info(&self, info: &FileInfo) -> Result<BlobInputStream> {
        self.open_handle_info(info).map(BlobInputStream::new)
    }

    /// Open `path` for random access; the object must exist
    pub fn open_input_file(&self, path: &str) -> Result<BlobRandomAccessFile> {
        self.open_handle(path, None).map(BlobRandomAccessFile::new)
    }

    /// Open a described file for random access
    pub fn open_input_file_info(&self, info: &FileInfo) -> Result<BlobRandomAccessFile> {
        self.open_handle_info(info).map(BlobRandomAccessFile::new)
    }

    /// Describe `path`, simulating directories from key prefixes
    pub fn get_file_info(&self, raw: &str) -> Result<FileInfo> {
        if is_root(raw) {
            return Ok(FileInfo::new("", FileType::Directory));
        }

        let path = StoragePath::parse(raw)?;
        let display = path.to_string().trim_end_matches('/').to_string();

        if path.is_container() {
            let exists = self
                .service
                .container_exists(path.container())
                .map_err(|e| translate(e, &format!("stat {}", path)))?;
            let file_type = if exists {
                FileType::Directory
            } else {
                FileType::NotFound
            };
            return Ok(FileInfo::new(display, file_type));
        }

        if !path.is_prefix() {
            match self.service.head(path.container(), path.key()) {
                Ok(properties) => {
                    return Ok(FileInfo::new(display, FileType::File)
                        .with_size(properties.size)
                        .with_mtime(properties.last_modified));
                }
                Err(object_store::Error::NotFound { .. }) => {}
                Err(e) => return Err(translate(e, &format!("stat {}", path))),
            }
        }

        let has_children = match self.list_children(&path) {
            Ok(listing) => !listing.is_empty(),
            Err(object_store::Error::NotFound { .. }) => false,
            Err(e) => return Err(translate(e, &format!("stat {}", path))),
        };
        let file_type = if has_children {
            FileType::Directory
        } else {
            FileType::NotFound
        };
        Ok(FileInfo::new(display, file_type))
    }

    /// Immediate children of a container or directory; the root lists containers
    pub fn list(&self, raw: &str) -> Result<Vec<FileInfo>> {
        if is_root(raw) {
            let containers = self
                .service
                .list_containers()
                .map_err(|e| translate(e, "list containers"))?;
            return Ok(containers
                .into_iter()
                .map(|name| FileInfo::new(name, FileType::Directory))
                .collect());
        }

        let path = StoragePath::parse(raw)?;
        let listing = self
            .list_children(&path)
            .map_err(|e| translate(e, &format!("list {}", path)))?;

        if listing.is_empty() && !path.is_container() {
            return match self.get_file_info(raw)?.file_type {
                FileType::File => Err(BlobFsError::InvalidArgument(format!(
                    "'{}' is a file, not a directory",
                    path
                ))),
                _ => Err(BlobFsError::NotFound(format!("'{}' does not exist", path))),
            };
        }

        let own_prefix = path.child_prefix();
        let container = path.container();
        let mut entries: Vec<FileInfo> = listing
            .prefixes
            .iter()
            .map(|prefix| {
                FileInfo::new(
                    format!("{}/{}", container, prefix.trim_end_matches('/')),
                    FileType::Directory,
                )
            })
            .collect();
        entries.extend(
            listing
                .blobs
                .iter()
                .filter(|blob| blob.key != own_prefix)
                .map(|blob| {
                    FileInfo::new(format!("{}/{}", container, blob.key), FileType::File)
                        .with_size(blob.size)
                        .with_mtime(blob.last_modified)
                }),
        );
        Ok(entries)
    }

    fn list_children(&self, path: &StoragePath) -> ServiceResult<BlobListing> {
        self.service
            .list_blobs(path.container(), &path.child_prefix())
    }
}

impl fmt::Debug for BlobFileSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobFileSystem")
            .field("options", &self.options)
            .field("service", &self.service)
            .field("io_context", &self.io_context)
            .finish()
    }
}

impl FileSystem for BlobFileSystem {
    fn type_name(&self) -> &'static str {
        "abfs"
    }

    fn io_context(&self) -> IoContext {
        self.io_context
    }

    fn get_file_info(&self, path: &str) -> Result<FileInfo> {
        BlobFileSystem::get_file_info(self, path)
    }

    fn list(&self, path: &str) -> Result<Vec<FileInfo>> {
        BlobFileSystem::list(self, path)
    }

    fn open_input_stream(&self, path: &str) -> Result<Box<dyn InputStream>> {
        Ok(Box::new(BlobFileSystem::open_input_stream(self, path)?))
    }

    fn open_input_stream_info(&self, info: &FileInfo) -> Result<Box<dyn InputStream>> {
        Ok(Box::new(BlobFileSystem::open_input_stream_info(self, info)?))
    }

    fn open_input_file(&self, path: &str) -> Result<Box<dyn RandomAccessFile>> {
        Ok(Box::new(BlobFileSystem::open_input_file(self, path)?))
    }

    fn open_input_file_info(&self, info: &FileInfo) -> Result<Box<dyn RandomAccessFile>> {
        Ok(Box::new(BlobFileSystem::open_input_file_info(self, info)?))
    }
}
