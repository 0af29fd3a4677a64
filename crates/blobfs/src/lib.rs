//! # blobfs
//!
//! A read-only filesystem adapter for Azure Blob Storage. This crate exposes
//! containers and blobs through a small hierarchical filesystem contract
//! (`FileSystem`, `InputStream`, `RandomAccessFile`) with synchronous reads,
//! so callers never deal with the async client underneath.
//!
//! ## Architecture
//!
//! The main abstractions are:
//! - `BlobFileSystem`: the facade; resolves paths, stats, lists and opens blobs
//! - `BlobInputStream` / `BlobRandomAccessFile`: buffered sequential and positional readers
//! - `BlobService`: the backend capability, implemented over `object_store`
//!   plus direct REST property requests (`ObjectStoreService`) or in memory
//!   (`MemoryService`)
//!
//! Backend failures are translated into a four-kind taxonomy (`ErrorKind`)
//! before they reach callers.
//!
//! ```no_run
//! use blobfs::{BlobFileSystem, BlobFsOptions, InputStream};
//!
//! # fn main() -> blobfs::Result<()> {
//! let fs = BlobFileSystem::make(BlobFsOptions::azurite())?;
//! let stream = fs.open_input_stream("container/path/to/object")?;
//! let head = stream.read(1024)?;
//! println!("{} bytes", head.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

mod buffer;
pub mod client;
pub mod config;
pub mod credentials;
mod error;
pub mod filesystem;
pub mod fs;
pub mod memory;
pub mod metadata;
pub mod object_store_service;
pub mod path;
mod reader;
pub mod rest;
mod runtime;

pub use client::{BlobListing, BlobProperties, BlobService, BlobSummary};
pub use config::{Backend, BlobFsOptions};
pub use credentials::{Credential, SigningCapability};
pub use error::{BlobFsError, ErrorKind, Result};
pub use filesystem::BlobFileSystem;
pub use fs::{FileInfo, FileSystem, FileType, InputStream, IoContext, RandomAccessFile};
pub use memory::{MemoryService, PutOptions};
pub use metadata::MetadataRecord;
pub use object_store_service::{
    AzureStoreFactory, ContainerClient, ObjectStoreService, StoreFactory,
};
pub use path::StoragePath;
pub use reader::{BlobInputStream, BlobRandomAccessFile};
