//! Testing utilities and fixtures for blobfs
//!
//! This crate provides an in-memory storage account seeded the same way for
//! every test, random content generators, assertions on blobfs errors, and a
//! local HTTP server standing in for the Blob service endpoint.

use anyhow::Result;
use blobfs::{BlobFileSystem, BlobFsOptions, IoContext, MemoryService};
use bytes::Bytes;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

pub mod assertions;
pub mod fixtures;
pub mod http;

pub use fixtures::{random_chars, random_line, random_lines, LOREM_IPSUM};

/// Key of the object every [`TestAccount`] starts with
pub const PREEXISTING_OBJECT_NAME: &str = "test-object-name";

/// An in-memory storage account with one container holding [`LOREM_IPSUM`]
pub struct TestAccount {
    service: Arc<MemoryService>,
    fs: BlobFileSystem,
    container: String,
    rng: StdRng,
}

impl TestAccount {
    /// Creates an account with a randomly named container
    pub fn new() -> Result<Self> {
        Self::with_options(BlobFsOptions::azurite())
    }

    /// Creates an account whose filesystem uses `options`
    pub fn with_options(options: BlobFsOptions) -> Result<Self> {
        let mut rng = StdRng::from_entropy();
        let container = random_chars(&mut rng, 32);

        let service = Arc::new(MemoryService::new());
        service.create_container(&container);
        service.put_blob(
            &container,
            PREEXISTING_OBJECT_NAME,
            Bytes::from_static(LOREM_IPSUM.as_bytes()),
        )?;

        let fs = BlobFileSystem::from_service(options, service.clone(), IoContext::unique());
        Ok(Self {
            service,
            fs,
            container,
            rng,
        })
    }

    /// The filesystem under test
    pub fn fs(&self) -> &BlobFileSystem {
        &self.fs
    }

    /// The backing service, for seeding and request counting
    pub fn service(&self) -> &Arc<MemoryService> {
        &self.service
    }

    /// Random generator shared by this account's helpers
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Name of the preexisting container
    pub fn container_name(&self) -> &str {
        &self.container
    }

    /// The container path with a trailing separator, e.g. `abc/`
    pub fn container_path(&self) -> String {
        format!("{}/", self.container)
    }

    /// Path of the preexisting object
    pub fn object_path(&self) -> String {
        format!("{}{}", self.container_path(), PREEXISTING_OBJECT_NAME)
    }

    /// A path in the preexisting container that does not exist
    pub fn not_found_object_path(&self) -> String {
        format!("{}not-found", self.container_path())
    }

    /// Upload `data` under `key` in the preexisting container, returning its path
    pub fn upload(&self, key: &str, data: impl Into<Bytes>) -> Result<String> {
        self.service.put_blob(&self.container, key, data.into())?;
        Ok(format!("{}{}", self.container_path(), key))
    }

    /// Upload `lines` concatenated under `key`, returning its path
    pub fn upload_lines(&self, key: &str, lines: &[String]) -> Result<String> {
        self.upload(key, lines.concat())
    }
}

impl std::fmt::Debug for TestAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestAccount")
            .field("container", &self.container)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobfs::{FileType, InputStream};

    #[test]
    fn test_account_is_seeded() {
        let account = TestAccount::new().unwrap();
        assert_eq!(account.container_name().len(), 32);

        let info = account.fs().get_file_info(&account.object_path()).unwrap();
        assert_eq!(info.file_type, FileType::File);
        assert_eq!(info.size, Some(LOREM_IPSUM.len() as u64));
    }

    #[test]
    fn test_upload_lines() {
        let mut account = TestAccount::new().unwrap();
        let lines = random_lines(account.rng(), 3, 10);
        let path = account.upload_lines("lines.txt", &lines).unwrap();

        let stream = account.fs().open_input_stream(&path).unwrap();
        assert_eq!(stream.read(100).unwrap(), lines.concat().as_bytes());
    }
}
