//! Tests of the object_store-backed service against in-memory stores

use blobfs::client::ServiceResult;
use blobfs::{
    BlobFileSystem, BlobFsOptions, BlobService, ContainerClient, ErrorKind, FileType, InputStream,
    IoContext, ObjectStoreService, RandomAccessFile, StoreFactory,
};
use blobfs_testing::assertions::assert_error_kind;
use blobfs_testing::LOREM_IPSUM;
use bytes::Bytes;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{Attribute, Attributes, ObjectStore, PutPayload};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// One `InMemory` store per container
#[derive(Debug, Default)]
struct InMemoryFactory {
    stores: Mutex<BTreeMap<String, Arc<InMemory>>>,
}

impl InMemoryFactory {
    fn create_container(&self, container: &str) -> Arc<InMemory> {
        self.stores
            .lock()
            .unwrap()
            .entry(container.to_string())
            .or_insert_with(|| Arc::new(InMemory::new()))
            .clone()
    }
}

impl StoreFactory for InMemoryFactory {
    fn store_for(&self, container: &str) -> ServiceResult<ContainerClient> {
        let stores = self.stores.lock().unwrap();
        match stores.get(container) {
            Some(store) => Ok(ContainerClient::new(store.clone())),
            None => Err(object_store::Error::NotFound {
                path: container.to_string(),
                source: "The specified container does not exist.".into(),
            }),
        }
    }

    fn list_containers(&self) -> ServiceResult<Vec<String>> {
        Ok(self.stores.lock().unwrap().keys().cloned().collect())
    }
}

async fn seed() -> (Arc<InMemoryFactory>, ObjectStoreService) {
    let factory = Arc::new(InMemoryFactory::default());
    let store = factory.create_container("data");

    store
        .put(
            &Path::from("lorem.txt"),
            PutPayload::from(Bytes::from_static(LOREM_IPSUM.as_bytes())),
        )
        .await
        .unwrap();
    store
        .put(&Path::from("dir/a.bin"), PutPayload::from(vec![1u8; 10]))
        .await
        .unwrap();

    let mut attributes = Attributes::new();
    attributes.insert(Attribute::ContentType, "text/html".into());
    attributes.insert(Attribute::CacheControl, "max-age=60".into());
    attributes.insert(Attribute::Metadata("owner".into()), "data-team".into());
    store
        .put_opts(
            &Path::from("index.html"),
            PutPayload::from(Bytes::from_static(b"<html></html>")),
            object_store::PutOptions {
                attributes,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let service = ObjectStoreService::new(factory.clone(), 4).unwrap();
    (factory, service)
}

#[tokio::test]
async fn test_head_and_get_range() {
    let (_, service) = seed().await;

    let properties = service.head("data", "lorem.txt").unwrap();
    assert_eq!(properties.size, LOREM_IPSUM.len() as u64);
    assert_eq!(
        properties.get("content-length"),
        Some(LOREM_IPSUM.len().to_string().as_str())
    );
    assert!(properties.get("Last-Modified").is_some());

    let bytes = service.get_range("data", "lorem.txt", 1..6).unwrap();
    assert_eq!(bytes, "Lorem".as_bytes());
}

#[tokio::test]
async fn test_head_maps_attributes() {
    let (_, service) = seed().await;
    let properties = service.head("data", "index.html").unwrap();
    assert_eq!(properties.get("Content-Type"), Some("text/html"));
    assert_eq!(properties.get("Cache-Control"), Some("max-age=60"));
    assert_eq!(properties.get("x-ms-meta-owner"), Some("data-team"));
}

#[tokio::test]
async fn test_missing_objects_and_containers() {
    let (_, service) = seed().await;
    assert!(matches!(
        service.head("data", "missing"),
        Err(object_store::Error::NotFound { .. })
    ));
    assert!(matches!(
        service.head("nope", "lorem.txt"),
        Err(object_store::Error::NotFound { .. })
    ));
    assert!(service.container_exists("data").unwrap());
    assert!(!service.container_exists("nope").unwrap());
}

#[tokio::test]
async fn test_list_blobs_is_delimited() {
    let (_, service) = seed().await;

    let listing = service.list_blobs("data", "").unwrap();
    assert_eq!(listing.prefixes, ["dir/"]);
    let mut keys: Vec<_> = listing.blobs.iter().map(|b| b.key.as_str()).collect();
    keys.sort_unstable();
    assert_eq!(keys, ["index.html", "lorem.txt"]);

    let nested = service.list_blobs("data", "dir/").unwrap();
    assert!(nested.prefixes.is_empty());
    assert_eq!(nested.blobs.len(), 1);
    assert_eq!(nested.blobs[0].key, "dir/a.bin");
    assert_eq!(nested.blobs[0].size, 10);
}

#[tokio::test]
async fn test_filesystem_over_object_store() {
    let (_, service) = seed().await;
    let fs = BlobFileSystem::from_service(
        BlobFsOptions::azurite(),
        Arc::new(service),
        IoContext::new(7),
    );

    let containers = fs.list("").unwrap();
    assert_eq!(containers.len(), 1);
    assert_eq!(containers[0].path, "data");

    assert_eq!(fs.get_file_info("data/dir").unwrap().file_type, FileType::Directory);
    assert_eq!(
        fs.get_file_info("data/missing").unwrap().file_type,
        FileType::NotFound
    );

    let file = fs.open_input_file("data/lorem.txt").unwrap();
    assert_eq!(file.size().unwrap(), LOREM_IPSUM.len() as u64);
    assert_eq!(file.read_at(1, 5).unwrap(), "Lorem".as_bytes());
    assert_eq!(file.io_context().external_id(), 7);

    let stream = fs.open_input_stream("data/index.html").unwrap();
    let metadata = stream.read_metadata().unwrap();
    assert_eq!(metadata.get("Content-Type"), Some("text/html"));
    assert_eq!(metadata.get("Content-Hash"), Some(""));
    assert_eq!(metadata.get("x-ms-meta-owner"), Some("data-team"));

    assert_error_kind(fs.open_input_stream("data/missing"), ErrorKind::NotFound);
    assert_error_kind(fs.open_input_stream("nope/lorem.txt"), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_reserved_characters_in_blob_names() {
    let factory = Arc::new(InMemoryFactory::default());
    let store = factory.create_container("names");
    let key = "dir/report#1 %20[a]{b}|~^*?.csv";
    store
        .put(
            &Path::parse(key).unwrap(),
            PutPayload::from(Bytes::from_static(b"a,b\n1,2\n")),
        )
        .await
        .unwrap();

    let service = ObjectStoreService::new(factory, 4).unwrap();
    let fs = BlobFileSystem::from_service(
        BlobFsOptions::azurite(),
        Arc::new(service),
        IoContext::default(),
    );

    let entries = fs.list("names/dir").unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path, format!("names/{}", key));

    let stream = fs.open_input_stream(&entries[0].path).unwrap();
    assert_eq!(stream.read(64).unwrap(), "a,b\n1,2\n".as_bytes());
    assert_eq!(
        fs.get_file_info(&format!("names/{}", key)).unwrap().file_type,
        FileType::File
    );
}

#[test]
fn test_store_cache_is_bounded() {
    let factory = Arc::new(InMemoryFactory::default());
    for index in 0..8 {
        factory.create_container(&format!("c{}", index));
    }
    let service = ObjectStoreService::new(factory, 2).unwrap();
    for index in 0..8 {
        assert!(service.container_exists(&format!("c{}", index)).unwrap());
    }
    assert!(format!("{:?}", service).contains("cached_stores: 2"));
}
