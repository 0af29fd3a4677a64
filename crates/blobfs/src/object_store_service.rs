//! [`BlobService`] implemented on top of `object_store`
//!
//! `object_store` addresses one container per store, so the service keeps a
//! small LRU of per-container clients produced by a [`StoreFactory`]. Async
//! calls are driven on the shared runtime and appear blocking to callers.
//!
//! Azure containers also carry a [`BlobRestClient`]: blob properties and
//! container existence come from the REST API, which reports every property
//! header and answers 404 for a missing container.

use crate::client::{BlobListing, BlobProperties, BlobService, BlobSummary, ServiceResult};
use crate::config::{Backend, BlobFsOptions, AZURITE_ACCOUNT_KEY};
use crate::credentials::SigningCapability;
use crate::metadata::USER_METADATA_PREFIX;
use crate::rest::{BlobRestClient, RequestAuth};
use crate::runtime::{block_on, shared_runtime};
use crate::{BlobFsError, Result};
use bytes::Bytes;
use lru::LruCache;
use object_store::azure::{AzureConfigKey, MicrosoftAzureBuilder};
use object_store::path::Path as ObjectPath;
use object_store::{Attribute, GetOptions, ObjectStore};
use parking_lot::Mutex;
use std::fmt;
use std::num::NonZeroUsize;
use std::ops::Range;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::debug;

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Clients serving one container
#[derive(Debug, Clone)]
pub struct ContainerClient {
    store: Arc<dyn ObjectStore>,
    rest: Option<Arc<BlobRestClient>>,
}

impl ContainerClient {
    /// Container served by `store` alone
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store, rest: None }
    }

    /// Answer property and existence queries through `rest`
    pub fn with_rest(mut self, rest: BlobRestClient) -> Self {
        self.rest = Some(Arc::new(rest));
        self
    }

    /// The object store of this container
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }
}

/// Produces the clients serving one container
pub trait StoreFactory: fmt::Debug + Send + Sync {
    /// Clients for `container`; a `NotFound` error means the container does not exist
    fn store_for(&self, container: &str) -> ServiceResult<ContainerClient>;

    /// Names of every container, when the backend can enumerate them
    fn list_containers(&self) -> ServiceResult<Vec<String>> {
        Err(object_store::Error::NotSupported {
            source: "container enumeration is not supported by this backend".into(),
        })
    }
}

/// Builds Azure (or Azurite) stores from filesystem options
#[derive(Debug)]
pub struct AzureStoreFactory {
    options: BlobFsOptions,
    credential: Arc<dyn SigningCapability>,
}

impl AzureStoreFactory {
    /// Factory signing requests with `credential`
    pub fn new(options: BlobFsOptions, credential: Arc<dyn SigningCapability>) -> Self {
        Self {
            options,
            credential,
        }
    }

    fn builder(&self, container: &str) -> MicrosoftAzureBuilder {
        let mut builder = MicrosoftAzureBuilder::new()
            .with_account(self.options.effective_account_name())
            .with_container_name(container);

        match (&self.options.blob_endpoint, self.options.backend) {
            (Some(endpoint), _) => {
                builder = builder
                    .with_endpoint(endpoint.clone())
                    .with_allow_http(endpoint.starts_with("http://"));
            }
            (None, Backend::Azurite) => builder = builder.with_use_emulator(true),
            (None, Backend::Azure) => {}
        }

        self.credential.configure(builder)
    }
}

impl StoreFactory for AzureStoreFactory {
    fn store_for(&self, container: &str) -> ServiceResult<ContainerClient> {
        let account = self.options.effective_account_name();
        debug!(account, container, "Building Azure store");

        let builder = self.builder(container);
        let access_key = builder.get_config_value(&AzureConfigKey::AccessKey);
        let store = builder.build()?;
        let auth = match (access_key, self.options.backend) {
            (Some(key), _) => RequestAuth::shared_key(account, &key)?,
            (None, Backend::Azurite) => RequestAuth::shared_key(account, AZURITE_ACCOUNT_KEY)?,
            (None, Backend::Azure) => RequestAuth::Provider(store.credentials().clone()),
        };
        let rest = BlobRestClient::new(&self.options.account_blob_url(), container, auth)?;

        Ok(ContainerClient::new(Arc::new(store)).with_rest(rest))
    }
}

/// Object path of a blob key, taken verbatim
fn object_path(key: &str) -> ServiceResult<ObjectPath> {
    Ok(ObjectPath::parse(key)?)
}

/// A blob service backed by `object_store` stores
pub struct ObjectStoreService {
    factory: Arc<dyn StoreFactory>,
    stores: Mutex<LruCache<String, ContainerClient>>,
    runtime: Arc<Runtime>,
}

impl ObjectStoreService {
    /// Service caching up to `cache_size` per-container stores
    pub fn new(factory: Arc<dyn StoreFactory>, cache_size: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(cache_size).ok_or_else(|| {
            BlobFsError::InvalidArgument("store cache size must be greater than zero".to_string())
        })?;
        let runtime =
            shared_runtime().map_err(|e| BlobFsError::Io(format!("Runtime error: {}", e)))?;

        Ok(Self {
            factory,
            stores: Mutex::new(LruCache::new(capacity)),
            runtime,
        })
    }

    fn client(&self, container: &str) -> ServiceResult<ContainerClient> {
        let mut stores = self.stores.lock();
        if let Some(client) = stores.get(container) {
            return Ok(client.clone());
        }
        let client = self.factory.store_for(container)?;
        stores.put(container.to_string(), client.clone());
        Ok(client)
    }
}

impl fmt::Debug for ObjectStoreService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStoreService")
            .field("factory", &self.factory)
            .field("cached_stores", &self.stores.lock().len())
            .finish()
    }
}

impl BlobService for ObjectStoreService {
    fn container_exists(&self, container: &str) -> ServiceResult<bool> {
        let client = match self.client(container) {
            Ok(client) => client,
            Err(object_store::Error::NotFound { .. }) => return Ok(false),
            Err(e) => return Err(e),
        };
        if let Some(rest) = &client.rest {
            return block_on(&self.runtime, rest.container_exists());
        }
        match block_on(&self.runtime, client.store.list_with_delimiter(None)) {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn list_containers(&self) -> ServiceResult<Vec<String>> {
        self.factory.list_containers()
    }

    fn list_blobs(&self, container: &str, prefix: &str) -> ServiceResult<BlobListing> {
        let client = self.client(container)?;
        let prefix_path = match prefix.trim_end_matches('/') {
            "" => None,
            trimmed => Some(object_path(trimmed)?),
        };

        let result = match block_on(
            &self.runtime,
            client.store.list_with_delimiter(prefix_path.as_ref()),
        ) {
            Ok(result) => result,
            Err(e) => {
                // Listing a missing container fails with an opaque error
                if let Some(rest) = &client.rest {
                    if !block_on(&self.runtime, rest.container_exists())? {
                        return Err(object_store::Error::NotFound {
                            path: container.to_string(),
                            source: Box::new(e),
                        });
                    }
                }
                return Err(e);
            }
        };

        Ok(BlobListing {
            prefixes: result
                .common_prefixes
                .iter()
                .map(|p| format!("{}/", p))
                .collect(),
            blobs: result
                .objects
                .into_iter()
                .map(|meta| BlobSummary {
                    key: meta.location.to_string(),
                    size: meta.size as u64,
                    last_modified: meta.last_modified,
                })
                .collect(),
        })
    }

    fn head(&self, container: &str, key: &str) -> ServiceResult<BlobProperties> {
        let client = self.client(container)?;
        let path = object_path(key)?;
        if let Some(rest) = &client.rest {
            return block_on(&self.runtime, rest.blob_properties(key));
        }

        let options = GetOptions {
            head: true,
            ..Default::default()
        };
        let result = block_on(&self.runtime, client.store.get_opts(&path, options))?;

        let mut native = Vec::new();
        for (attribute, value) in result.attributes.iter() {
            let name = match attribute {
                Attribute::ContentType => "Content-Type".to_string(),
                Attribute::ContentEncoding => "Content-Encoding".to_string(),
                Attribute::ContentLanguage => "Content-Language".to_string(),
                Attribute::ContentDisposition => "Content-Disposition".to_string(),
                Attribute::CacheControl => "Cache-Control".to_string(),
                Attribute::Metadata(name) => format!("{}{}", USER_METADATA_PREFIX, name),
                _ => continue,
            };
            let value: &str = value.as_ref();
            native.push((name, value.to_string()));
        }

        let meta = result.meta;
        native.push((
            "Last-Modified".to_string(),
            meta.last_modified.format(HTTP_DATE_FORMAT).to_string(),
        ));
        native.push(("Content-Length".to_string(), meta.size.to_string()));
        if let Some(e_tag) = &meta.e_tag {
            native.push(("ETag".to_string(), e_tag.clone()));
        }

        Ok(BlobProperties {
            size: meta.size as u64,
            last_modified: meta.last_modified,
            e_tag: meta.e_tag,
            native,
        })
    }

    fn get_range(&self, container: &str, key: &str, range: Range<u64>) -> ServiceResult<Bytes> {
        let client = self.client(container)?;
        let path = object_path(key)?;
        block_on(
            &self.runtime,
            client
                .store
                .get_range(&path, range.start as usize..range.end as usize),
        )
    }
}
