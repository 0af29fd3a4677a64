//! Configuration module

use crate::credentials::Credential;
use crate::{BlobFsError, Result};
use dirs::config_dir;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Account name used by the Azurite emulator
pub const AZURITE_ACCOUNT_NAME: &str = "devstoreaccount1";

/// The well-known Azurite account key
pub const AZURITE_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

/// Default chunk size for sequential reads (4 MiB)
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Default number of per-container stores kept alive
pub const DEFAULT_STORE_CACHE_SIZE: usize = 16;

/// Which flavour of the blob service to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Azure Blob Storage in the public cloud
    #[default]
    Azure,
    /// The local Azurite emulator
    Azurite,
}

/// Options used to build a [`BlobFileSystem`](crate::BlobFileSystem)
///
/// Two adapters built from equal options talk to the same account with the
/// same identity, so callers may use these as a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobFsOptions {
    /// Service flavour
    #[serde(default)]
    pub backend: Backend,
    /// Storage account name
    #[serde(default)]
    pub account_name: String,
    /// Overrides the blob endpoint derived from the backend and account
    #[serde(default)]
    pub blob_endpoint: Option<String>,
    /// How requests are signed
    #[serde(default)]
    pub credential: Credential,
    /// Chunk size for buffered sequential reads, in bytes or as a size string ("4MiB")
    #[serde(
        default = "default_read_buffer_size",
        deserialize_with = "deserialize_size"
    )]
    pub read_buffer_size: usize,
    /// Number of per-container clients cached by the service
    #[serde(default = "default_store_cache_size")]
    pub store_cache_size: usize,
}

fn default_read_buffer_size() -> usize {
    DEFAULT_READ_BUFFER_SIZE
}

fn default_store_cache_size() -> usize {
    DEFAULT_STORE_CACHE_SIZE
}

/// Size in either numeric or string form
#[derive(Deserialize)]
#[serde(untagged)]
enum SizeValue {
    Numeric(usize),
    String(String),
}

fn deserialize_size<'de, D>(deserializer: D) -> std::result::Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match SizeValue::deserialize(deserializer)? {
        SizeValue::Numeric(bytes) => Ok(bytes),
        SizeValue::String(text) => parse_size(&text)
            .map(|bytes| bytes as usize)
            .map_err(|e| D::Error::custom(format!("Failed to parse size: {}", e))),
    }
}

impl Default for BlobFsOptions {
    fn default() -> Self {
        Self {
            backend: Backend::Azure,
            account_name: String::new(),
            blob_endpoint: None,
            credential: Credential::Default,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            store_cache_size: DEFAULT_STORE_CACHE_SIZE,
        }
    }
}

impl BlobFsOptions {
    /// Options for the Azurite emulator with its well-known account key
    pub fn azurite() -> Self {
        Self {
            backend: Backend::Azurite,
            account_name: AZURITE_ACCOUNT_NAME.to_string(),
            credential: Credential::account_key(AZURITE_ACCOUNT_KEY),
            ..Self::default()
        }
    }

    /// Select account key credentials for `account_name`
    pub fn configure_account_key_credentials(
        &mut self,
        account_name: impl Into<String>,
        account_key: impl Into<String>,
    ) -> Result<()> {
        let credential = Credential::account_key(account_key);
        credential.validate()?;
        self.account_name = account_name.into();
        self.credential = credential;
        Ok(())
    }

    /// The account name, falling back to the emulator account for Azurite
    pub fn effective_account_name(&self) -> &str {
        if self.account_name.is_empty() && self.backend == Backend::Azurite {
            AZURITE_ACCOUNT_NAME
        } else {
            &self.account_name
        }
    }

    /// The blob service endpoint these options resolve to
    pub fn account_blob_url(&self) -> String {
        if let Some(endpoint) = &self.blob_endpoint {
            return endpoint.trim_end_matches('/').to_string();
        }
        match self.backend {
            Backend::Azure => format!(
                "https://{}.blob.core.windows.net",
                self.effective_account_name()
            ),
            Backend::Azurite => format!("http://127.0.0.1:10000/{}", self.effective_account_name()),
        }
    }

    /// Check the options before a client is built.
    ///
    /// # Errors
    /// Returns `InvalidArgument` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.effective_account_name().is_empty() {
            return Err(BlobFsError::InvalidArgument(
                "account_name must be set for the azure backend".to_string(),
            ));
        }
        if let Some(endpoint) = &self.blob_endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(BlobFsError::InvalidArgument(format!(
                    "blob_endpoint must be an http(s) URL: '{}'",
                    endpoint
                )));
            }
        }
        if self.read_buffer_size == 0 {
            return Err(BlobFsError::InvalidArgument(
                "read_buffer_size must be greater than zero".to_string(),
            ));
        }
        if self.store_cache_size == 0 {
            return Err(BlobFsError::InvalidArgument(
                "store_cache_size must be greater than zero".to_string(),
            ));
        }
        self.credential.validate()
    }

    /// Parse options from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| BlobFsError::InvalidArgument(format!("Failed to parse config: {}", e)))
    }

    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = config_dir().ok_or_else(|| {
            BlobFsError::Io("Unable to determine config directory".to_string())
        })?;

        Ok(config_dir.join("blobfs").join("config.toml"))
    }

    /// Load options from `path`
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BlobFsError::NotFound(format!("config file {}", path.display()))
            } else {
                BlobFsError::Io(format!("reading {}: {}", path.display(), e))
            }
        })?;
        Self::from_toml_str(&contents)
    }

    /// Load options from the default location, or defaults when the file is absent
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Get default configuration content with examples
    pub fn default_config_content() -> String {
        r#"# blobfs configuration file

# Service flavour: azure or azurite
backend = "azure"
account_name = "mystorageaccount"
# blob_endpoint = "https://mystorageaccount.blob.core.windows.net"

# Chunk size for sequential reads
read_buffer_size = "4MiB"
store_cache_size = 16

# One of: account_key, managed_identity, service_principal, default
[credential]
kind = "default"

# [credential]
# kind = "service_principal"
# tenant_id = "..."
# client_id = "..."
# client_secret = "..."
"#
        .to_string()
    }
}

/// Parse size string like "100MiB" to bytes
pub fn parse_size(size_str: &str) -> Result<u64> {
    let size_str = size_str.trim();

    if let Ok(bytes) = size_str.parse::<u64>() {
        return Ok(bytes);
    }

    let split_pos = size_str
        .chars()
        .position(|c| !c.is_ascii_digit() && c != '.')
        .unwrap_or(size_str.len());

    if split_pos == 0 {
        return Err(BlobFsError::InvalidArgument(format!(
            "Invalid size format: {}",
            size_str
        )));
    }

    let (number_part, unit_part) = size_str.split_at(split_pos);
    let number: f64 = number_part.parse().map_err(|_| {
        BlobFsError::InvalidArgument(format!("Invalid number in size: {}", number_part))
    })?;

    let multiplier: u64 = match unit_part.trim().to_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" => 1_000,
        "m" | "mb" => 1_000_000,
        "g" | "gb" => 1_000_000_000,
        "ki" | "kib" => 1_024,
        "mi" | "mib" => 1_048_576,
        "gi" | "gib" => 1_073_741_824,
        _ => {
            return Err(BlobFsError::InvalidArgument(format!(
                "Unknown size unit: {}",
                unit_part
            )))
        }
    };

    Ok((number * multiplier as f64) as u64)
}
