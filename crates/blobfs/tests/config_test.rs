//! Loading filesystem options from disk

use blobfs::{Backend, BlobFileSystem, BlobFsOptions, Credential, ErrorKind};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_load_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
backend = "azurite"
blob_endpoint = "http://localhost:10000/devstoreaccount1"
read_buffer_size = "256KiB"

[credential]
kind = "account_key"
account_key = "a2V5"
"#,
    )
    .unwrap();

    let options = BlobFsOptions::load_from(&path).unwrap();
    assert_eq!(options.backend, Backend::Azurite);
    assert_eq!(options.effective_account_name(), "devstoreaccount1");
    assert_eq!(options.read_buffer_size, 256 * 1024);
    assert_eq!(options.store_cache_size, 16);
    assert_eq!(options.credential, Credential::account_key("a2V5"));
    assert_eq!(
        options.account_blob_url(),
        "http://localhost:10000/devstoreaccount1"
    );

    let fs = BlobFileSystem::make(options.clone()).unwrap();
    assert_eq!(fs.options(), &options);
}

#[test]
fn test_load_service_principal() {
    let options = BlobFsOptions::from_toml_str(
        r#"
account_name = "prod"
read_buffer_size = 1048576

[credential]
kind = "service_principal"
tenant_id = "tenant"
client_id = "client"
client_secret = "secret"
"#,
    )
    .unwrap();

    assert_eq!(options.backend, Backend::Azure);
    assert_eq!(options.read_buffer_size, 1024 * 1024);
    assert_eq!(
        options.credential,
        Credential::service_principal("tenant", "client", "secret")
    );
    assert!(!format!("{:?}", options).contains("secret\""));
    options.validate().unwrap();
}

#[test]
fn test_load_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let err = BlobFsOptions::load_from(&temp_dir.path().join("absent.toml")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_load_malformed_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    fs::write(&path, "read_buffer_size = \"lots\"\n").unwrap();

    let err = BlobFsOptions::load_from(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_config_path_is_namespaced() {
    if let Ok(path) = BlobFsOptions::config_path() {
        assert!(path.ends_with("blobfs/config.toml"));
    }
}
