//! Credential binding for the Azure service client
//!
//! Credentials are a closed set of variants selected in configuration. The
//! service factory never inspects the variant; it hands its builder to
//! [`SigningCapability::configure`] and uses whatever comes back.

use crate::{BlobFsError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use object_store::azure::{AzureConfigKey, MicrosoftAzureBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Something able to sign requests made by an Azure store builder
pub trait SigningCapability: fmt::Debug + Send + Sync {
    /// Attach the signing material to `builder`
    fn configure(&self, builder: MicrosoftAzureBuilder) -> MicrosoftAzureBuilder;
}

/// Supported credential variants
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Credential {
    /// Shared account key
    AccountKey {
        /// Base64 encoded account key
        account_key: String,
    },
    /// Managed identity obtained from the instance metadata service
    ManagedIdentity {
        /// Client id of a user-assigned identity
        #[serde(default)]
        client_id: Option<String>,
        /// Alternative metadata endpoint
        #[serde(default)]
        msi_endpoint: Option<String>,
    },
    /// Service principal with a client secret
    ServicePrincipal {
        /// Directory (tenant) id
        tenant_id: String,
        /// Application (client) id
        client_id: String,
        /// Client secret
        client_secret: String,
    },
    /// Whatever `AZURE_*` environment variables describe, falling back to managed identity
    #[default]
    Default,
}

impl Credential {
    /// Account key credentials
    pub fn account_key(account_key: impl Into<String>) -> Self {
        Credential::AccountKey {
            account_key: account_key.into(),
        }
    }

    /// Service principal credentials
    pub fn service_principal(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Credential::ServicePrincipal {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// System-assigned managed identity
    pub fn managed_identity() -> Self {
        Credential::ManagedIdentity {
            client_id: None,
            msi_endpoint: None,
        }
    }

    /// Check that the variant carries usable values.
    ///
    /// # Errors
    /// Returns `InvalidArgument` for empty fields or an account key that is not base64.
    pub fn validate(&self) -> Result<()> {
        match self {
            Credential::AccountKey { account_key } => {
                if account_key.is_empty() {
                    return Err(BlobFsError::InvalidArgument(
                        "account key must not be empty".to_string(),
                    ));
                }
                STANDARD.decode(account_key).map_err(|e| {
                    BlobFsError::InvalidArgument(format!("account key is not valid base64: {}", e))
                })?;
            }
            Credential::ServicePrincipal {
                tenant_id,
                client_id,
                client_secret,
            } => {
                for (name, value) in [
                    ("tenant_id", tenant_id),
                    ("client_id", client_id),
                    ("client_secret", client_secret),
                ] {
                    if value.is_empty() {
                        return Err(BlobFsError::InvalidArgument(format!(
                            "service principal {} must not be empty",
                            name
                        )));
                    }
                }
            }
            Credential::ManagedIdentity { client_id, .. } => {
                if client_id.as_deref() == Some("") {
                    return Err(BlobFsError::InvalidArgument(
                        "managed identity client_id must not be empty".to_string(),
                    ));
                }
            }
            Credential::Default => {}
        }
        Ok(())
    }
}

impl SigningCapability for Credential {
    fn configure(&self, builder: MicrosoftAzureBuilder) -> MicrosoftAzureBuilder {
        match self {
            Credential::AccountKey { account_key } => builder.with_access_key(account_key),
            Credential::ManagedIdentity {
                client_id,
                msi_endpoint,
            } => {
                let mut builder = builder;
                if let Some(client_id) = client_id {
                    builder = builder.with_client_id(client_id);
                }
                if let Some(endpoint) = msi_endpoint {
                    builder = builder.with_msi_endpoint(endpoint);
                }
                builder
            }
            Credential::ServicePrincipal {
                tenant_id,
                client_id,
                client_secret,
            } => builder.with_client_secret_authorization(client_id, client_secret, tenant_id),
            Credential::Default => {
                let mut builder = builder;
                for (key, value) in std::env::vars() {
                    if !key.starts_with("AZURE_") {
                        continue;
                    }
                    if let Ok(config_key) = key.to_ascii_lowercase().parse::<AzureConfigKey>() {
                        // Account and container come from our own options.
                        if matches!(
                            config_key,
                            AzureConfigKey::AccountName | AzureConfigKey::ContainerName
                        ) {
                            continue;
                        }
                        builder = builder.with_config(config_key, value);
                    }
                }
                builder
            }
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::AccountKey { .. } => f
                .debug_struct("AccountKey")
                .field("account_key", &"<redacted>")
                .finish(),
            Credential::ManagedIdentity {
                client_id,
                msi_endpoint,
            } => f
                .debug_struct("ManagedIdentity")
                .field("client_id", client_id)
                .field("msi_endpoint", msi_endpoint)
                .finish(),
            Credential::ServicePrincipal {
                tenant_id,
                client_id,
                ..
            } => f
                .debug_struct("ServicePrincipal")
                .field("tenant_id", tenant_id)
                .field("client_id", client_id)
                .field("client_secret", &"<redacted>")
                .finish(),
            Credential::Default => write!(f, "Default"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_variant_configures_a_builder() {
        let credentials = [
            Credential::account_key("a2V5"),
            Credential::managed_identity(),
            Credential::ManagedIdentity {
                client_id: Some("client".into()),
                msi_endpoint: Some("http://localhost:8080/token".into()),
            },
            Credential::service_principal("tenant_id", "client_id", "client_secret"),
            Credential::Default,
        ];
        for credential in credentials {
            credential.validate().unwrap();
            let builder = credential.configure(MicrosoftAzureBuilder::new().with_account("acct"));
            assert_eq!(
                builder.get_config_value(&AzureConfigKey::AccountName).as_deref(),
                Some("acct")
            );
        }
    }

    #[test]
    fn test_account_key_is_applied() {
        let builder = Credential::account_key("a2V5")
            .configure(MicrosoftAzureBuilder::new().with_account("acct"));
        assert_eq!(
            builder.get_config_value(&AzureConfigKey::AccessKey).as_deref(),
            Some("a2V5")
        );
    }

    #[test]
    fn test_validation() {
        assert!(Credential::account_key("").validate().is_err());
        assert!(Credential::account_key("not base64!").validate().is_err());
        assert!(Credential::service_principal("", "c", "s").validate().is_err());
        assert!(Credential::ManagedIdentity {
            client_id: Some(String::new()),
            msi_endpoint: None
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let rendered = format!("{:?}", Credential::account_key("c2VjcmV0"));
        assert!(!rendered.contains("c2VjcmV0"));

        let rendered = format!("{:?}", Credential::service_principal("t", "c", "hunter2"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("tenant_id"));
    }

    #[test]
    fn test_serde_tagging() {
        let credential: Credential = toml::from_str(
            r#"
kind = "service_principal"
tenant_id = "t"
client_id = "c"
client_secret = "s"
"#,
        )
        .unwrap();
        assert_eq!(credential, Credential::service_principal("t", "c", "s"));
    }
}
