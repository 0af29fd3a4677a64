//! Direct requests to the Blob service REST API
//!
//! `object_store` reports only the content headers of a blob, and a listing
//! against a missing container comes back as an opaque error. Get Blob
//! Properties and Get Container Properties answer both questions, so this
//! client issues those two HEAD requests itself and returns the raw response
//! headers.

use crate::client::{BlobProperties, ServiceResult};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use object_store::azure::{AzureCredential, AzureCredentialProvider};
use object_store::CredentialProvider;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_LENGTH, ETAG, LAST_MODIFIED,
};
use reqwest::{Client, Method, StatusCode};
use sha2::Sha256;
use std::fmt;
use tracing::debug;
use url::Url;

const STORE: &str = "MicrosoftAzure";
const API_VERSION: &str = "2023-11-03";
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

type HmacSha256 = Hmac<Sha256>;

fn generic(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> object_store::Error {
    object_store::Error::Generic {
        store: STORE,
        source: source.into(),
    }
}

/// How requests are authorized
#[derive(Clone)]
pub enum RequestAuth {
    /// Shared Key signature over the decoded account key
    SharedKey {
        /// Storage account name
        account: String,
        /// Decoded account key
        key: Vec<u8>,
    },
    /// Bearer tokens or SAS pairs handed out by a store's credential provider
    Provider(AzureCredentialProvider),
}

impl RequestAuth {
    /// Shared Key authorization from a base64 account key
    pub fn shared_key(account: impl Into<String>, account_key: &str) -> ServiceResult<Self> {
        let key = STANDARD.decode(account_key).map_err(generic)?;
        Ok(RequestAuth::SharedKey {
            account: account.into(),
            key,
        })
    }
}

impl fmt::Debug for RequestAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestAuth::SharedKey { account, .. } => f
                .debug_struct("SharedKey")
                .field("account", account)
                .field("key", &"<redacted>")
                .finish(),
            RequestAuth::Provider(_) => write!(f, "Provider"),
        }
    }
}

/// Blob service requests scoped to one container
#[derive(Debug)]
pub struct BlobRestClient {
    http: Client,
    container_url: Url,
    container: String,
    auth: RequestAuth,
}

impl BlobRestClient {
    /// Client for `container` under the account endpoint `endpoint`
    pub fn new(endpoint: &str, container: &str, auth: RequestAuth) -> ServiceResult<Self> {
        let mut container_url = Url::parse(endpoint.trim_end_matches('/')).map_err(generic)?;
        container_url
            .path_segments_mut()
            .map_err(|_| generic(format!("'{}' is not a usable blob endpoint", endpoint)))?
            .pop_if_empty()
            .push(container);

        let http = Client::builder().build().map_err(generic)?;
        Ok(Self {
            http,
            container_url,
            container: container.to_string(),
            auth,
        })
    }

    /// URL of the blob named `key`; every `/`-separated segment is percent-encoded once
    pub fn blob_url(&self, key: &str) -> Url {
        let mut url = self.container_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.extend(key.split('/'));
        }
        url
    }

    /// Whether the container exists (Get Container Properties)
    pub async fn container_exists(&self) -> ServiceResult<bool> {
        let mut url = self.container_url.clone();
        url.query_pairs_mut().append_pair("restype", "container");

        match self.head(url, &self.container).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Every property the service reports for a blob (Get Blob Properties)
    pub async fn blob_properties(&self, key: &str) -> ServiceResult<BlobProperties> {
        let location = format!("{}/{}", self.container, key);
        let headers = self.head(self.blob_url(key), &location).await?;

        let header = |name: HeaderName| headers.get(name).and_then(|v| v.to_str().ok());
        let size = header(CONTENT_LENGTH)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .ok_or_else(|| generic(format!("{}: response carries no Content-Length", location)))?;
        let last_modified = header(LAST_MODIFIED)
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
            .map(|t| t.with_timezone(&Utc))
            .ok_or_else(|| generic(format!("{}: response carries no Last-Modified", location)))?;
        let e_tag = header(ETAG).map(str::to_string);

        let native = headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();

        Ok(BlobProperties {
            size,
            last_modified,
            e_tag,
            native,
        })
    }

    async fn head(&self, mut url: Url, location: &str) -> ServiceResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let date = Utc::now().format(HTTP_DATE_FORMAT).to_string();
        headers.insert("x-ms-date", header_value(&date)?);
        headers.insert("x-ms-version", HeaderValue::from_static(API_VERSION));

        match &self.auth {
            RequestAuth::SharedKey { account, key } => {
                let signature = shared_key_signature(account, key, &Method::HEAD, &url, &headers)?;
                let authorization = format!("SharedKey {}:{}", account, signature);
                headers.insert(AUTHORIZATION, header_value(&authorization)?);
            }
            RequestAuth::Provider(provider) => match &*provider.get_credential().await? {
                AzureCredential::BearerToken(token) => {
                    headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", token))?);
                }
                AzureCredential::SASToken(pairs) => {
                    url.query_pairs_mut()
                        .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
                }
                _ => {
                    return Err(generic(
                        "access keys must be configured as account key credentials",
                    ))
                }
            },
        }

        debug!(%url, "HEAD");
        let response = self
            .http
            .head(url)
            .headers(headers)
            .send()
            .await
            .map_err(generic)?;

        match response.status() {
            status if status.is_success() => Ok(response.headers().clone()),
            StatusCode::NOT_FOUND => Err(object_store::Error::NotFound {
                path: location.to_string(),
                source: error_code(response.headers())
                    .unwrap_or_else(|| "404 Not Found".to_string())
                    .into(),
            }),
            status => Err(generic(format!(
                "HEAD {} failed with {}{}",
                location,
                status,
                error_code(response.headers())
                    .map(|code| format!(" ({})", code))
                    .unwrap_or_default()
            ))),
        }
    }
}

fn header_value(value: &str) -> ServiceResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(generic)
}

fn error_code(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-ms-error-code")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Shared Key signature of a request without a body.
///
/// The standard headers between the verb and the canonicalized headers
/// (Content-Encoding through Range) are all empty for the requests made here.
fn shared_key_signature(
    account: &str,
    key: &[u8],
    method: &Method,
    url: &Url,
    headers: &HeaderMap,
) -> ServiceResult<String> {
    let mut string_to_sign = format!("{}\n", method.as_str());
    string_to_sign.push_str(&"\n".repeat(11));

    let mut canonical_headers: Vec<(&str, &str)> = headers
        .iter()
        .filter(|(name, _)| name.as_str().starts_with("x-ms-"))
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v.trim())))
        .collect();
    canonical_headers.sort_unstable();
    for (name, value) in canonical_headers {
        string_to_sign.push_str(&format!("{}:{}\n", name, value));
    }

    string_to_sign.push_str(&format!("/{}{}", account, url.path()));
    let mut query: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.to_lowercase(), v.into_owned()))
        .collect();
    query.sort();
    for (name, value) in query {
        string_to_sign.push_str(&format!("\n{}:{}", name, value));
    }

    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|_| generic("account key cannot be used as an HMAC key"))?;
    mac.update(string_to_sign.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}
