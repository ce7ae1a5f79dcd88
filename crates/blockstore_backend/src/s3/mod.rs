//! S3-compatible object client for the cloud-object backend.
//!
//! Blocks are stored as objects named by their block ID in one bucket,
//! addressed virtual-host style: `https://<bucket>.<host>/<block_id>`.
//! Every request is signed (see [`sign`]) and carries a `Date` header equal
//! to the signed date.

mod memory;
pub mod sign;
mod transport;

pub use memory::InMemoryS3;
pub use transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};

use crate::object::{ObjectClient, ObjectError, ObjectInfo, ObjectResult};
use bytes::Bytes;
use serde::Deserialize;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::trace;

/// Name of the cloud-object variant in configuration and diagnostics.
pub const CLOUD_OBJECT_BACKEND: &str = "cloud-object";

/// Endpoint host used when none is configured.
pub const DEFAULT_HOST: &str = "s3.amazonaws.com";

/// Content type of uploaded blocks.
const BLOCK_CONTENT_TYPE: &str = "application/octet-stream";

/// Connection parameters for one bucket.
#[derive(Clone, PartialEq, Eq)]
pub struct S3Config {
    /// Target bucket.
    pub bucket: String,
    /// Access key ID.
    pub key_id: String,
    /// Secret access key.
    pub secret_key: String,
    /// Endpoint host, without the bucket label.
    pub host: String,
    /// Whether to use `https`.
    pub use_https: bool,
}

impl S3Config {
    /// Creates a configuration for the default endpoint over https.
    pub fn new(
        bucket: impl Into<String>,
        key_id: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            key_id: key_id.into(),
            secret_key: secret_key.into(),
            host: DEFAULT_HOST.to_string(),
            use_https: true,
        }
    }

    /// Sets the endpoint host.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets whether to use `https`.
    #[must_use]
    pub fn with_https(mut self, use_https: bool) -> Self {
        self.use_https = use_https;
        self
    }

    /// Returns `<scheme>://<bucket>.<host>`.
    #[must_use]
    pub fn endpoint(&self) -> String {
        let scheme = if self.use_https { "https" } else { "http" };
        format!("{scheme}://{}.{}", self.bucket, self.host)
    }
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Config")
            .field("bucket", &self.bucket)
            .field("key_id", &self.key_id)
            .field("secret_key", &"<redacted>")
            .field("host", &self.host)
            .field("use_https", &self.use_https)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBucketResult {
    #[serde(default)]
    contents: Vec<ListEntry>,
    #[serde(default)]
    is_truncated: bool,
    next_continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListEntry {
    key: String,
}

/// Signed S3 REST client over a [`HttpTransport`].
pub struct S3Client {
    config: S3Config,
    transport: Arc<dyn HttpTransport>,
}

impl S3Client {
    /// Creates a client for `config` sending requests through `transport`.
    pub fn new(config: S3Config, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &S3Config {
        &self.config
    }

    /// Builds the signed request for `key` (empty for the bucket itself).
    fn build_request(
        &self,
        method: HttpMethod,
        key: &str,
        query: &[(&str, &str)],
        body: Option<Bytes>,
    ) -> ObjectResult<HttpRequest> {
        let base = format!("{}/{key}", self.config.endpoint());
        let url = if query.is_empty() {
            base
        } else {
            reqwest::Url::parse_with_params(&base, query)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?
                .to_string()
        };

        let content_type = if body.is_some() { BLOCK_CONTENT_TYPE } else { "" };
        let date = sign::http_date(SystemTime::now());
        let resource = sign::canonical_resource(&self.config.bucket, key);
        let signature = sign::sign(
            &self.config.secret_key,
            &sign::string_to_sign(method.as_str(), "", content_type, &date, &resource),
        )?;

        let mut headers = vec![
            ("Date".to_string(), date),
            (
                "Authorization".to_string(),
                sign::authorization(&self.config.key_id, &signature),
            ),
        ];
        if !content_type.is_empty() {
            headers.push(("Content-Type".to_string(), content_type.to_string()));
        }

        Ok(HttpRequest {
            method,
            url,
            headers,
            body,
        })
    }

    fn send(
        &self,
        method: HttpMethod,
        key: &str,
        query: &[(&str, &str)],
        body: Option<Bytes>,
    ) -> ObjectResult<HttpResponse> {
        let request = self.build_request(method, key, query, body)?;
        trace!(%method, url = %request.url, "sending S3 request");
        let response = self.transport.send(request)?;
        trace!(%method, status = response.status, "received S3 response");
        Ok(response)
    }
}

impl fmt::Debug for S3Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Client")
            .field("config", &self.config)
            .finish()
    }
}

fn status_error(response: &HttpResponse) -> ObjectError {
    let body = String::from_utf8_lossy(&response.body).trim().to_string();
    ObjectError::Status {
        status: response.status,
        message: if body.is_empty() {
            "empty response body".to_string()
        } else {
            body
        },
    }
}

fn invalid_data(message: impl Into<String>) -> ObjectError {
    io::Error::new(io::ErrorKind::InvalidData, message.into()).into()
}

impl ObjectClient for S3Client {
    fn get(&self, key: &str) -> ObjectResult<Option<Bytes>> {
        let response = self.send(HttpMethod::Get, key, &[], None)?;
        match response.status {
            404 => Ok(None),
            _ if response.is_success() => Ok(Some(response.body)),
            _ => Err(status_error(&response)),
        }
    }

    fn head(&self, key: &str) -> ObjectResult<Option<ObjectInfo>> {
        let response = self.send(HttpMethod::Head, key, &[], None)?;
        if response.status == 404 {
            return Ok(None);
        }
        if !response.is_success() {
            return Err(status_error(&response));
        }

        let size = response
            .header("Content-Length")
            .ok_or_else(|| invalid_data("HEAD response without Content-Length"))?
            .parse::<u64>()
            .map_err(|e| invalid_data(format!("bad Content-Length: {e}")))?;
        let modified = response
            .header("Last-Modified")
            .and_then(sign::parse_http_date);
        Ok(Some(ObjectInfo { size, modified }))
    }

    fn put(&self, key: &str, data: Bytes) -> ObjectResult<()> {
        let response = self.send(HttpMethod::Put, key, &[], Some(data))?;
        if !response.is_success() {
            return Err(status_error(&response));
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> ObjectResult<()> {
        let response = self.send(HttpMethod::Delete, key, &[], None)?;
        if response.is_success() || response.status == 404 {
            return Ok(());
        }
        Err(status_error(&response))
    }

    fn list(&self, visit: &mut dyn FnMut(&str) -> bool) -> ObjectResult<()> {
        let mut token: Option<String> = None;
        loop {
            let mut query = vec![("list-type", "2")];
            if let Some(token) = token.as_deref() {
                query.push(("continuation-token", token));
            }

            let response = self.send(HttpMethod::Get, "", &query, None)?;
            if !response.is_success() {
                return Err(status_error(&response));
            }
            let page: ListBucketResult = quick_xml::de::from_reader(response.body.as_ref())
                .map_err(|e| invalid_data(format!("bad bucket listing: {e}")))?;

            for entry in &page.contents {
                if !visit(&entry.key) {
                    return Ok(());
                }
            }

            match page.next_continuation_token {
                Some(next) if page.is_truncated => token = Some(next),
                _ => return Ok(()),
            }
        }
    }
}
