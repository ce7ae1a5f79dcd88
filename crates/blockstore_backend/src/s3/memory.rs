//! In-process S3 endpoint.

use super::sign;
use super::transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

const DEFAULT_PAGE_SIZE: usize = 1000;

/// An S3 bucket served in-process.
///
/// `InMemoryS3` implements [`HttpTransport`], so an [`super::S3Client`] can
/// talk to it exactly as it talks to a real endpoint. Every request's
/// signature is checked against the configured credentials, and listings
/// are paginated with continuation tokens.
#[derive(Debug)]
pub struct InMemoryS3 {
    bucket: String,
    key_id: String,
    secret_key: String,
    page_size: usize,
    objects: RwLock<BTreeMap<String, (Bytes, SystemTime)>>,
    fail_writes: AtomicBool,
    last_request: Mutex<Option<HttpRequest>>,
}

impl InMemoryS3 {
    /// Creates an empty bucket accepting requests signed with the given
    /// credentials.
    pub fn new(
        bucket: impl Into<String>,
        key_id: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            key_id: key_id.into(),
            secret_key: secret_key.into(),
            page_size: DEFAULT_PAGE_SIZE,
            objects: RwLock::new(BTreeMap::new()),
            fail_writes: AtomicBool::new(false),
            last_request: Mutex::new(None),
        }
    }

    /// Sets the maximum number of keys per listing page.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Returns true if the bucket is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Makes writes answer `500` until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns a copy of the most recent request.
    #[must_use]
    pub fn last_request(&self) -> Option<HttpRequest> {
        self.last_request.lock().clone()
    }

    fn error(status: u16, code: &str) -> HttpResponse {
        HttpResponse::new(
            status,
            format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?><Error><Code>{code}</Code></Error>"),
        )
    }

    fn authorized(&self, request: &HttpRequest, key: &str) -> bool {
        let Some(date) = request.header("Date") else {
            return false;
        };
        let content_type = request.header("Content-Type").unwrap_or("");
        let Ok(signature) = sign::sign(
            &self.secret_key,
            &sign::string_to_sign(
                request.method.as_str(),
                "",
                content_type,
                date,
                &sign::canonical_resource(&self.bucket, key),
            ),
        ) else {
            return false;
        };
        let expected = sign::authorization(&self.key_id, &signature);
        request.header("Authorization") == Some(expected.as_str())
    }

    fn list(&self, url: &reqwest::Url) -> HttpResponse {
        let start_after = url
            .query_pairs()
            .find(|(name, _)| name == "continuation-token")
            .map(|(_, value)| value.into_owned());

        let objects = self.objects.read();
        let mut remaining = objects
            .iter()
            .filter(|(key, _)| start_after.as_deref().map_or(true, |after| key.as_str() > after));
        let page: Vec<(&String, &(Bytes, SystemTime))> =
            remaining.by_ref().take(self.page_size).collect();
        let truncated = remaining.next().is_some();

        let mut body = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
        body.push_str("<ListBucketResult xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">");
        let _ = write!(
            body,
            "<Name>{}</Name><KeyCount>{}</KeyCount><IsTruncated>{truncated}</IsTruncated>",
            quick_xml::escape::escape(self.bucket.as_str()),
            page.len()
        );
        for (key, (data, _)) in &page {
            let _ = write!(
                body,
                "<Contents><Key>{}</Key><Size>{}</Size></Contents>",
                quick_xml::escape::escape(key.as_str()),
                data.len()
            );
        }
        if truncated {
            if let Some((last, _)) = page.last() {
                let _ = write!(
                    body,
                    "<NextContinuationToken>{}</NextContinuationToken>",
                    quick_xml::escape::escape(last.as_str())
                );
            }
        }
        body.push_str("</ListBucketResult>");

        HttpResponse::new(200, body)
    }

    fn handle(&self, request: HttpRequest) -> HttpResponse {
        let Ok(url) = reqwest::Url::parse(&request.url) else {
            return Self::error(400, "InvalidURI");
        };
        let key = url.path().trim_start_matches('/').to_string();

        if !self.authorized(&request, &key) {
            return Self::error(403, "SignatureDoesNotMatch");
        }

        let writes = matches!(request.method, HttpMethod::Put | HttpMethod::Delete);
        if writes && self.fail_writes.load(Ordering::SeqCst) {
            return Self::error(500, "InternalError");
        }

        match (request.method, key.is_empty()) {
            (HttpMethod::Get, true) => self.list(&url),
            (_, true) => Self::error(405, "MethodNotAllowed"),
            (HttpMethod::Get, false) => match self.objects.read().get(&key) {
                Some((data, _)) => HttpResponse::new(200, data.clone()),
                None => Self::error(404, "NoSuchKey"),
            },
            (HttpMethod::Head, false) => match self.objects.read().get(&key) {
                Some((data, modified)) => HttpResponse::new(200, Bytes::new())
                    .with_header("Content-Length", data.len().to_string())
                    .with_header("Last-Modified", sign::http_date(*modified)),
                None => HttpResponse::new(404, Bytes::new()),
            },
            (HttpMethod::Put, false) => {
                let data = request.body.unwrap_or_default();
                self.objects.write().insert(key, (data, SystemTime::now()));
                HttpResponse::new(200, Bytes::new())
            }
            (HttpMethod::Delete, false) => {
                self.objects.write().remove(&key);
                HttpResponse::new(204, Bytes::new())
            }
        }
    }
}

impl HttpTransport for InMemoryS3 {
    fn send(&self, request: HttpRequest) -> io::Result<HttpResponse> {
        *self.last_request.lock() = Some(request.clone());
        Ok(self.handle(request))
    }
}
