//! Policy-enforced URL ingestion.
//!
//! Downloads a remote resource into a bounded in-memory blob. Admission is
//! checked before any network I/O (scheme, then domain), the declared
//! content length is probed with a metadata-only request, and the body read
//! enforces the byte limit incrementally so an under-reporting server can
//! never push more than the policy allows.
//!
//! ## Cancellation
//!
//! The policy timeout and an optional caller token are merged into one
//! cancellation source; either firing fails the call with `TimedOut` at the
//! next suspension point. Both are dropped with the select on every exit
//! path, so no timer outlives the call.

use bytes::{Bytes, BytesMut};
use reqwest::header;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::codec;
use crate::policy::UrlUploadPolicy;
use crate::types::{HatchwayError, Result};

/// MIME type assigned when neither the caller nor the response declares one
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// An ingested file: named, typed, immutable bytes.
/// Consumed once by the storage facade; not retained after upload.
#[derive(Debug, Clone)]
pub struct FileBlob {
    pub name: String,
    pub bytes: Bytes,
    pub mime_type: String,
}

impl FileBlob {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Build a [`FileBlob`] from inline base-64 upload content.
pub fn from_inline(name: &str, data: &str, mime_type: Option<&str>) -> Result<FileBlob> {
    let bytes = codec::decode(data)?;
    Ok(FileBlob {
        name: name.to_string(),
        bytes,
        mime_type: mime_type.unwrap_or(DEFAULT_MIME_TYPE).to_string(),
    })
}

/// Downloads remote resources under a [`UrlUploadPolicy`]
pub struct UrlIngestor {
    client: reqwest::Client,
}

impl UrlIngestor {
    /// Create an ingestor. The user-agent presented to target servers is a
    /// constructor parameter, never process-global state.
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(HatchwayError::Network)?;
        Ok(Self { client })
    }

    /// Fetch `url` into a blob named `name`, enforcing `policy`.
    ///
    /// Effective MIME type precedence: `mime_override`, then the response
    /// `Content-Type`, then [`DEFAULT_MIME_TYPE`].
    pub async fn fetch(
        &self,
        url: &str,
        name: &str,
        mime_override: Option<&str>,
        policy: &UrlUploadPolicy,
        cancel: Option<CancellationToken>,
    ) -> Result<FileBlob> {
        let parsed = Url::parse(url).map_err(|source| HatchwayError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        if !policy.scheme_allowed(parsed.scheme()) {
            warn!(scheme = %parsed.scheme(), url = %url, "ingestion rejected: scheme not allowed");
            return Err(HatchwayError::SchemeNotAllowed(parsed.scheme().to_string()));
        }

        let host = parsed.host_str().unwrap_or_default();
        if !policy.host_allowed(host) {
            warn!(host = %host, url = %url, "ingestion rejected: domain not allowed");
            return Err(HatchwayError::DomainNotAllowed(host.to_string()));
        }

        let timer = async {
            match policy.fetch_timeout() {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending().await,
            }
        };
        let external = async {
            match &cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };

        let (bytes, response_mime) = tokio::select! {
            outcome = self.download(parsed, policy) => outcome?,
            _ = timer => return Err(HatchwayError::TimedOut),
            _ = external => return Err(HatchwayError::TimedOut),
        };

        let mime_type = mime_override
            .map(str::to_string)
            .or(response_mime)
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());

        debug!(name = %name, size = bytes.len(), mime = %mime_type, "url ingested");

        Ok(FileBlob {
            name: name.to_string(),
            bytes,
            mime_type,
        })
    }

    /// Metadata probe followed by the streaming body read.
    async fn download(&self, url: Url, policy: &UrlUploadPolicy) -> Result<(Bytes, Option<String>)> {
        let head = self
            .client
            .head(url.clone())
            .send()
            .await
            .map_err(|source| HatchwayError::MetadataRequest {
                message: "request failed".to_string(),
                source: Some(source),
            })?;
        if !head.status().is_success() {
            return Err(HatchwayError::MetadataRequest {
                message: format!("status {}", head.status()),
                source: None,
            });
        }

        // A declared length over the limit is rejected before any body
        // transfer. An absent length only skips this check; the streaming
        // bound below is the authoritative one.
        if let Some(declared) = declared_length(&head) {
            if declared > policy.max_bytes {
                warn!(declared, limit = policy.max_bytes, url = %url, "ingestion rejected: declared length over limit");
                return Err(HatchwayError::SizeExceededPredeclared {
                    declared,
                    limit: policy.max_bytes,
                });
            }
        }

        let mut response = self.client.get(url.clone()).send().await.map_err(|source| {
            HatchwayError::BodyRequest {
                message: "request failed".to_string(),
                source: Some(source),
            }
        })?;
        if !response.status().is_success() {
            return Err(HatchwayError::BodyRequest {
                message: format!("status {}", response.status()),
                source: None,
            });
        }

        let response_mime = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let mut buffer = BytesMut::new();
        let mut total: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            total += chunk.len() as u64;
            if total > policy.max_bytes {
                warn!(received = total, limit = policy.max_bytes, url = %url, "ingestion aborted: streaming limit exceeded");
                return Err(HatchwayError::SizeExceededStreaming {
                    limit: policy.max_bytes,
                });
            }
            buffer.extend_from_slice(&chunk);
        }

        if buffer.is_empty() {
            return Err(HatchwayError::EmptyBody);
        }

        Ok((buffer.freeze(), response_mime))
    }
}

fn declared_length(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}
