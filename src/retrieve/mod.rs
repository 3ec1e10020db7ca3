//! Archive-based retrieval pipeline.
//!
//! Gateway fetch, archive decode, on-demand block resolution, path-based
//! content export. The gateway is asked for archive transport
//! (`?format=car`) instead of the default representation, the response is
//! decoded into a [`BlockMap`], and the named entity is reconstructed from
//! it as a lazy byte stream.

pub mod car;
pub mod export;
pub mod unixfs;

use reqwest::header;
use serde::Serialize;
use tracing::debug;

use crate::codec::{self, Encoding};
use crate::resource::Resource;
use crate::types::{HatchwayError, Result};

pub use car::BlockMap;
pub use export::ExportStream;

/// Media type of an archive-transport gateway response
pub const CAR_MIME_TYPE: &str = "application/vnd.ipld.car";

/// Retrieved content, re-encoded as text
#[derive(Debug, Clone, Serialize)]
pub struct RetrieveResult {
    pub data: String,
    pub mime_type: Option<String>,
}

/// A fetched and decoded archive plus the content type the gateway
/// declared for the named entity (when it declared a usable one)
pub struct FetchedArchive {
    pub blocks: BlockMap,
    pub content_type: Option<String>,
}

/// Fetches archives from a public gateway and exports content from them
pub struct ArchiveRetriever {
    client: reqwest::Client,
    gateway_url: String,
}

impl ArchiveRetriever {
    /// Create a retriever against `gateway_url`. The user-agent presented
    /// to the gateway is a constructor parameter, never process-global
    /// state.
    pub fn new(gateway_url: &str, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(HatchwayError::Network)?;
        Ok(Self {
            client,
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
        })
    }

    /// Request URL for `resource`: gateway base, `/ipfs/` path, and the
    /// archive-transport marker joined onto any query the pathname already
    /// carries.
    pub fn request_url(&self, resource: &Resource) -> String {
        let joiner = if resource.pathname.contains('?') { '&' } else { '?' };
        format!(
            "{}/ipfs/{}{}{}format=car",
            self.gateway_url, resource.cid, resource.pathname, joiner
        )
    }

    /// Fetch and decode the archive for `resource`.
    pub async fn fetch_archive(&self, resource: &Resource) -> Result<FetchedArchive> {
        let url = self.request_url(resource);
        debug!(url = %url, "fetching archive from gateway");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(HatchwayError::Gateway(response.status()));
        }

        // The archive's own media type says nothing about the named entity;
        // only a more specific declaration is worth keeping.
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.starts_with(CAR_MIME_TYPE))
            .map(|value| value.to_string());

        let body = response.bytes().await?;
        let blocks = car::decode(body)?;
        debug!(blocks = blocks.len(), "archive decoded");

        Ok(FetchedArchive {
            blocks,
            content_type,
        })
    }

    /// Retrieve the entity named by `resource` as a lazy byte stream.
    pub async fn retrieve(&self, resource: &Resource) -> Result<ExportStream> {
        let fetched = self.fetch_archive(resource).await?;
        export::export(fetched.blocks, resource.cid, &resource.pathname)
    }

    /// Retrieve and re-encode as text in one step.
    pub async fn retrieve_to_text(
        &self,
        resource: &Resource,
        encoding: Encoding,
    ) -> Result<RetrieveResult> {
        let fetched = self.fetch_archive(resource).await?;
        let mime_type = fetched.content_type.clone();
        let stream = export::export(fetched.blocks, resource.cid, &resource.pathname)?;
        let data = codec::encode(stream, encoding)?;
        Ok(RetrieveResult { data, mime_type })
    }
}
