//! Storage backend contract.
//!
//! The backend itself (credential handling, chunking, network upload,
//! Filecoin publication) is an external collaborator. This module is the
//! seam it is consumed through: a connector that establishes the session
//! and a client that commits directory batches.

use std::sync::Arc;

use async_trait::async_trait;
use cid::Cid;
use tokio_util::sync::CancellationToken;

use crate::ingest::FileBlob;
use crate::types::Result;

/// Options passed through to the backend's batch commit
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Retry budget honored by the backend commit only; core ingestion and
    /// retrieval paths never retry.
    pub retry_count: u32,
    /// Cooperative cancellation for the commit
    pub cancel: Option<CancellationToken>,
    /// Publish to the public Filecoin network instead of private-only
    pub publish_to_filecoin: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            retry_count: 3,
            cancel: None,
            publish_to_filecoin: false,
        }
    }
}

/// One durably committed directory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadEntry {
    pub name: String,
    pub cid: Cid,
}

/// An established backend session
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Commit `blobs` as one directory and return the root identifier.
    ///
    /// As each entry is durably assigned an identifier the implementation
    /// appends it to `entries`; structural entries may carry empty names.
    /// Failures are reported as `HatchwayError::Backend` with the
    /// underlying cause attached.
    async fn upload_directory(
        &self,
        blobs: Vec<FileBlob>,
        options: &UploadOptions,
        entries: &mut Vec<UploadEntry>,
    ) -> Result<Cid>;
}

/// Establishes backend sessions from credentials
#[async_trait]
pub trait StorageConnector: Send + Sync {
    /// Perform backend connection and space-delegation setup.
    async fn connect(&self, principal: &str, delegation: &str) -> Result<Arc<dyn StorageClient>>;
}
