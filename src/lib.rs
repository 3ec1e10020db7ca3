//! Hatchway - ingestion/retrieval gateway for content-addressed storage
//!
//! Cargo goes in through the hatch, cargo comes out through the hatch.
//!
//! Hatchway sits in front of a content-addressed storage network. On the
//! way in it accepts files as inline base-64 content or fetches them from
//! external URLs under strict policy controls, then hands them to a
//! storage backend for content-addressed upload. On the way out it fetches
//! archive-transport responses from a public gateway, decodes them into an
//! addressable block store, and reconstructs the named file as a byte
//! stream.
//!
//! ## Components
//!
//! - **Resource**: textual locator parsing (`bafy.../path`, `/ipfs/...`, `ipfs://...`)
//! - **UrlIngestor**: policy-enforced streaming URL download
//! - **ArchiveRetriever**: gateway fetch, CAR decode, path-based export
//! - **Codec**: byte-stream to base-64 text conversion
//! - **StorageFacade**: backend lifecycle and upload orchestration

pub mod codec;
pub mod config;
pub mod ingest;
pub mod policy;
pub mod resource;
pub mod retrieve;
pub mod storage;
pub mod types;

pub use config::Args;
pub use ingest::{FileBlob, UrlIngestor};
pub use policy::UrlUploadPolicy;
pub use resource::Resource;
pub use retrieve::{ArchiveRetriever, RetrieveResult};
pub use storage::{StorageClient, StorageConnector, StorageFacade, UploadOptions, UploadResult};
pub use types::{HatchwayError, Result};
