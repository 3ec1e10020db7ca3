//! Storage facade: idempotent initialization and upload orchestration.
//!
//! The facade owns the backend client lifecycle. Initialization is
//! memoized through an explicit state machine: the first caller commits
//! the `Uninitialized -> Initializing` transition and publishes a shared
//! outcome; every other caller, concurrent or later, awaits that same
//! outcome. Connection setup runs exactly once per facade instance, and a
//! failed attempt stays failed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use cid::Cid;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Serialize, Serializer};
use tracing::{debug, info};

use crate::ingest::FileBlob;
use crate::storage::backend::{StorageClient, StorageConnector, UploadEntry, UploadOptions};
use crate::types::{HatchwayError, Result};

type InitOutcome = std::result::Result<Arc<dyn StorageClient>, Arc<HatchwayError>>;
type InitFuture = Shared<BoxFuture<'static, InitOutcome>>;

/// Lifecycle of the backend connection. Transitions are single-writer:
/// whoever observes `Uninitialized` under the lock installs the shared
/// future; completion commits `Ready` or `Failed` exactly once.
enum InitState {
    Uninitialized,
    Initializing(InitFuture),
    Ready(Arc<dyn StorageClient>),
    Failed(Arc<HatchwayError>),
}

/// Outcome of a committed directory upload
#[derive(Debug, Clone, Serialize)]
pub struct UploadResult {
    #[serde(serialize_with = "cid_as_string")]
    pub root: Cid,
    pub url: String,
    #[serde(serialize_with = "cids_as_strings")]
    pub files: HashMap<String, Cid>,
}

fn cid_as_string<S: Serializer>(cid: &Cid, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&cid.to_string())
}

fn cids_as_strings<S: Serializer>(
    files: &HashMap<String, Cid>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_map(files.iter().map(|(name, cid)| (name, cid.to_string())))
}

/// Owns the backend client lifecycle and upload orchestration
pub struct StorageFacade {
    connector: Arc<dyn StorageConnector>,
    gateway_url: String,
    state: Mutex<InitState>,
}

impl StorageFacade {
    pub fn new(connector: Arc<dyn StorageConnector>, gateway_url: &str) -> Self {
        Self {
            connector,
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
            state: Mutex::new(InitState::Uninitialized),
        }
    }

    /// Idempotent backend initialization.
    ///
    /// The first call performs connection and space-delegation setup; all
    /// calls resolve to the same outcome. A failed attempt is terminal for
    /// this instance. Fails `MissingCredential` before attempting a
    /// connection when either credential is absent.
    pub async fn initialize(&self, principal: &str, delegation: &str) -> Result<()> {
        let pending = {
            let mut state = self.state.lock().expect("init state poisoned");
            match &*state {
                InitState::Ready(_) => return Ok(()),
                InitState::Failed(cause) => {
                    return Err(HatchwayError::Initialization(Arc::clone(cause)))
                }
                InitState::Initializing(future) => future.clone(),
                InitState::Uninitialized => {
                    if principal.trim().is_empty() || delegation.trim().is_empty() {
                        return Err(HatchwayError::MissingCredential);
                    }
                    let connector = Arc::clone(&self.connector);
                    let principal = principal.to_string();
                    let delegation = delegation.to_string();
                    let future: InitFuture = async move {
                        connector
                            .connect(&principal, &delegation)
                            .await
                            .map_err(Arc::new)
                    }
                    .boxed()
                    .shared();
                    *state = InitState::Initializing(future.clone());
                    debug!("storage initialization started");
                    future
                }
            }
        };

        let outcome = pending.await;

        let mut state = self.state.lock().expect("init state poisoned");
        match outcome {
            Ok(client) => {
                if matches!(*state, InitState::Initializing(_)) {
                    *state = InitState::Ready(Arc::clone(&client));
                    info!("storage backend ready");
                }
                Ok(())
            }
            Err(cause) => {
                if matches!(*state, InitState::Initializing(_)) {
                    *state = InitState::Failed(Arc::clone(&cause));
                }
                Err(HatchwayError::Initialization(cause))
            }
        }
    }

    /// Whether the facade holds a ready backend client
    pub fn is_ready(&self) -> bool {
        matches!(
            *self.state.lock().expect("init state poisoned"),
            InitState::Ready(_)
        )
    }

    fn client(&self) -> Result<Arc<dyn StorageClient>> {
        match &*self.state.lock().expect("init state poisoned") {
            InitState::Ready(client) => Ok(Arc::clone(client)),
            _ => Err(HatchwayError::NotInitialized),
        }
    }

    /// Commit `blobs` as one directory through the backend.
    ///
    /// Per-entry identifiers are collected through an explicit accumulator
    /// handed to the commit; entries with empty names are structural and
    /// excluded from the result mapping.
    pub async fn upload_directory(
        &self,
        blobs: Vec<FileBlob>,
        options: UploadOptions,
    ) -> Result<UploadResult> {
        let client = self.client()?;

        let mut entries: Vec<UploadEntry> = Vec::new();
        let root = client
            .upload_directory(blobs, &options, &mut entries)
            .await?;

        let files: HashMap<String, Cid> = entries
            .into_iter()
            .filter(|entry| !entry.name.is_empty())
            .map(|entry| (entry.name, entry.cid))
            .collect();

        let url = format!("{}/ipfs/{}", self.gateway_url, root);
        info!(root = %root, files = files.len(), "directory upload committed");

        Ok(UploadResult { root, url, files })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use multihash_codetable::{Code, MultihashDigest};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_cid(data: &[u8]) -> Cid {
        Cid::new_v1(0x55, Code::Sha2_256.digest(data))
    }

    struct MockClient;

    #[async_trait]
    impl StorageClient for MockClient {
        async fn upload_directory(
            &self,
            blobs: Vec<FileBlob>,
            _options: &UploadOptions,
            entries: &mut Vec<UploadEntry>,
        ) -> Result<Cid> {
            // Structural entry, reported the way real backends report the
            // enclosing directory node
            entries.push(UploadEntry {
                name: String::new(),
                cid: test_cid(b"structural"),
            });
            for blob in &blobs {
                entries.push(UploadEntry {
                    name: blob.name.clone(),
                    cid: test_cid(&blob.bytes),
                });
            }
            Ok(test_cid(b"root"))
        }
    }

    struct MockConnector {
        attempts: AtomicUsize,
        fail: bool,
    }

    impl MockConnector {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                attempts: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl StorageConnector for MockConnector {
        async fn connect(
            &self,
            _principal: &str,
            _delegation: &str,
        ) -> Result<Arc<dyn StorageClient>> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            if self.fail {
                Err(HatchwayError::Backend {
                    message: "connection refused".to_string(),
                    source: None,
                })
            } else {
                Ok(Arc::new(MockClient))
            }
        }
    }

    fn blob(name: &str, content: &[u8]) -> FileBlob {
        FileBlob {
            name: name.to_string(),
            bytes: bytes::Bytes::copy_from_slice(content),
            mime_type: "text/plain".to_string(),
        }
    }

    #[tokio::test]
    async fn test_initialize_once() {
        let connector = MockConnector::new(false);
        let facade = StorageFacade::new(connector.clone(), "https://w3s.link");

        facade.initialize("key", "delegation").await.unwrap();
        facade.initialize("key", "delegation").await.unwrap();

        assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);
        assert!(facade.is_ready());
    }

    #[tokio::test]
    async fn test_concurrent_initialize_single_connection() {
        let connector = MockConnector::new(false);
        let facade = Arc::new(StorageFacade::new(connector.clone(), "https://w3s.link"));

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let facade = Arc::clone(&facade);
                tokio::spawn(async move { facade.initialize("key", "delegation").await })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_initialize_is_terminal() {
        let connector = MockConnector::new(true);
        let facade = StorageFacade::new(connector.clone(), "https://w3s.link");

        let first = facade.initialize("key", "delegation").await.unwrap_err();
        assert!(matches!(first, HatchwayError::Initialization(_)));

        let second = facade.initialize("key", "delegation").await.unwrap_err();
        assert!(matches!(second, HatchwayError::Initialization(_)));

        // No re-attempt after failure
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);
        assert!(!facade.is_ready());
    }

    #[tokio::test]
    async fn test_missing_credentials_rejected_before_connect() {
        let connector = MockConnector::new(false);
        let facade = StorageFacade::new(connector.clone(), "https://w3s.link");

        let err = facade.initialize("", "delegation").await.unwrap_err();
        assert!(matches!(err, HatchwayError::MissingCredential));
        let err = facade.initialize("key", "  ").await.unwrap_err();
        assert!(matches!(err, HatchwayError::MissingCredential));

        assert_eq!(connector.attempts.load(Ordering::SeqCst), 0);

        // Valid credentials still work afterwards
        facade.initialize("key", "delegation").await.unwrap();
        assert!(facade.is_ready());
    }

    #[tokio::test]
    async fn test_upload_requires_ready_state() {
        let facade = StorageFacade::new(MockConnector::new(false), "https://w3s.link");
        let err = facade
            .upload_directory(vec![blob("a.txt", b"a")], UploadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HatchwayError::NotInitialized));
    }

    #[tokio::test]
    async fn test_upload_collects_named_entries() {
        let facade = StorageFacade::new(MockConnector::new(false), "https://w3s.link/");
        facade.initialize("key", "delegation").await.unwrap();

        let result = facade
            .upload_directory(
                vec![blob("a.txt", b"alpha"), blob("b.txt", b"bravo")],
                UploadOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(result.root, test_cid(b"root"));
        assert_eq!(result.url, format!("https://w3s.link/ipfs/{}", result.root));
        assert_eq!(result.files.len(), 2);
        assert_eq!(result.files["a.txt"], test_cid(b"alpha"));
        assert_eq!(result.files["b.txt"], test_cid(b"bravo"));
    }

    #[test]
    fn test_upload_result_serializes_cids_as_strings() {
        let root = test_cid(b"root");
        let result = UploadResult {
            root,
            url: format!("https://w3s.link/ipfs/{}", root),
            files: HashMap::from([("a.txt".to_string(), test_cid(b"alpha"))]),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["root"], root.to_string());
        assert_eq!(json["files"]["a.txt"], test_cid(b"alpha").to_string());
    }
}
