use async_trait::async_trait;
use bftdsn_lib::{BftDsnError, Offer, ProviderAccess, ProviderDirectory, ProviderId, ProviderStatus, SessionId, ShardHandle, StatusEvent};
use log::debug;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
};
use tokio::sync::broadcast;

const STATUS_CHANNEL_CAPACITY: usize = 256;

/// Storage-provider deployment over a plain directory tree: each provider is a
/// subdirectory `provider-<j>` of the store root, and a dealt shard is a file
/// inside its provider's subdirectory. Sessions and the shared status stream
/// follow the real deal lifecycle, so the orchestrator runs the full protocol
/// even against this local deployment.
pub struct DirectoryProviderStore {
    root: PathBuf,
    providers: Vec<ProviderId>,
    sessions: Mutex<HashMap<SessionId, PathBuf>>,
    events: broadcast::Sender<StatusEvent>,
    next_session: AtomicU64,
}

impl DirectoryProviderStore {
    /// Creates a store root with `num_providers` empty provider subdirectories.
    pub fn create(root: &Path, num_providers: usize) -> Result<Self, BftDsnError> {
        for i in 0..num_providers {
            let provider_dir = root.join(format!("provider-{}", i));
            std::fs::create_dir_all(&provider_dir).map_err(|e| BftDsnError::Io(format!("failed to create {:?}: {}", provider_dir, e)))?;
        }

        Self::open(root)
    }

    /// Opens an existing store root, listing every subdirectory as a provider.
    /// The listing is sorted by name so placement stays stable across runs.
    pub fn open(root: &Path) -> Result<Self, BftDsnError> {
        let entries = std::fs::read_dir(root).map_err(|e| BftDsnError::Io(format!("failed to read store directory {:?}: {}", root, e)))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| BftDsnError::Io(format!("failed to read store directory {:?}: {}", root, e)))?;
            if entry.path().is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();

        let (events, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        Ok(DirectoryProviderStore {
            root: root.to_path_buf(),
            providers: names.into_iter().map(ProviderId::new).collect(),
            sessions: Mutex::new(HashMap::new()),
            events,
            next_session: AtomicU64::new(1),
        })
    }

    /// Writes one shard into `provider`'s subdirectory under `handle.name`.
    pub fn store_shard(&self, provider: &ProviderId, handle: &ShardHandle, bytes: &[u8]) -> Result<(), BftDsnError> {
        let shard_path = self.shard_path(provider, handle);
        std::fs::write(&shard_path, bytes).map_err(|e| BftDsnError::Io(format!("failed to write {:?}: {}", shard_path, e)))
    }

    fn shard_path(&self, provider: &ProviderId, handle: &ShardHandle) -> PathBuf {
        self.root.join(provider.as_str()).join(&handle.name)
    }
}

impl ProviderDirectory for DirectoryProviderStore {
    fn list_providers(&self) -> Vec<ProviderId> {
        self.providers.clone()
    }
}

#[async_trait]
impl ProviderAccess for DirectoryProviderStore {
    async fn query_offer(&self, provider: &ProviderId, handle: &ShardHandle) -> Result<Offer, BftDsnError> {
        let shard_path = self.shard_path(provider, handle);
        match tokio::fs::try_exists(&shard_path).await {
            Ok(true) => Ok(Offer {
                provider: provider.clone(),
                handle: handle.clone(),
            }),
            Ok(false) => Err(BftDsnError::ProviderOfferFailed(
                provider.to_string(),
                format!("provider holds no shard named {}", handle.name),
            )),
            Err(e) => Err(BftDsnError::ProviderOfferFailed(provider.to_string(), e.to_string())),
        }
    }

    fn subscribe_status_updates(&self) -> broadcast::Receiver<StatusEvent> {
        self.events.subscribe()
    }

    async fn initiate_fetch(&self, offer: &Offer) -> Result<SessionId, BftDsnError> {
        let session = SessionId(self.next_session.fetch_add(1, Ordering::SeqCst));
        let shard_path = self.shard_path(&offer.provider, &offer.handle);

        self.sessions
            .lock()
            .map_err(|_| BftDsnError::FetchInitiationFailed(offer.provider.to_string(), "session table poisoned".to_string()))?
            .insert(session, shard_path.clone());
        debug!("session {} opened for {:?}", session, shard_path);

        let events = self.events.clone();
        tokio::spawn(async move {
            let _ = events.send(StatusEvent {
                session,
                status: ProviderStatus::Ongoing,
            });

            let status = match tokio::fs::metadata(&shard_path).await {
                Ok(metadata) if metadata.is_file() => ProviderStatus::Completed,
                Ok(_) => ProviderStatus::Errored(format!("{:?} is not a regular file", shard_path)),
                Err(e) => ProviderStatus::NotFound(format!("shard file {:?} vanished: {}", shard_path, e)),
            };
            let _ = events.send(StatusEvent { session, status });
        });

        Ok(session)
    }

    async fn export_to(&self, session: SessionId, local_path: &Path) -> Result<(), BftDsnError> {
        let shard_path = self
            .sessions
            .lock()
            .map_err(|_| BftDsnError::Io("session table poisoned".to_string()))?
            .get(&session)
            .cloned()
            .ok_or(BftDsnError::Io(format!("unknown retrieval session {}", session)))?;

        tokio::fs::copy(&shard_path, local_path)
            .await
            .map(|_| ())
            .map_err(|e| BftDsnError::Io(format!("failed to export {:?} to {:?}: {}", shard_path, local_path, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bftdsn_lib::{CodecConfig, RetrievalConfig, RetrievalOrchestrator, RetrievalOutcome, encode_with_manifest};
    use rand::Rng;
    use std::{sync::Arc, time::Duration};

    fn handle_for(index: usize) -> ShardHandle {
        ShardHandle {
            index,
            name: format!("report.bin.{}", index),
        }
    }

    #[test]
    fn test_open_lists_providers_sorted() {
        let store_dir = tempfile::tempdir().unwrap();
        DirectoryProviderStore::create(store_dir.path(), 4).unwrap();

        let reopened = DirectoryProviderStore::open(store_dir.path()).unwrap();
        let names = reopened.list_providers().iter().map(ProviderId::to_string).collect::<Vec<String>>();
        assert_eq!(names, vec!["provider-0", "provider-1", "provider-2", "provider-3"]);
    }

    #[tokio::test]
    async fn test_dealt_shards_are_retrievable_through_the_orchestrator() {
        let mut rng = rand::rng();
        let file = (0..5000).map(|_| rng.random()).collect::<Vec<u8>>();

        let config = CodecConfig::new(3, 2).unwrap();
        let (set, _) = encode_with_manifest(&file, config).unwrap();

        let store_dir = tempfile::tempdir().unwrap();
        let store = Arc::new(DirectoryProviderStore::create(store_dir.path(), 2).unwrap());

        let providers = store.list_providers();
        for index in 0..set.total_shards() {
            let bytes = set.get_shard(index).unwrap().unwrap();
            store.store_shard(&providers[index % providers.len()], &handle_for(index), bytes).unwrap();
        }

        let orchestrator = RetrievalOrchestrator::new(
            Arc::clone(&store),
            store.as_ref(),
            RetrievalConfig {
                shard_deadline: Duration::from_secs(5),
            },
        )
        .unwrap();

        let export_dir = tempfile::tempdir().unwrap();
        let handles = (0..set.total_shards()).map(handle_for).collect::<Vec<ShardHandle>>();
        let outcomes = orchestrator.retrieve_all(&handles, &export_dir.path().join("report.bin")).await;

        for (index, outcome) in outcomes.into_iter().enumerate() {
            let bytes = outcome.unwrap().into_bytes().unwrap();
            assert_eq!(bytes, set.get_shard(index).unwrap().unwrap());
        }
    }

    #[tokio::test]
    async fn test_missing_shard_resolves_to_an_offer_failure() {
        let store_dir = tempfile::tempdir().unwrap();
        let store = Arc::new(DirectoryProviderStore::create(store_dir.path(), 1).unwrap());

        let orchestrator = RetrievalOrchestrator::new(Arc::clone(&store), store.as_ref(), RetrievalConfig::default()).unwrap();
        let export_dir = tempfile::tempdir().unwrap();

        let outcome = orchestrator.retrieve_shard(&handle_for(0), &export_dir.path().join("report.bin.0")).await;
        assert!(matches!(outcome, Ok(RetrievalOutcome::NotFoundOrErrored(_))));
    }
}

