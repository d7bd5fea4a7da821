use crate::errors::BftDsnError;
use async_trait::async_trait;
use log::{debug, warn};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::{sync::broadcast, task::JoinSet, time::timeout};

/// Opaque identifier of one storage provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProviderId(String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Self {
        ProviderId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Addresses one shard of one encoded set: the set-level name plus the shard
/// index within it. `name` doubles as the shard's file name on provider side.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ShardHandle {
    pub index: usize,
    pub name: String,
}

/// A provider's answer to an offer query, consumed by `initiate_fetch`.
#[derive(Clone, Debug)]
pub struct Offer {
    pub provider: ProviderId,
    pub handle: ShardHandle,
}

/// Identifier of one retrieval session (deal), allocated by the provider at
/// fetch initiation and used to filter the shared status stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Provider-reported retrieval status. `Ongoing` is the only non-terminal
/// variant; everything else finalizes the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderStatus {
    Ongoing,
    Completed,
    Rejected(String),
    Cancelled(String),
    NotFound(String),
    Errored(String),
}

/// One entry of the live status stream. Events for sessions other than the
/// subscriber's own are expected and must be discarded, not reordered.
#[derive(Clone, Debug)]
pub struct StatusEvent {
    pub session: SessionId,
    pub status: ProviderStatus,
}

/// Seam to the external storage-market system. Deal proposal, payment and the
/// concrete transfer protocol all live behind this trait.
#[async_trait]
pub trait ProviderAccess: Send + Sync + 'static {
    async fn query_offer(&self, provider: &ProviderId, handle: &ShardHandle) -> Result<Offer, BftDsnError>;

    /// Subscribes to the shared status stream. Must be called *before*
    /// `initiate_fetch`: the session id needed for filtering is only known
    /// after initiation, and subscribing later can lose the terminal event
    /// that arrives concurrently.
    fn subscribe_status_updates(&self) -> broadcast::Receiver<StatusEvent>;

    async fn initiate_fetch(&self, offer: &Offer) -> Result<SessionId, BftDsnError>;

    async fn export_to(&self, session: SessionId, local_path: &Path) -> Result<(), BftDsnError>;
}

/// Source of the ordered provider list used for round-robin placement.
pub trait ProviderDirectory: Send + Sync {
    fn list_providers(&self) -> Vec<ProviderId>;
}

/// Terminal per-shard retrieval result. Finalized exactly once; aggregation
/// consumes these immediately.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RetrievalOutcome {
    Completed(Vec<u8>),
    Rejected(String),
    Cancelled(String),
    NotFoundOrErrored(String),
    TimedOut,
}

impl RetrievalOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RetrievalOutcome::Completed(_))
    }

    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            RetrievalOutcome::Completed(bytes) => Some(bytes),
            _ => None,
        }
    }
}

impl std::fmt::Display for RetrievalOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetrievalOutcome::Completed(bytes) => write!(f, "completed ({}B)", bytes.len()),
            RetrievalOutcome::Rejected(msg) => write!(f, "retrieval proposal rejected: {}", msg),
            RetrievalOutcome::Cancelled(msg) => write!(f, "retrieval proposal cancelled: {}", msg),
            RetrievalOutcome::NotFoundOrErrored(msg) => write!(f, "retrieval error: {}", msg),
            RetrievalOutcome::TimedOut => write!(f, "retrieval timed out"),
        }
    }
}

/// Caller-supplied bounds for the per-shard retrieval protocol.
#[derive(Clone, Copy, Debug)]
pub struct RetrievalConfig {
    /// Deadline for one shard's full query/fetch/export cycle. An expired
    /// deadline resolves that shard to `TimedOut` without blocking siblings.
    pub shard_deadline: Duration,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        RetrievalConfig {
            shard_deadline: Duration::from_secs(30),
        }
    }
}

enum TerminalWait {
    Terminal(ProviderStatus),
    StreamClosed,
}

/// Drives the four-step per-shard retrieval protocol (query offer, subscribe,
/// fetch, export) against a `ProviderAccess` implementation and aggregates
/// per-shard outcomes across a whole shard set.
///
/// Shard fetches are independent: each runs as its own task writing into a
/// disjoint result slot, and one shard's failure never aborts the rest.
pub struct RetrievalOrchestrator<P: ProviderAccess> {
    access: Arc<P>,
    providers: Vec<ProviderId>,
    config: RetrievalConfig,
}

impl<P: ProviderAccess> Clone for RetrievalOrchestrator<P> {
    fn clone(&self) -> Self {
        RetrievalOrchestrator {
            access: Arc::clone(&self.access),
            providers: self.providers.clone(),
            config: self.config,
        }
    }
}

impl<P: ProviderAccess> RetrievalOrchestrator<P> {
    /// Creates an orchestrator over the providers listed by `directory`.
    ///
    /// # Returns
    ///
    /// Returns a `Result` which is:
    /// - `Ok(RetrievalOrchestrator)` on success.
    /// - `Err(BftDsnError::NoProvidersAvailable)` if the directory is empty.
    pub fn new(access: Arc<P>, directory: &dyn ProviderDirectory, config: RetrievalConfig) -> Result<Self, BftDsnError> {
        let providers = directory.list_providers();
        if providers.is_empty() {
            return Err(BftDsnError::NoProvidersAvailable);
        }

        Ok(RetrievalOrchestrator { access, providers, config })
    }

    /// Fixed round-robin placement: shard i lives with provider `i mod n`.
    pub fn provider_for(&self, shard_index: usize) -> &ProviderId {
        &self.providers[shard_index % self.providers.len()]
    }

    /// Retrieves every shard concurrently, exporting shard i to
    /// `<export_base>.<i>`, and returns the outcomes ordered like `handles`.
    ///
    /// Per-shard provider failures are contained in `RetrievalOutcome`; an
    /// `Err` entry means a local failure (export or task) for that shard only.
    pub async fn retrieve_all(&self, handles: &[ShardHandle], export_base: &Path) -> Vec<Result<RetrievalOutcome, BftDsnError>> {
        let mut join_set = JoinSet::new();
        for (slot, handle) in handles.iter().enumerate() {
            let orchestrator = self.clone();
            let handle = handle.clone();
            let export_path = shard_file_path(export_base, handle.index);

            join_set.spawn(async move { (slot, orchestrator.retrieve_shard(&handle, &export_path).await) });
        }

        let mut results: Vec<Result<RetrievalOutcome, BftDsnError>> = (0..handles.len())
            .map(|_| Err(BftDsnError::RetrievalTaskFailed("task never reported".to_string())))
            .collect();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((slot, result)) => results[slot] = result,
                Err(err) => warn!("retrieval task aborted: {}", err),
            }
        }

        results
    }

    /// Runs the retrieval protocol for a single shard and exports the fetched
    /// bytes to `export_path` on success.
    ///
    /// The status subscription is established before `initiate_fetch` returns
    /// the session id, then narrowed to a fetch-scoped completion wait; events
    /// for other sessions are discarded.
    pub async fn retrieve_shard(&self, handle: &ShardHandle, export_path: &Path) -> Result<RetrievalOutcome, BftDsnError> {
        let provider = self.provider_for(handle.index);
        debug!("shard {}: querying offer from provider {}", handle.index, provider);

        let offer = match self.access.query_offer(provider, handle).await {
            Ok(offer) => offer,
            Err(err) => return Ok(RetrievalOutcome::NotFoundOrErrored(err.to_string())),
        };

        let updates = self.access.subscribe_status_updates();
        let session = match self.access.initiate_fetch(&offer).await {
            Ok(session) => session,
            Err(err) => return Ok(RetrievalOutcome::NotFoundOrErrored(err.to_string())),
        };
        debug!("shard {}: fetch session {} initiated", handle.index, session);

        let status = match timeout(self.config.shard_deadline, await_terminal_status(updates, session)).await {
            Ok(TerminalWait::Terminal(status)) => status,
            Ok(TerminalWait::StreamClosed) => return Err(BftDsnError::StatusStreamClosed),
            Err(_) => {
                warn!("shard {}: no terminal status within deadline", handle.index);
                return Ok(RetrievalOutcome::TimedOut);
            }
        };

        match status {
            ProviderStatus::Completed => {
                self.access
                    .export_to(session, export_path)
                    .await
                    .map_err(|err| BftDsnError::ShardExportFailed(handle.index, err.to_string()))?;
                let bytes = tokio::fs::read(export_path)
                    .await
                    .map_err(|err| BftDsnError::ShardExportFailed(handle.index, err.to_string()))?;

                debug!("shard {}: exported {}B to {:?}", handle.index, bytes.len(), export_path);
                Ok(RetrievalOutcome::Completed(bytes))
            }
            ProviderStatus::Rejected(msg) => Ok(RetrievalOutcome::Rejected(msg)),
            ProviderStatus::Cancelled(msg) => Ok(RetrievalOutcome::Cancelled(msg)),
            ProviderStatus::NotFound(msg) | ProviderStatus::Errored(msg) => Ok(RetrievalOutcome::NotFoundOrErrored(msg)),
            // Cannot surface from await_terminal_status.
            ProviderStatus::Ongoing => Err(BftDsnError::RetrievalTaskFailed("non-terminal status escaped the wait loop".to_string())),
        }
    }
}

/// Resolves once the first terminal status for `session` arrives. Events for
/// other sessions are skipped in arrival order; within one session the stream
/// is assumed monotonic, so first terminal match wins.
async fn await_terminal_status(mut updates: broadcast::Receiver<StatusEvent>, session: SessionId) -> TerminalWait {
    loop {
        match updates.recv().await {
            Ok(event) => {
                if event.session != session {
                    continue;
                }
                match event.status {
                    ProviderStatus::Ongoing => continue,
                    terminal => return TerminalWait::Terminal(terminal),
                }
            }
            // Missed events are tolerable: the deadline bounds the wait if the
            // terminal event itself was among them.
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => return TerminalWait::StreamClosed,
        }
    }
}

/// On-disk naming convention for shard i of `base`: `<base>.<i>`.
pub fn shard_file_path(base: &Path, index: usize) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(format!(".{}", index));
    PathBuf::from(name)
}
