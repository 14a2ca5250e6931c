// Results views: one search session per browser, with sequence-tagged commits
// so a slow response for an old filter state never overwrites newer results

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use cached::{Cached, TimedCache};
use tokio::sync::{Mutex, RwLock, watch};
use uuid::Uuid;

use crate::backend::Backend;
use crate::filters::{FilterManager, FilterState, FilterUpdate};
use crate::models::QueryResult;
use crate::query;

// How long a superseded request waits for the newer query to commit
const SUPERSEDED_WAIT: Duration = Duration::from_secs(10);

pub struct SearchSession {
    filters: FilterManager,
    changes: Mutex<watch::Receiver<FilterState>>,
    latest: AtomicU64,
    result: RwLock<Option<QueryResult>>,
    committed: watch::Sender<u64>,
    backend: Arc<dyn Backend>,
}

impl SearchSession {
    #[cfg(test)]
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self::with_filters(backend, FilterState::default())
    }

    pub fn with_filters(backend: Arc<dyn Backend>, initial: FilterState) -> Self {
        let filters = FilterManager::with_state(initial);
        let changes = Mutex::new(filters.subscribe());
        SearchSession {
            filters,
            changes,
            latest: AtomicU64::new(0),
            result: RwLock::new(None),
            committed: watch::channel(0).0,
            backend,
        }
    }

    pub fn filters(&self) -> FilterState {
        self.filters.current()
    }

    pub fn set_field(&self, update: FilterUpdate) -> bool {
        self.filters.set_field(update)
    }

    pub fn clear(&self) -> bool {
        self.filters.clear()
    }

    /// True when the filters changed since the last query, when none has run
    /// yet, or when the last one failed. A failed view is queried again the
    /// next time it is opened, never automatically.
    pub async fn needs_refresh(&self) -> bool {
        let changed = self.changes.lock().await.has_changed().unwrap_or(false);
        changed
            || self
                .result
                .read()
                .await
                .as_ref()
                .is_none_or(|result| result.error.is_some())
    }

    /// Queries with the current filters. Returns the result if it was
    /// committed, or `None` if a newer query superseded it.
    pub async fn refresh(&self) -> Option<QueryResult> {
        let (tag, state) = {
            let mut changes = self.changes.lock().await;
            let state = changes.borrow_and_update().clone();
            let tag = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
            (tag, state)
        };

        let outcome = query::execute(self.backend.as_ref(), &state).await;

        let mut slot = self.result.write().await;
        if self.latest.load(Ordering::SeqCst) != tag {
            tracing::debug!(tag, "Discarding superseded search response");
            return None;
        }
        *slot = Some(outcome.clone());
        self.committed.send_replace(tag);
        Some(outcome)
    }

    /// Current filters with the last committed result, querying first if stale.
    pub async fn snapshot(&self) -> (FilterState, QueryResult) {
        if self.needs_refresh().await && self.refresh().await.is_none() {
            self.await_newer_commit().await;
        }
        let result = self.result.read().await.clone().unwrap_or_default();
        (self.filters(), result)
    }

    // Our query was superseded: wait for the newest one to commit
    async fn await_newer_commit(&self) {
        let newest = self.latest.load(Ordering::SeqCst);
        let mut committed = self.committed.subscribe();
        let arrived = tokio::time::timeout(SUPERSEDED_WAIT, async {
            while *committed.borrow_and_update() < newest {
                if committed.changed().await.is_err() {
                    break;
                }
            }
        })
        .await
        .is_ok();

        if !arrived {
            tracing::warn!(newest, "Newer search response still pending; querying again");
            self.refresh().await;
        }
    }
}

/// Search sessions keyed by the browser's search cookie; idle ones expire.
pub struct SearchSessions {
    sessions: Mutex<TimedCache<Uuid, Arc<SearchSession>>>,
    backend: Arc<dyn Backend>,
}

impl SearchSessions {
    pub fn new(backend: Arc<dyn Backend>, ttl_secs: u64) -> Self {
        SearchSessions {
            sessions: Mutex::new(TimedCache::with_lifespan(ttl_secs)),
            backend,
        }
    }

    /// Existing session for the id, or a fresh one with default filters.
    pub async fn get_or_create(&self, id: Option<Uuid>) -> (Uuid, Arc<SearchSession>) {
        let mut sessions = self.sessions.lock().await;
        if let Some(id) = id {
            if let Some(session) = sessions.cache_get(&id).cloned() {
                // Touch so the lifespan counts from the latest use
                sessions.cache_set(id, session.clone());
                return (id, session);
            }
        }
        self.open(&mut sessions, FilterState::default())
    }

    /// Opens a new results view seeded with `filters`, discarding the
    /// browser's previous one.
    pub async fn start(&self, previous: Option<Uuid>, filters: FilterState) -> (Uuid, Arc<SearchSession>) {
        let mut sessions = self.sessions.lock().await;
        if let Some(previous) = previous {
            if sessions.cache_remove(&previous).is_some() {
                tracing::info!("Closed search session {}", previous);
            }
        }
        self.open(&mut sessions, filters)
    }

    fn open(
        &self,
        sessions: &mut TimedCache<Uuid, Arc<SearchSession>>,
        filters: FilterState,
    ) -> (Uuid, Arc<SearchSession>) {
        // Expired sessions are otherwise only dropped when their own id returns
        sessions.flush();
        let id = Uuid::new_v4();
        let session = Arc::new(SearchSession::with_filters(self.backend.clone(), filters));
        sessions.cache_set(id, session.clone());
        tracing::info!(open = sessions.cache_size(), "Opened search session {}", id);
        (id, session)
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.cache_size()
    }
}
