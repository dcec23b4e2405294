//! Query service over the published [`SearchIndex`].
//!
//! The engine owns the current index behind a `tokio::sync::watch` channel.
//! Loading happens off to the side (on the blocking pool) and ends with a
//! single channel update, so readers observe either the previous index or
//! the new one. Each load reserves a generation up front and a stale load
//! never replaces a newer index. Queries issued while the first load is still running park on
//! the channel until it settles.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::CacheConfig;
use crate::error::{NominaError, Result};
use crate::ingest::{BulkLoader, LoadReport};
use crate::model::PayrollRecord;
use crate::search::cache::{CacheStats, RecencyCache};
use crate::search::index::SearchIndex;

pub type Hits = Vec<Arc<PayrollRecord>>;

/// A published index and the generation it was published as.
#[derive(Debug, Clone)]
pub struct IndexSnapshot {
    pub generation: u64,
    pub index: Arc<SearchIndex>,
}

#[derive(Debug, Clone)]
pub enum IndexState {
    /// No index has been published yet.
    Pending,
    Ready(IndexSnapshot),
    /// The first load ended without an index.
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    Rfc,
    Name,
}

impl QueryKind {
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Rfc => "rfc",
            Self::Name => "name",
        }
    }
}

/// Cache key: query kind plus normalized text, scoped to one index generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub generation: u64,
    pub kind: QueryKind,
    pub text: String,
}

impl QueryKey {
    #[must_use]
    pub fn new(generation: u64, kind: QueryKind, query: &str) -> Self {
        let upper = query.trim().to_uppercase();
        let text = match kind {
            QueryKind::Rfc => upper,
            QueryKind::Name => upper.split_whitespace().collect::<Vec<_>>().join(" "),
        };
        Self {
            generation,
            kind,
            text,
        }
    }
}

/// Result of a non-blocking query.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    NotReady,
    Found(Hits),
}

/// Result of a free-text lookup: RFC first, then name.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Idle,
    Found { matched_by: QueryKind, records: Hits },
    NotFound,
}

pub struct SearchEngine {
    state: watch::Sender<IndexState>,
    cache: Option<RecencyCache<QueryKey, Hits>>,
    generation: AtomicU64,
}

impl SearchEngine {
    /// Engine with a result cache of `cache_capacity` entries (`None` disables caching).
    #[must_use]
    pub fn new(cache_capacity: Option<usize>) -> Self {
        Self {
            state: watch::Sender::new(IndexState::Pending),
            cache: cache_capacity.map(RecencyCache::new),
            generation: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.enabled.then_some(config.capacity))
    }

    #[must_use]
    pub fn state(&self) -> IndexState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(*self.state.borrow(), IndexState::Ready(_))
    }

    #[must_use]
    pub fn snapshot(&self) -> Option<IndexSnapshot> {
        match &*self.state.borrow() {
            IndexState::Ready(snapshot) => Some(snapshot.clone()),
            _ => None,
        }
    }

    /// Swap in a fully built index and return its generation.
    ///
    /// The generation is taken while the channel's write lock is held, so
    /// concurrent publishers land in generation order.
    pub fn publish(&self, index: SearchIndex) -> u64 {
        let records = index.len();
        let mut generation = 0;
        self.state.send_modify(|state| {
            generation = self.next_generation();
            *state = IndexState::Ready(IndexSnapshot {
                generation,
                index: Arc::new(index),
            });
        });
        self.published(generation, records);
        generation
    }

    /// Publish `index` as `generation`, unless a newer generation is already
    /// in service. Returns whether the index went live.
    fn publish_as(&self, generation: u64, index: SearchIndex) -> bool {
        let records = index.len();
        let swapped = self.state.send_if_modified(|state| {
            if matches!(state, IndexState::Ready(current) if current.generation > generation) {
                return false;
            }
            *state = IndexState::Ready(IndexSnapshot {
                generation,
                index: Arc::new(index),
            });
            true
        });
        if swapped {
            self.published(generation, records);
        } else {
            tracing::warn!(generation, records, "superseded index discarded");
        }
        swapped
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn published(&self, generation: u64, records: usize) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
        tracing::info!(generation, records, "search index published");
    }

    /// Record a load failure. A previously published index stays in service.
    pub fn mark_failed(&self, reason: impl Into<String>) {
        let reason = reason.into();
        let replaced = self.state.send_if_modified(|state| {
            if matches!(state, IndexState::Ready(_)) {
                false
            } else {
                *state = IndexState::Failed(reason.clone());
                true
            }
        });
        if replaced {
            tracing::error!(%reason, "payroll index load failed");
        } else {
            tracing::warn!(%reason, "reload failed, keeping current index");
        }
    }

    /// Load and index `loader`'s source on the blocking pool.
    ///
    /// Must be called from within a tokio runtime. The returned handle
    /// resolves once the new index is published (or the load failed).
    pub fn spawn_load(self: &Arc<Self>, loader: BulkLoader) -> JoinHandle<Result<LoadReport>> {
        let engine = Arc::clone(self);
        tokio::task::spawn_blocking(move || engine.load_blocking(&loader))
    }

    /// Synchronous load + build + publish.
    ///
    /// The load's generation is reserved before reading starts; if a load
    /// that started later has already published, this one's index is dropped.
    pub fn load_blocking(&self, loader: &BulkLoader) -> Result<LoadReport> {
        let generation = self.next_generation();
        let built = loader
            .load_all()
            .and_then(|(records, report)| Ok((SearchIndex::build(records)?, report)));
        match built {
            Ok((index, report)) => {
                tracing::debug!(
                    rfc_keys = index.rfc_keys(),
                    name_terms = index.name_terms(),
                    "index built"
                );
                self.publish_as(generation, index);
                Ok(report)
            }
            Err(err) => {
                self.mark_failed(err.to_string());
                Err(err)
            }
        }
    }

    /// Wait until an index is published or the first load has failed.
    pub async fn wait_ready(&self) -> Result<IndexSnapshot> {
        let mut rx = self.state.subscribe();
        let state = rx
            .wait_for(|state| !matches!(state, IndexState::Pending))
            .await
            .map_err(|_| NominaError::IndexUnavailable("search engine shut down".to_string()))?;
        match &*state {
            IndexState::Ready(snapshot) => Ok(snapshot.clone()),
            IndexState::Failed(reason) => Err(NominaError::IndexUnavailable(reason.clone())),
            IndexState::Pending => Err(NominaError::IndexUnavailable(
                "index still pending".to_string(),
            )),
        }
    }

    pub async fn search_by_rfc(&self, rfc: &str) -> Result<Hits> {
        let snapshot = self.wait_ready().await?;
        Ok(self.run_query(&snapshot, QueryKind::Rfc, rfc))
    }

    pub async fn search_by_name(&self, name: &str) -> Result<Hits> {
        let snapshot = self.wait_ready().await?;
        Ok(self.run_query(&snapshot, QueryKind::Name, name))
    }

    pub fn try_search_by_rfc(&self, rfc: &str) -> Result<SearchOutcome> {
        self.try_query(QueryKind::Rfc, rfc)
    }

    pub fn try_search_by_name(&self, name: &str) -> Result<SearchOutcome> {
        self.try_query(QueryKind::Name, name)
    }

    /// Interpret free text: an RFC lookup first, a name search if that finds nothing.
    pub async fn lookup(&self, query: &str) -> Result<LookupOutcome> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(LookupOutcome::Idle);
        }

        let snapshot = self.wait_ready().await?;
        for kind in [QueryKind::Rfc, QueryKind::Name] {
            let records = self.run_query(&snapshot, kind, query);
            if !records.is_empty() {
                return Ok(LookupOutcome::Found {
                    matched_by: kind,
                    records,
                });
            }
        }
        Ok(LookupOutcome::NotFound)
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    #[must_use]
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(RecencyCache::stats)
    }

    fn try_query(&self, kind: QueryKind, query: &str) -> Result<SearchOutcome> {
        match self.state() {
            IndexState::Pending => Ok(SearchOutcome::NotReady),
            IndexState::Failed(reason) => Err(NominaError::IndexUnavailable(reason)),
            IndexState::Ready(snapshot) => {
                Ok(SearchOutcome::Found(self.run_query(&snapshot, kind, query)))
            }
        }
    }

    fn run_query(&self, snapshot: &IndexSnapshot, kind: QueryKind, query: &str) -> Hits {
        let key = QueryKey::new(snapshot.generation, kind, query);
        if key.text.is_empty() {
            return Vec::new();
        }

        if let Some(hit) = self.cache.as_ref().and_then(|cache| cache.get(&key)) {
            tracing::trace!(kind = kind.prefix(), query = %key.text, "cache hit");
            return hit;
        }

        let records = match kind {
            QueryKind::Rfc => snapshot.index.search_by_rfc(&key.text),
            QueryKind::Name => snapshot.index.search_by_name(&key.text),
        };
        tracing::debug!(
            kind = kind.prefix(),
            query = %key.text,
            results = records.len(),
            "index search"
        );
        if let Some(cache) = &self.cache {
            cache.set(key, records.clone());
        }
        records
    }
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}
