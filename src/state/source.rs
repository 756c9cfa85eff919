/// Entry source: retrieval, filtering, pagination and shuffling
///
/// The full record set is downloaded once per process and kept in memory.
/// Each route entry starts a new session for its category: the filtered
/// (and for `random`, shuffled) sequence is built on the first request of
/// the session and reused for every later page, so pages never overlap
/// or skip.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

use super::data::{Category, Entry, SourceRecord};
use crate::cache::{CacheCoordinator, Network, ResponseOrigin};

/// Failure to retrieve the entry source document
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RetrievalError {
    #[error("entry source answered HTTP {0}")]
    Status(u16),

    #[error("entry source unreachable and no offline copy exists")]
    Unavailable,

    #[error("entry source is not a valid design list: {0}")]
    Decode(String),
}

/// Retrieves the complete, unfiltered record set
pub trait EntryFetcher: Send + Sync + 'static {
    fn fetch_all(&self) -> impl Future<Output = Result<Vec<SourceRecord>, RetrievalError>> + Send;
}

/// Fetches the entry document through the offline cache, so the last
/// good copy is used when the network is down
pub struct CachedEntryFetcher<N> {
    coordinator: Arc<CacheCoordinator<N>>,
    data_url: String,
}

impl<N> CachedEntryFetcher<N> {
    pub fn new(coordinator: Arc<CacheCoordinator<N>>, data_url: impl Into<String>) -> Self {
        Self {
            coordinator,
            data_url: data_url.into(),
        }
    }
}

impl<N: Network> EntryFetcher for CachedEntryFetcher<N> {
    async fn fetch_all(&self) -> Result<Vec<SourceRecord>, RetrievalError> {
        let response = self.coordinator.handle(&self.data_url).await;

        if response.origin == ResponseOrigin::Synthetic {
            return Err(RetrievalError::Unavailable);
        }
        if !response.is_success() {
            return Err(RetrievalError::Status(response.status));
        }

        serde_json::from_slice(&response.body).map_err(|e| RetrievalError::Decode(e.to_string()))
    }
}

/// Paginated view over the entry source
pub struct PageSource<F> {
    fetcher: F,
    page_size: usize,
    /// Full record set, fetched once per process lifetime
    records: Option<Arc<Vec<SourceRecord>>>,
    /// Ordered entry sequence of the current session, per category.
    /// Keyed so a late request for an abandoned route can't disturb the active one.
    sessions: HashMap<Category, Vec<Entry>>,
    rng: fastrand::Rng,
}

impl<F: EntryFetcher> PageSource<F> {
    pub fn new(fetcher: F, page_size: usize) -> Self {
        Self::with_rng(fetcher, page_size, fastrand::Rng::new())
    }

    /// Build with a specific random generator (deterministic shuffles in tests)
    pub fn with_rng(fetcher: F, page_size: usize, rng: fastrand::Rng) -> Self {
        Self {
            fetcher,
            page_size: page_size.max(1),
            records: None,
            sessions: HashMap::new(),
            rng,
        }
    }

    /// Start a new session. The next request rebuilds the sequence,
    /// reshuffling if the category is `random`.
    pub fn enter_route(&mut self, category: &Category) {
        log::debug!("Entering route session for category '{}'", category);
        self.sessions.remove(category);
    }

    /// Get one page of entries. An empty page means there is no more data.
    pub async fn get_entries(
        &mut self,
        category: &Category,
        page_number: u32,
    ) -> Result<Vec<Entry>, RetrievalError> {
        let records = self.all_records().await?;

        if page_number == 0 {
            return Ok(Vec::new());
        }

        if !self.sessions.contains_key(category) {
            let sequence = self.build_sequence(category, &records);
            self.sessions.insert(category.clone(), sequence);
        }
        let sequence = match self.sessions.get(category) {
            Some(sequence) => sequence,
            None => return Ok(Vec::new()),
        };

        let start = (page_number as usize - 1)
            .saturating_mul(self.page_size)
            .min(sequence.len());
        let end = start.saturating_add(self.page_size).min(sequence.len());

        log::debug!(
            "Page {} of '{}': entries [{}, {}) of {}",
            page_number,
            category,
            start,
            end,
            sequence.len()
        );
        Ok(sequence[start..end].to_vec())
    }

    /// Fetch the record set on first use; failures are not remembered
    async fn all_records(&mut self) -> Result<Arc<Vec<SourceRecord>>, RetrievalError> {
        if let Some(records) = &self.records {
            return Ok(records.clone());
        }

        let records = Arc::new(self.fetcher.fetch_all().await?);
        log::info!("📥 Loaded {} designs from the entry source", records.len());
        self.records = Some(records.clone());
        Ok(records)
    }

    fn build_sequence(&mut self, category: &Category, records: &[SourceRecord]) -> Vec<Entry> {
        let mut selected: Vec<&SourceRecord> = records
            .iter()
            .filter(|record| category.matches(&record.category))
            .collect();

        if *category == Category::Random {
            // Fisher-Yates
            self.rng.shuffle(&mut selected);
        }

        selected
            .into_iter()
            .enumerate()
            .map(|(id, record)| Entry::from_record(id, record))
            .collect()
    }
}
