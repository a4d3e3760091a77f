use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};

use lore_core::ids::{PageId, SuggestionId};
use lore_core::page::PageCandidate;
use lore_core::suggestion::Suggestion;
use lore_store::suggestions::SuggestionRepo;

use crate::error::EngineError;

const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Seam to the external page index.
#[async_trait]
pub trait PageIndex: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<PageCandidate>, EngineError>;
}

/// Outcome of a debounced search. `EmptyQuery` and `NoMatches` are
/// distinct states for the caller; `Superseded` marks a stale result
/// that must be discarded, not merged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SearchOutcome {
    EmptyQuery,
    NoMatches,
    Matches(Vec<PageCandidate>),
    Superseded,
}

/// Result of re-targeting a suggestion.
#[derive(Clone, Debug)]
pub enum RebindOutcome {
    /// The suggestion already pointed at that page. Idempotent success;
    /// no activity entry is written.
    Unchanged(Suggestion),
    Rebound(Suggestion),
}

impl RebindOutcome {
    pub fn suggestion(&self) -> &Suggestion {
        match self {
            Self::Unchanged(s) | Self::Rebound(s) => s,
        }
    }
}

/// Search-and-select flow for pointing a suggestion at a different
/// canonical page.
///
/// Every `search` call takes a fresh generation number; only the
/// highest generation's result is surfaced, so a slow lookup that
/// resolves after a newer query was issued is suppressed instead of
/// flickering stale results at the reviewer.
pub struct PageResolver {
    index: Arc<dyn PageIndex>,
    suggestions: SuggestionRepo,
    generation: AtomicU64,
    debounce: Duration,
}

impl PageResolver {
    pub fn new(index: Arc<dyn PageIndex>, suggestions: SuggestionRepo) -> Self {
        Self {
            index,
            suggestions,
            generation: AtomicU64::new(0),
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Debounced query against the page index.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> Result<SearchOutcome, EngineError> {
        // Every call claims a generation, so even an empty query
        // invalidates slower lookups already in flight.
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let query = query.trim();
        if query.is_empty() {
            return Ok(SearchOutcome::EmptyQuery);
        }

        tokio::time::sleep(self.debounce).await;
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "search superseded during debounce");
            return Ok(SearchOutcome::Superseded);
        }

        let results = self.index.search(query).await?;
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "search superseded after lookup");
            return Ok(SearchOutcome::Superseded);
        }

        if results.is_empty() {
            Ok(SearchOutcome::NoMatches)
        } else {
            Ok(SearchOutcome::Matches(results))
        }
    }

    /// Point a suggestion at a different canonical page. Status is not
    /// affected by rebinding.
    #[instrument(skip(self), fields(suggestion_id = %suggestion_id, page_id = %page_id))]
    pub fn rebind(
        &self,
        suggestion_id: &SuggestionId,
        page_id: &PageId,
    ) -> Result<RebindOutcome, EngineError> {
        let suggestion = self.suggestions.get(suggestion_id)?;
        if suggestion.target_page.as_ref() == Some(page_id) {
            return Ok(RebindOutcome::Unchanged(suggestion));
        }

        self.suggestions.set_target_page(suggestion_id, page_id)?;
        Ok(RebindOutcome::Rebound(self.suggestions.get(suggestion_id)?))
    }
}
