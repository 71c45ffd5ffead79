// Trait seams for everything the engine does not own.
//
// Reasoning calls (plan, review, escalation choice, scoring, fact
// extraction) and fetch operations (search, deep extraction) are blocking
// request/response contracts. A failed call degrades the step it belongs
// to; implementations must not retry silently.
//
// These seams enable deterministic testing with the mocks in `testing`:
// no network, no API keys.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use grantscout_common::{
    DeepFetchOutcome, EscalationTarget, OrgProfile, ProfileFacts, ProgramRecord, RetrievalPlan,
    ReviewVerdict, ScoredEntry, SearchOutcome,
};

/// Everything the reviewer sees about the run so far.
#[derive(Debug, Clone, Copy)]
pub struct ReviewContext<'a> {
    pub profile: &'a OrgProfile,
    /// 1-based round number that just finished.
    pub round: u32,
    /// All records accumulated so far, not yet deduplicated.
    pub records: &'a [ProgramRecord],
    /// Every phrase handed to the search executor so far.
    pub search_history: &'a [String],
    pub remaining_budget: Duration,
}

// ---------------------------------------------------------------------------
// Reasoning oracles
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Planner: Send + Sync {
    /// Turn the profile into the first round's task batch plus the
    /// compliance verdict.
    async fn plan(&self, profile: &OrgProfile) -> Result<RetrievalPlan>;
}

#[async_trait]
pub trait Reviewer: Send + Sync {
    /// Judge coverage of the current record set and propose corrective
    /// tasks for the next round.
    async fn review(&self, ctx: ReviewContext<'_>) -> Result<ReviewVerdict>;
}

#[async_trait]
pub trait EscalationJudge: Send + Sync {
    /// Pick the records worth re-fetching through the expensive path.
    async fn select_targets(&self, records: &[ProgramRecord]) -> Result<Vec<EscalationTarget>>;
}

#[async_trait]
pub trait Scorer: Send + Sync {
    /// Score the whole batch in one call. Entry indexes are 1-based
    /// positions in `records`.
    async fn score(
        &self,
        profile: &OrgProfile,
        records: &[ProgramRecord],
    ) -> Result<Vec<ScoredEntry>>;
}

#[async_trait]
pub trait ProfileAnalyst: Send + Sync {
    /// Extract supplemental profile facts from raw self-search text.
    async fn extract_facts(&self, profile: &OrgProfile, search_text: &str)
        -> Result<ProfileFacts>;
}

// ---------------------------------------------------------------------------
// Fetch executors
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SearchExecutor: Send + Sync {
    /// Run one keyword search. Zero records is a valid outcome, not an
    /// error.
    async fn search(&self, phrase: &str) -> Result<SearchOutcome>;
}

#[async_trait]
pub trait DeepFetcher: Send + Sync {
    /// Expensive multi-step extraction of one page. Materially slower and
    /// less reliable than search.
    async fn fetch(&self, url: &str, title: &str) -> Result<DeepFetchOutcome>;
}
