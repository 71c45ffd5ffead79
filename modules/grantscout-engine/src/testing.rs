// Test mocks for the engine's trait seams.
//
// One mock per collaborator contract:
// - MockSearch / MockDeepFetch — HashMap-based phrase/url → outcome
// - MockPlanner / MockReviewer / MockJudge / MockScorer / MockAnalyst —
//   canned answers, optional simulated outage
//
// Plus small constructors for records, tasks, verdicts, and profiles.
// Everything is deterministic: no network, no API keys, no Docker.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use grantscout_common::{
    DeepFetchOutcome, EscalationTarget, OrgProfile, ProfileFacts, ProgramRecord, QualityLabel,
    RetrievalPlan, RetrievalTask, ReviewVerdict, ScoredEntry, SearchOutcome,
};

use crate::traits::{
    DeepFetcher, EscalationJudge, Planner, ProfileAnalyst, ReviewContext, Reviewer, Scorer,
    SearchExecutor,
};

// ---------------------------------------------------------------------------
// Constructors
// ---------------------------------------------------------------------------

pub fn record(title: &str, url: &str) -> ProgramRecord {
    ProgramRecord::new(title, url)
}

pub fn task(topic: &str, phrase: &str) -> RetrievalTask {
    RetrievalTask::new(topic, phrase)
}

pub fn sample_profile() -> OrgProfile {
    let mut profile = OrgProfile::new("Acme Photonics", "photonics", "Riverside");
    profile.tags = vec!["advanced-manufacturer".into()];
    profile
}

/// A fair verdict asking for another round with the given tasks.
pub fn verdict_retry(tasks: Vec<RetrievalTask>) -> ReviewVerdict {
    ReviewVerdict {
        quality: QualityLabel::Fair,
        quality_reason: "coverage gaps remain".into(),
        coverage: Default::default(),
        needs_more: true,
        retry_tasks: tasks,
    }
}

/// A good verdict that stops the loop.
pub fn verdict_stop() -> ReviewVerdict {
    ReviewVerdict {
        quality: QualityLabel::Good,
        quality_reason: "coverage sufficient".into(),
        coverage: Default::default(),
        needs_more: false,
        retry_tasks: Vec::new(),
    }
}

pub fn scored(index: usize, composite: u32) -> ScoredEntry {
    ScoredEntry {
        index,
        composite,
        ..ScoredEntry::default()
    }
}

// ---------------------------------------------------------------------------
// MockSearch
// ---------------------------------------------------------------------------

/// HashMap-based search executor. Unregistered phrases return an empty
/// outcome (a valid result); phrases registered via `failing` error.
/// `with_latency` makes each call sleep, for paused-clock timing tests.
#[derive(Default)]
pub struct MockSearch {
    outcomes: HashMap<String, SearchOutcome>,
    failures: HashSet<String>,
    latency: Duration,
    calls: Mutex<Vec<String>>,
}

impl MockSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_search(mut self, phrase: &str, outcome: SearchOutcome) -> Self {
        self.outcomes.insert(phrase.to_string(), outcome);
        self
    }

    pub fn failing(mut self, phrase: &str) -> Self {
        self.failures.insert(phrase.to_string());
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Phrases searched so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchExecutor for MockSearch {
    async fn search(&self, phrase: &str) -> Result<SearchOutcome> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.calls.lock().unwrap().push(phrase.to_string());
        if self.failures.contains(phrase) {
            bail!("MockSearch: simulated failure for {phrase}");
        }
        Ok(self.outcomes.get(phrase).cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// MockDeepFetch
// ---------------------------------------------------------------------------

/// HashMap-based deep fetcher keyed by URL. Unregistered URLs return an
/// empty outcome; URLs registered via `failing` error.
#[derive(Default)]
pub struct MockDeepFetch {
    outcomes: HashMap<String, DeepFetchOutcome>,
    failures: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl MockDeepFetch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_fetch(mut self, url: &str, outcome: DeepFetchOutcome) -> Self {
        self.outcomes.insert(url.to_string(), outcome);
        self
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.failures.insert(url.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeepFetcher for MockDeepFetch {
    async fn fetch(&self, url: &str, _title: &str) -> Result<DeepFetchOutcome> {
        self.calls.lock().unwrap().push(url.to_string());
        if self.failures.contains(url) {
            bail!("MockDeepFetch: simulated failure for {url}");
        }
        Ok(self.outcomes.get(url).cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// MockPlanner
// ---------------------------------------------------------------------------

pub struct MockPlanner {
    plan: RetrievalPlan,
    fail: bool,
    seen: Mutex<Vec<OrgProfile>>,
}

impl MockPlanner {
    pub fn returning(plan: RetrievalPlan) -> Self {
        Self {
            plan,
            fail: false,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            plan: RetrievalPlan::default(),
            fail: true,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Profiles passed to `plan`, in call order.
    pub fn seen_profiles(&self) -> Vec<OrgProfile> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Planner for MockPlanner {
    async fn plan(&self, profile: &OrgProfile) -> Result<RetrievalPlan> {
        self.seen.lock().unwrap().push(profile.clone());
        if self.fail {
            bail!("MockPlanner: simulated planner outage");
        }
        Ok(self.plan.clone())
    }
}

// ---------------------------------------------------------------------------
// MockReviewer
// ---------------------------------------------------------------------------

/// Queue of verdicts popped one per round. An exhausted queue answers with
/// a stop verdict, so tests never loop forever by accident.
#[derive(Default)]
pub struct MockReviewer {
    verdicts: Mutex<VecDeque<ReviewVerdict>>,
    fail: bool,
    seen_rounds: Mutex<Vec<u32>>,
    seen_history: Mutex<Vec<Vec<String>>>,
}

impl MockReviewer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(self, verdict: ReviewVerdict) -> Self {
        self.verdicts.lock().unwrap().push_back(verdict);
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn seen_rounds(&self) -> Vec<u32> {
        self.seen_rounds.lock().unwrap().clone()
    }

    /// Search history snapshots as seen at each review call.
    pub fn seen_history(&self) -> Vec<Vec<String>> {
        self.seen_history.lock().unwrap().clone()
    }
}

#[async_trait]
impl Reviewer for MockReviewer {
    async fn review(&self, ctx: ReviewContext<'_>) -> Result<ReviewVerdict> {
        self.seen_rounds.lock().unwrap().push(ctx.round);
        self.seen_history
            .lock()
            .unwrap()
            .push(ctx.search_history.to_vec());
        if self.fail {
            bail!("MockReviewer: simulated reviewer outage");
        }
        Ok(self
            .verdicts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(verdict_stop))
    }
}

// ---------------------------------------------------------------------------
// MockJudge
// ---------------------------------------------------------------------------

pub struct MockJudge {
    targets: Vec<EscalationTarget>,
    fail: bool,
    calls: AtomicUsize,
}

impl MockJudge {
    pub fn returning(targets: Vec<EscalationTarget>) -> Self {
        Self {
            targets,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn none() -> Self {
        Self::returning(Vec::new())
    }

    pub fn failing() -> Self {
        Self {
            targets: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EscalationJudge for MockJudge {
    async fn select_targets(&self, _records: &[ProgramRecord]) -> Result<Vec<EscalationTarget>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.fail {
            bail!("MockJudge: simulated judge outage");
        }
        Ok(self.targets.clone())
    }
}

// ---------------------------------------------------------------------------
// MockScorer
// ---------------------------------------------------------------------------

pub struct MockScorer {
    entries: Vec<ScoredEntry>,
    fail: bool,
    calls: AtomicUsize,
}

impl MockScorer {
    pub fn returning(entries: Vec<ScoredEntry>) -> Self {
        Self {
            entries,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            entries: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Scorer for MockScorer {
    async fn score(
        &self,
        _profile: &OrgProfile,
        _records: &[ProgramRecord],
    ) -> Result<Vec<ScoredEntry>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.fail {
            bail!("MockScorer: simulated scorer outage");
        }
        Ok(self.entries.clone())
    }
}

// ---------------------------------------------------------------------------
// MockAnalyst
// ---------------------------------------------------------------------------

pub struct MockAnalyst {
    facts: ProfileFacts,
    fail: bool,
    calls: AtomicUsize,
}

impl MockAnalyst {
    pub fn returning(facts: ProfileFacts) -> Self {
        Self {
            facts,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            facts: ProfileFacts::default(),
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ProfileAnalyst for MockAnalyst {
    async fn extract_facts(
        &self,
        _profile: &OrgProfile,
        _search_text: &str,
    ) -> Result<ProfileFacts> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.fail {
            bail!("MockAnalyst: simulated analyst outage");
        }
        Ok(self.facts.clone())
    }
}
