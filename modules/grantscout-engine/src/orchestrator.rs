use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;
use url::Url;
use uuid::Uuid;

use grantscout_common::{
    ComplianceRisk, FatalError, OrgProfile, ProgramRecord, RunResult, UsageCounters,
};

use crate::budget::BudgetClock;
use crate::enrich::ProfileEnricher;
use crate::escalation::EscalationSelector;
use crate::executor::TaskExecutor;
use crate::ranker::Ranker;
use crate::review::ReviewGate;
use crate::store::RecordStore;
use crate::traits::{
    DeepFetcher, EscalationJudge, Planner, ProfileAnalyst, ReviewContext, Reviewer, Scorer,
    SearchExecutor,
};

pub const DEFAULT_TIME_BUDGET: Duration = Duration::from_secs(360);
pub const DEFAULT_MAX_ROUNDS: u32 = 3;
pub const DEFAULT_REQUEST_PACING: Duration = Duration::from_secs(2);
/// A review pass is itself budgeted work; below this remainder it is not
/// started at all.
pub const REVIEW_MIN_BUDGET: Duration = Duration::from_secs(45);
/// Minimum remainder for one deep-fetch pass; below it the whole escalation
/// phase is skipped rather than attempted partially.
pub const DEEP_FETCH_MIN_BUDGET: Duration = Duration::from_secs(90);

/// Topic a blocked organization's task list is narrowed down to.
const COMPLIANCE_TOPIC: &str = "compliance";

/// Tuning for one orchestration run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub total_budget: Duration,
    pub max_rounds: u32,
    pub request_pacing: Duration,
    /// Disable the escalation phase entirely.
    pub skip_deep_fetch: bool,
    /// Disable pre-planning profile enrichment.
    pub skip_enrichment: bool,
    pub review_min_budget: Duration,
    pub deep_fetch_min_budget: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            total_budget: DEFAULT_TIME_BUDGET,
            max_rounds: DEFAULT_MAX_ROUNDS,
            request_pacing: DEFAULT_REQUEST_PACING,
            skip_deep_fetch: false,
            skip_enrichment: false,
            review_min_budget: REVIEW_MIN_BUDGET,
            deep_fetch_min_budget: DEEP_FETCH_MIN_BUDGET,
        }
    }
}

/// The round loop: plan once, then search → review → search … while the
/// reviewer asks for more and the budget holds, then escalate, merge,
/// and rank.
///
/// Owns its collaborator handles; each `run` owns a fresh clock and record
/// store, so concurrent runs for different organizations never share state.
#[derive(TypedBuilder)]
pub struct Orchestrator {
    planner: Arc<dyn Planner>,
    reviewer: Arc<dyn Reviewer>,
    escalation_judge: Arc<dyn EscalationJudge>,
    scorer: Arc<dyn Scorer>,
    analyst: Arc<dyn ProfileAnalyst>,
    search: Arc<dyn SearchExecutor>,
    deep_fetcher: Arc<dyn DeepFetcher>,
    #[builder(default)]
    config: EngineConfig,
}

impl Orchestrator {
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn run(&self, profile: OrgProfile) -> RunResult {
        let run_id = Uuid::new_v4();
        let clock = BudgetClock::start(self.config.total_budget, self.config.request_pacing);
        let org_name = profile.name.clone();
        let mut usage = UsageCounters::default();

        info!(
            run_id = %run_id,
            org = org_name.as_str(),
            budget_secs = self.config.total_budget.as_secs(),
            max_rounds = self.config.max_rounds,
            pacing_secs = self.config.request_pacing.as_secs(),
            "orchestration run started"
        );

        // Step 0: profile enrichment.
        let profile = if self.config.skip_enrichment {
            profile
        } else {
            let enricher =
                ProfileEnricher::new(self.search.as_ref(), self.analyst.as_ref(), &clock);
            let (enriched, enrich_usage) = enricher.enrich(&profile).await;
            usage.absorb(&enrich_usage);
            enriched
        };

        // Planning.
        let plan = match self.planner.plan(&profile).await {
            Ok(plan) => plan,
            Err(e) => {
                warn!(error = %e, "planner call failed");
                return self.finish_fatal(
                    run_id,
                    org_name,
                    &clock,
                    0,
                    usage,
                    FatalError::PlannerUnavailable {
                        detail: e.to_string(),
                    },
                );
            }
        };
        if !plan.analysis.is_empty() {
            info!(analysis = plan.analysis.as_str(), "planner analysis");
        }

        let mut tasks = plan.tasks;
        if let Some(veto) = plan.veto {
            if !veto.passed {
                warn!(
                    risk = %veto.risk_level,
                    detail = veto.detail.as_str(),
                    "compliance veto raised"
                );
                if veto.risk_level == ComplianceRisk::Blocked {
                    tasks.retain(|t| t.topic == COMPLIANCE_TOPIC);
                    if tasks.is_empty() {
                        return self.finish_fatal(
                            run_id,
                            org_name,
                            &clock,
                            0,
                            usage,
                            FatalError::ComplianceBlocked { detail: veto.detail },
                        );
                    }
                    info!(count = tasks.len(), "narrowed to compliance recovery tasks");
                }
            }
        }
        if tasks.is_empty() {
            return self.finish_fatal(run_id, org_name, &clock, 0, usage, FatalError::NoTasksPlanned);
        }
        for task in &tasks {
            debug!(
                topic = task.topic.as_str(),
                priority = %task.priority,
                phrase = task.phrase.as_str(),
                rationale = task.rationale.as_str(),
                "task planned"
            );
        }
        info!(count = tasks.len(), "retrieval tasks planned");

        // Round loop.
        let mut store = RecordStore::new();
        let mut sources: Vec<String> = Vec::new();
        let mut history: Vec<String> = Vec::new();
        let mut rounds = 0u32;
        let mut current = tasks;

        let executor = TaskExecutor::new(self.search.as_ref(), &clock);
        let gate = ReviewGate::new(self.reviewer.as_ref());

        while rounds < self.config.max_rounds {
            if clock.expired() {
                info!(
                    elapsed_secs = clock.elapsed().as_secs(),
                    "budget exhausted, stopping before the next round"
                );
                break;
            }
            rounds += 1;

            info!(
                round = rounds,
                tasks = current.len(),
                elapsed_secs = clock.elapsed().as_secs(),
                "search round started"
            );
            let outcome = executor.run_batch(&current).await;
            for task in &current {
                history.push(task.phrase.clone());
            }
            info!(round = rounds, outcome = %outcome, total = store.len() + outcome.records.len(), "search round complete");

            sources.extend(outcome.sources);
            usage.absorb(&outcome.usage);
            store.append(outcome.records);

            // Stop conditions, checked in order.
            if rounds >= self.config.max_rounds {
                info!(rounds, "max rounds reached");
                break;
            }
            if clock.expired() {
                info!(elapsed_secs = clock.elapsed().as_secs(), "budget exhausted");
                break;
            }
            if !clock.has_time_for(self.config.review_min_budget) {
                info!(
                    remaining_secs = clock.remaining().as_secs(),
                    "remaining budget below review minimum, skipping review"
                );
                break;
            }

            let verdict = gate
                .review(ReviewContext {
                    profile: &profile,
                    round: rounds,
                    records: store.records(),
                    search_history: &history,
                    remaining_budget: clock.remaining(),
                })
                .await;
            info!(
                round = rounds,
                quality = %verdict.quality,
                reason = verdict.quality_reason.as_str(),
                needs_more = verdict.needs_more,
                retry_tasks = verdict.retry_tasks.len(),
                "round review complete"
            );
            for (topic, entry) in &verdict.coverage {
                debug!(
                    topic = topic.as_str(),
                    status = %entry.status,
                    count = entry.count,
                    note = entry.note.as_str(),
                    "coverage"
                );
            }

            if !verdict.needs_more {
                break;
            }
            current = verdict.retry_tasks;
        }

        // Escalation.
        let escalated = self.escalation_phase(&store, &clock, &mut usage).await;

        // Merging.
        let before = store.len() + escalated.len();
        store.append(escalated);
        store.merge();
        info!(before, after = store.len(), "records merged");

        // Scoring.
        if !store.is_empty() && !clock.expired() {
            let ranker = Ranker::new(self.scorer.as_ref());
            ranker.rank(&profile, store.records_mut()).await;
        }

        let result = RunResult {
            run_id,
            org_name,
            records: store.into_records(),
            sources: dedup_sources(&sources),
            usage,
            elapsed: clock.elapsed(),
            rounds,
            error: None,
        };
        info!(
            run_id = %run_id,
            records = result.records.len(),
            sources = result.sources.len(),
            rounds = result.rounds,
            elapsed_secs = result.elapsed.as_secs(),
            "orchestration run complete"
        );
        result
    }

    async fn escalation_phase(
        &self,
        store: &RecordStore,
        clock: &BudgetClock,
        usage: &mut UsageCounters,
    ) -> Vec<ProgramRecord> {
        if self.config.skip_deep_fetch {
            info!("deep fetch disabled by caller");
            return Vec::new();
        }
        if store.is_empty() {
            return Vec::new();
        }
        if !clock.has_time_for(self.config.deep_fetch_min_budget) {
            info!(
                remaining_secs = clock.remaining().as_secs(),
                "remaining budget below deep-fetch minimum, skipping escalation"
            );
            return Vec::new();
        }

        let selector = EscalationSelector::new(self.escalation_judge.as_ref());
        let targets = selector.select(store.records()).await;
        if targets.is_empty() {
            return Vec::new();
        }
        // The selection call itself took time; re-check before fetching.
        if !clock.has_time_for(self.config.deep_fetch_min_budget) {
            info!(
                targets = targets.len(),
                remaining_secs = clock.remaining().as_secs(),
                "remaining budget below deep-fetch minimum after selection, skipping fetches"
            );
            return Vec::new();
        }

        let mut escalated = Vec::new();
        for (i, target) in targets.iter().enumerate() {
            if clock.expired() {
                warn!(
                    skipped = targets.len() - i,
                    "budget exhausted, abandoning remaining escalation targets"
                );
                break;
            }
            info!(
                target = i + 1,
                total = targets.len(),
                title = target.title.as_str(),
                url = target.url.as_str(),
                "deep fetch started"
            );
            match self.deep_fetcher.fetch(&target.url, &target.title).await {
                Ok(outcome) => {
                    info!(count = outcome.records.len(), "deep fetch complete");
                    usage.absorb(&outcome.usage);
                    escalated.extend(outcome.records);
                }
                Err(e) => {
                    warn!(url = target.url.as_str(), error = %e, "deep fetch failed");
                }
            }
        }
        escalated
    }

    fn finish_fatal(
        &self,
        run_id: Uuid,
        org_name: String,
        clock: &BudgetClock,
        rounds: u32,
        usage: UsageCounters,
        error: FatalError,
    ) -> RunResult {
        warn!(run_id = %run_id, error = %error, "orchestration run terminated");
        RunResult {
            run_id,
            org_name,
            records: Vec::new(),
            sources: Vec::new(),
            usage,
            elapsed: clock.elapsed(),
            rounds,
            error: Some(error),
        }
    }
}

/// First-seen order dedup of the source URL list. Parseable URLs are keyed
/// without their fragment so in-page anchors do not multiply a source.
fn dedup_sources(sources: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for source in sources {
        let key = match Url::parse(source) {
            Ok(mut parsed) => {
                parsed.set_fragment(None);
                parsed.to_string()
            }
            Err(_) => source.clone(),
        };
        if seen.insert(key) {
            out.push(source.clone());
        }
    }
    out
}
