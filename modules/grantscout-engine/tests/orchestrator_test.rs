//! End-to-end tests for the orchestration state machine, run entirely
//! against the deterministic mocks — no network, no API keys.

use std::sync::Arc;
use std::time::Duration;

use grantscout_engine::testing::{
    record, sample_profile, scored, task, verdict_retry, MockAnalyst, MockDeepFetch, MockJudge,
    MockPlanner, MockReviewer, MockScorer, MockSearch,
};
use grantscout_engine::{EngineConfig, Orchestrator};

use grantscout_common::{
    ComplianceRisk, ComplianceVeto, DeepFetchOutcome, EscalationTarget, FatalError, ProfileFacts,
    RetrievalPlan, SearchOutcome, UsageCounters,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("grantscout_engine=debug")
        .with_test_writer()
        .try_init();
}

/// Instant-turnaround config for tests that do not exercise timing.
fn fast_config() -> EngineConfig {
    EngineConfig {
        request_pacing: Duration::ZERO,
        skip_enrichment: true,
        ..EngineConfig::default()
    }
}

fn plan_of(tasks: Vec<grantscout_common::RetrievalTask>) -> RetrievalPlan {
    RetrievalPlan {
        analysis: "test plan".into(),
        tasks,
        veto: None,
    }
}

fn outcome(records: Vec<grantscout_common::ProgramRecord>, source: &str) -> SearchOutcome {
    SearchOutcome {
        records,
        sources: vec![source.to_string()],
        usage: UsageCounters {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        },
    }
}

struct Rig {
    planner: Arc<MockPlanner>,
    reviewer: Arc<MockReviewer>,
    judge: Arc<MockJudge>,
    scorer: Arc<MockScorer>,
    analyst: Arc<MockAnalyst>,
    search: Arc<MockSearch>,
    fetcher: Arc<MockDeepFetch>,
}

impl Rig {
    fn new(planner: MockPlanner, search: MockSearch) -> Self {
        Self {
            planner: Arc::new(planner),
            reviewer: Arc::new(MockReviewer::new()),
            judge: Arc::new(MockJudge::none()),
            scorer: Arc::new(MockScorer::returning(vec![])),
            analyst: Arc::new(MockAnalyst::returning(ProfileFacts::default())),
            search: Arc::new(search),
            fetcher: Arc::new(MockDeepFetch::new()),
        }
    }

    fn orchestrator(&self, config: EngineConfig) -> Orchestrator {
        Orchestrator::builder()
            .planner(self.planner.clone())
            .reviewer(self.reviewer.clone())
            .escalation_judge(self.judge.clone())
            .scorer(self.scorer.clone())
            .analyst(self.analyst.clone())
            .search(self.search.clone())
            .deep_fetcher(self.fetcher.clone())
            .config(config)
            .build()
    }
}

// ---------------------------------------------------------------------------
// Single round, dedup, ranking
// ---------------------------------------------------------------------------

#[tokio::test]
async fn three_tasks_dedup_and_rank() {
    init_tracing();

    let mut short = record("Park Innovation Grant", "https://gov.example/p1");
    short.summary = "short".into();
    let workforce = record("Workforce Subsidy", "https://gov.example/p2");
    let mut dup = record("Park Innovation Grant", "https://gov.example/p1/");
    dup.summary = "a much longer summary of the park innovation grant".into();
    dup.attachment_url = "https://gov.example/p1.pdf".into();

    let search = MockSearch::new()
        .on_search("phrase a", outcome(vec![short, workforce], "https://gov.example/a"))
        .on_search("phrase c", outcome(vec![dup], "https://gov.example/a"));
    let planner = MockPlanner::returning(plan_of(vec![
        task("facility", "phrase a"),
        task("industry-chain", "phrase b"),
        task("tax", "phrase c"),
    ]));

    let mut rig = Rig::new(planner, search);
    rig.scorer = Arc::new(MockScorer::returning(vec![scored(1, 88), scored(2, 55)]));

    let result = rig.orchestrator(fast_config()).run(sample_profile()).await;

    assert!(result.error.is_none());
    assert_eq!(result.rounds, 1);
    assert_eq!(result.records.len(), 2);

    // Merged record keeps the longer summary, gains the attachment, and
    // keeps the first round's topic tag.
    let park = &result.records[0];
    assert_eq!(park.title, "Park Innovation Grant");
    assert_eq!(park.score.composite, 88);
    assert!(park.summary.starts_with("a much longer"));
    assert_eq!(park.attachment_url, "https://gov.example/p1.pdf");
    assert_eq!(park.topic, "facility");
    assert_eq!(result.records[1].score.composite, 55);

    // One source after dedup; usage summed over the two non-empty searches
    // plus the empty one.
    assert_eq!(result.sources, vec!["https://gov.example/a".to_string()]);
    assert_eq!(result.usage.total_tokens, 30);

    // One review, seeing the full history.
    assert_eq!(rig.reviewer.seen_rounds(), vec![1]);
    assert_eq!(
        rig.reviewer.seen_history(),
        vec![vec![
            "phrase a".to_string(),
            "phrase b".to_string(),
            "phrase c".to_string()
        ]]
    );
}

// ---------------------------------------------------------------------------
// Round-loop control
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stale_retry_stops_after_one_round() {
    init_tracing();

    let search = MockSearch::new();
    let planner = MockPlanner::returning(plan_of(vec![task("tax", "p1")]));
    let mut rig = Rig::new(planner, search);
    // Reviewer wants more, but the only retry phrase already ran.
    rig.reviewer = Arc::new(MockReviewer::new().then(verdict_retry(vec![task("tax", "p1")])));

    let result = rig.orchestrator(fast_config()).run(sample_profile()).await;

    assert!(result.error.is_none());
    assert_eq!(result.rounds, 1);
    assert_eq!(rig.search.calls(), vec!["p1".to_string()]);
}

#[tokio::test]
async fn fresh_retry_runs_second_round() {
    init_tracing();

    let search = MockSearch::new()
        .on_search("p2", outcome(vec![record("Late Find", "https://gov.example/p9")], "https://gov.example/b"));
    let planner = MockPlanner::returning(plan_of(vec![task("tax", "p1")]));
    let mut rig = Rig::new(planner, search);
    rig.reviewer = Arc::new(MockReviewer::new().then(verdict_retry(vec![task("tax", "p2")])));

    let result = rig.orchestrator(fast_config()).run(sample_profile()).await;

    assert_eq!(result.rounds, 2);
    assert_eq!(rig.search.calls(), vec!["p1".to_string(), "p2".to_string()]);
    assert_eq!(result.records.len(), 1);
    // Second review (queue exhausted → stop) saw both phrases.
    assert_eq!(rig.reviewer.seen_rounds(), vec![1, 2]);
}

#[tokio::test]
async fn max_rounds_bounds_the_loop() {
    init_tracing();

    let search = MockSearch::new();
    let planner = MockPlanner::returning(plan_of(vec![task("tax", "p1")]));
    let mut rig = Rig::new(planner, search);
    // A reviewer that always asks for another round with a fresh phrase.
    rig.reviewer = Arc::new(
        MockReviewer::new()
            .then(verdict_retry(vec![task("tax", "p2")]))
            .then(verdict_retry(vec![task("tax", "p3")]))
            .then(verdict_retry(vec![task("tax", "p4")])),
    );

    let result = rig.orchestrator(fast_config()).run(sample_profile()).await;

    assert_eq!(result.rounds, 3);
    assert_eq!(
        rig.search.calls(),
        vec!["p1".to_string(), "p2".to_string(), "p3".to_string()]
    );
    // No review after the final round.
    assert_eq!(rig.reviewer.seen_rounds(), vec![1, 2]);
}

#[tokio::test]
async fn expired_budget_runs_zero_rounds() {
    init_tracing();

    let search = MockSearch::new();
    let planner = MockPlanner::returning(plan_of(vec![task("tax", "p1")]));
    let rig = Rig::new(planner, search);

    let config = EngineConfig {
        total_budget: Duration::ZERO,
        ..fast_config()
    };
    let result = rig.orchestrator(config).run(sample_profile()).await;

    // Budget exhaustion is a terminal state, not an error.
    assert!(result.error.is_none());
    assert_eq!(result.rounds, 0);
    assert!(result.records.is_empty());
    assert!(rig.search.calls().is_empty());
    assert_eq!(rig.judge.call_count(), 0);
    // Planning still happened.
    assert_eq!(rig.planner.seen_profiles().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn review_skipped_when_remaining_below_threshold() {
    init_tracing();

    // One 10s search against a 50s budget leaves 40s < the 45s review gate.
    let search = MockSearch::new()
        .with_latency(Duration::from_secs(10))
        .on_search(
            "p1",
            outcome(vec![record("A", "https://gov.example/p1")], "https://gov.example/a"),
        );
    let planner = MockPlanner::returning(plan_of(vec![task("tax", "p1")]));
    let rig = Rig::new(planner, search);

    let config = EngineConfig {
        total_budget: Duration::from_secs(50),
        ..fast_config()
    };
    let result = rig.orchestrator(config).run(sample_profile()).await;

    assert_eq!(result.rounds, 1);
    assert!(rig.reviewer.seen_rounds().is_empty());
    // 40s remaining is also below the 90s deep-fetch gate.
    assert_eq!(rig.judge.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn budget_expiry_after_round_stops_loop() {
    init_tracing();

    let search = MockSearch::new().with_latency(Duration::from_secs(30));
    let planner = MockPlanner::returning(plan_of(vec![task("tax", "p1")]));
    let rig = Rig::new(planner, search);

    let config = EngineConfig {
        total_budget: Duration::from_secs(30),
        ..fast_config()
    };
    let result = rig.orchestrator(config).run(sample_profile()).await;

    assert!(result.error.is_none());
    assert_eq!(result.rounds, 1);
    assert!(rig.reviewer.seen_rounds().is_empty());
    assert!(result.elapsed >= Duration::from_secs(30));
}

// ---------------------------------------------------------------------------
// Fatal taxonomy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn planner_outage_is_fatal() {
    init_tracing();

    let rig = Rig::new(MockPlanner::failing(), MockSearch::new());
    let result = rig.orchestrator(fast_config()).run(sample_profile()).await;

    assert!(matches!(
        result.error,
        Some(FatalError::PlannerUnavailable { .. })
    ));
    assert_eq!(result.rounds, 0);
    assert!(result.records.is_empty());
}

#[tokio::test]
async fn empty_plan_is_fatal() {
    init_tracing();

    let rig = Rig::new(MockPlanner::returning(plan_of(vec![])), MockSearch::new());
    let result = rig.orchestrator(fast_config()).run(sample_profile()).await;

    assert_eq!(result.error, Some(FatalError::NoTasksPlanned));
}

#[tokio::test]
async fn blocked_veto_narrows_to_compliance() {
    init_tracing();

    let plan = RetrievalPlan {
        analysis: String::new(),
        tasks: vec![task("tax", "tax phrase"), task("compliance", "credit repair phrase")],
        veto: Some(ComplianceVeto {
            passed: false,
            risk_level: ComplianceRisk::Blocked,
            detail: "active sanctions list entry".into(),
        }),
    };
    let rig = Rig::new(MockPlanner::returning(plan), MockSearch::new());
    let result = rig.orchestrator(fast_config()).run(sample_profile()).await;

    assert!(result.error.is_none());
    assert_eq!(rig.search.calls(), vec!["credit repair phrase".to_string()]);
}

#[tokio::test]
async fn blocked_veto_without_recovery_tasks_is_fatal() {
    init_tracing();

    let plan = RetrievalPlan {
        analysis: String::new(),
        tasks: vec![task("tax", "tax phrase")],
        veto: Some(ComplianceVeto {
            passed: false,
            risk_level: ComplianceRisk::Blocked,
            detail: "active sanctions list entry".into(),
        }),
    };
    let rig = Rig::new(MockPlanner::returning(plan), MockSearch::new());
    let result = rig.orchestrator(fast_config()).run(sample_profile()).await;

    assert!(matches!(
        result.error,
        Some(FatalError::ComplianceBlocked { .. })
    ));
    assert!(rig.search.calls().is_empty());
}

#[tokio::test]
async fn non_blocking_veto_keeps_all_tasks() {
    init_tracing();

    let plan = RetrievalPlan {
        analysis: String::new(),
        tasks: vec![task("tax", "tax phrase"), task("talent", "talent phrase")],
        veto: Some(ComplianceVeto {
            passed: false,
            risk_level: ComplianceRisk::High,
            detail: "pending litigation".into(),
        }),
    };
    let rig = Rig::new(MockPlanner::returning(plan), MockSearch::new());
    let result = rig.orchestrator(fast_config()).run(sample_profile()).await;

    assert!(result.error.is_none());
    assert_eq!(rig.search.calls().len(), 2);
}

// ---------------------------------------------------------------------------
// Escalation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn escalation_enriches_and_isolates_failures() {
    init_tracing();

    let mut sparse = record("Park Innovation Grant", "https://gov.example/p1");
    sparse.summary = "short".into();
    let search =
        MockSearch::new().on_search("p1", outcome(vec![sparse], "https://gov.example/a"));
    let planner = MockPlanner::returning(plan_of(vec![task("facility", "p1")]));

    let mut enriched = record("Park Innovation Grant", "https://gov.example/p1");
    enriched.summary = "the full program text recovered by deep extraction".into();
    enriched.full_text = "entire document".into();

    let mut rig = Rig::new(planner, search);
    rig.judge = Arc::new(MockJudge::returning(vec![
        EscalationTarget {
            title: "Park Innovation Grant".into(),
            url: "https://gov.example/p1".into(),
            reason: "summary truncated".into(),
        },
        EscalationTarget {
            title: "Broken Target".into(),
            url: "https://gov.example/bad".into(),
            reason: "pdf link".into(),
        },
    ]));
    rig.fetcher = Arc::new(
        MockDeepFetch::new()
            .on_fetch(
                "https://gov.example/p1",
                DeepFetchOutcome {
                    records: vec![enriched],
                    usage: UsageCounters {
                        prompt_tokens: 5,
                        completion_tokens: 5,
                        total_tokens: 10,
                    },
                },
            )
            .failing("https://gov.example/bad"),
    );

    let result = rig.orchestrator(fast_config()).run(sample_profile()).await;

    // One failed target does not sink the run.
    assert!(result.error.is_none());
    assert_eq!(
        rig.fetcher.calls(),
        vec![
            "https://gov.example/p1".to_string(),
            "https://gov.example/bad".to_string()
        ]
    );

    // The deep-fetched record merged into the search record.
    assert_eq!(result.records.len(), 1);
    assert_eq!(result.records[0].full_text, "entire document");
    assert!(result.records[0].summary.starts_with("the full program text"));
    // Search usage (15) plus deep-fetch usage (10).
    assert_eq!(result.usage.total_tokens, 25);
}

#[tokio::test(start_paused = true)]
async fn escalation_skipped_below_min_budget() {
    init_tracing();

    // 10s search against a 60s budget: review gate passes (50s > 45s) but
    // the 90s deep-fetch gate does not.
    let mut found = record("A", "https://gov.example/p1");
    found.summary = "short".into();
    let search = MockSearch::new()
        .with_latency(Duration::from_secs(10))
        .on_search("p1", outcome(vec![found], "https://gov.example/a"));
    let planner = MockPlanner::returning(plan_of(vec![task("tax", "p1")]));
    let rig = Rig::new(planner, search);

    let config = EngineConfig {
        total_budget: Duration::from_secs(60),
        ..fast_config()
    };
    let result = rig.orchestrator(config).run(sample_profile()).await;

    assert_eq!(rig.reviewer.seen_rounds(), vec![1]);
    assert_eq!(rig.judge.call_count(), 0);
    assert!(rig.fetcher.calls().is_empty());
    assert_eq!(result.records.len(), 1);
}

#[tokio::test]
async fn skip_deep_fetch_disables_escalation() {
    init_tracing();

    let search = MockSearch::new().on_search(
        "p1",
        outcome(vec![record("A", "https://gov.example/p1")], "https://gov.example/a"),
    );
    let planner = MockPlanner::returning(plan_of(vec![task("tax", "p1")]));
    let mut rig = Rig::new(planner, search);
    rig.judge = Arc::new(MockJudge::returning(vec![EscalationTarget {
        title: "A".into(),
        url: "https://gov.example/p1".into(),
        reason: "anything".into(),
    }]));

    let config = EngineConfig {
        skip_deep_fetch: true,
        ..fast_config()
    };
    let result = rig.orchestrator(config).run(sample_profile()).await;

    assert_eq!(rig.judge.call_count(), 0);
    assert!(rig.fetcher.calls().is_empty());
    assert_eq!(result.records.len(), 1);
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ranker_outage_leaves_unscored_records() {
    init_tracing();

    let search = MockSearch::new().on_search(
        "p1",
        outcome(
            vec![record("First", "u1"), record("Second", "u2")],
            "https://gov.example/a",
        ),
    );
    let planner = MockPlanner::returning(plan_of(vec![task("tax", "p1")]));
    let mut rig = Rig::new(planner, search);
    rig.scorer = Arc::new(MockScorer::failing());

    let result = rig.orchestrator(fast_config()).run(sample_profile()).await;

    // Ranking is best-effort: unscored, first-seen order, no error.
    assert!(result.error.is_none());
    assert_eq!(result.records.len(), 2);
    assert_eq!(result.records[0].title, "First");
    assert_eq!(result.records[0].score.composite, 0);
}

// ---------------------------------------------------------------------------
// Enrichment
// ---------------------------------------------------------------------------

#[tokio::test]
async fn enriched_profile_reaches_the_planner() {
    init_tracing();

    let mut news = record("Acme Photonics expands", "https://news.example/acme");
    news.summary = "Acme ships 800G optical modules".into();
    let search = MockSearch::new().on_search(
        "\"Acme Photonics\" official site products technology financing",
        outcome(vec![news], "https://news.example/acme"),
    );
    let planner = MockPlanner::returning(plan_of(vec![]));
    let mut rig = Rig::new(planner, search);
    rig.analyst = Arc::new(MockAnalyst::returning(ProfileFacts {
        core_products: Some("800G optical modules".into()),
        ..ProfileFacts::default()
    }));

    let config = EngineConfig {
        skip_enrichment: false,
        request_pacing: Duration::ZERO,
        ..EngineConfig::default()
    };
    // Empty plan terminates right after planning; that is all this needs.
    let result = rig.orchestrator(config).run(sample_profile()).await;
    assert_eq!(result.error, Some(FatalError::NoTasksPlanned));

    let seen = rig.planner.seen_profiles();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].core_products, "800G optical modules");
    // Both self-search queries ran before planning.
    assert_eq!(rig.search.calls().len(), 2);
    assert_eq!(rig.analyst.call_count(), 1);
}
