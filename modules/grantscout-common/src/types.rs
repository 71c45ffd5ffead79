use std::collections::BTreeMap;
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FatalError;

// --- Organization profile ---

/// The target organization a retrieval run works for. Core fields come from
/// the registry snapshot the caller holds; the trailing block is filled in
/// by profile enrichment and starts empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct OrgProfile {
    pub name: String,
    pub industry: String,
    pub region: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub business_scope: String,
    #[serde(default)]
    pub registered_capital: String,
    #[serde(default)]
    pub founded: String,
    #[serde(default)]
    pub headcount: String,
    #[serde(default)]
    pub risk_info: String,

    #[serde(default)]
    pub actual_address: String,
    #[serde(default)]
    pub core_products: String,
    #[serde(default)]
    pub certifications: Vec<String>,
    #[serde(default)]
    pub founder_background: String,
    #[serde(default)]
    pub financing: String,
    #[serde(default)]
    pub key_findings: String,
}

impl OrgProfile {
    pub fn new(
        name: impl Into<String>,
        industry: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            industry: industry.into(),
            region: region.into(),
            ..Self::default()
        }
    }

    /// Overlay extracted facts onto the profile. Only non-empty facts land;
    /// existing fields are never cleared.
    pub fn apply_facts(&mut self, facts: &ProfileFacts) {
        if let Some(ref v) = facts.actual_address {
            if !v.is_empty() && *v != self.address {
                self.actual_address = v.clone();
            }
        }
        if let Some(ref v) = facts.core_products {
            if !v.is_empty() {
                self.core_products = v.clone();
            }
        }
        let certs: Vec<String> = facts
            .certifications
            .iter()
            .filter(|c| !c.is_empty())
            .cloned()
            .collect();
        if !certs.is_empty() {
            self.certifications = certs;
        }
        if let Some(ref v) = facts.founder_background {
            if !v.is_empty() {
                self.founder_background = v.clone();
            }
        }
        if let Some(ref v) = facts.financing {
            if !v.is_empty() {
                self.financing = v.clone();
            }
        }
        if let Some(ref v) = facts.key_findings {
            if !v.is_empty() {
                self.key_findings = v.clone();
            }
        }
    }
}

/// Supplemental profile facts extracted from self-search results.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ProfileFacts {
    /// Operating address, when it differs from the registered one.
    pub actual_address: Option<String>,
    /// Core products or technology direction.
    pub core_products: Option<String>,
    /// Certifications and designations already held.
    #[serde(default)]
    pub certifications: Vec<String>,
    pub founder_background: Option<String>,
    pub financing: Option<String>,
    /// Anything else useful for program matching, one or two sentences.
    pub key_findings: Option<String>,
}

// --- Retrieval tasks ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    High,
    #[default]
    Medium,
    Low,
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskPriority::High => write!(f, "high"),
            TaskPriority::Medium => write!(f, "medium"),
            TaskPriority::Low => write!(f, "low"),
        }
    }
}

/// One unit of search work. Immutable once created; consumed exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RetrievalTask {
    /// Retrieval dimension this task covers (e.g. "facility", "tax").
    pub topic: String,
    /// The phrase handed verbatim to the search executor.
    pub phrase: String,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub rationale: String,
    /// Opaque guidance for the executor about what to look for.
    pub focus_hint: Option<String>,
}

impl RetrievalTask {
    pub fn new(topic: impl Into<String>, phrase: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            phrase: phrase.into(),
            priority: TaskPriority::default(),
            rationale: String::new(),
            focus_hint: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceRisk {
    #[default]
    None,
    Low,
    Medium,
    High,
    Blocked,
}

impl std::fmt::Display for ComplianceRisk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComplianceRisk::None => write!(f, "none"),
            ComplianceRisk::Low => write!(f, "low"),
            ComplianceRisk::Medium => write!(f, "medium"),
            ComplianceRisk::High => write!(f, "high"),
            ComplianceRisk::Blocked => write!(f, "blocked"),
        }
    }
}

/// Hard eligibility check the planner runs on the profile's risk record.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ComplianceVeto {
    pub passed: bool,
    #[serde(default)]
    pub risk_level: ComplianceRisk,
    #[serde(default)]
    pub detail: String,
}

/// Planner output: the first round's task batch plus the veto verdict.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RetrievalPlan {
    /// Two or three sentences of overall strategy.
    #[serde(default)]
    pub analysis: String,
    #[serde(default)]
    pub tasks: Vec<RetrievalTask>,
    pub veto: Option<ComplianceVeto>,
}

// --- Records ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum AmountTier {
    S,
    A,
    B,
    C,
    D,
    #[default]
    Unknown,
}

/// Tiers come back from a language model; anything unrecognized maps to
/// `Unknown` instead of failing the whole batch.
impl<'de> Deserialize<'de> for AmountTier {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.trim().to_ascii_uppercase().as_str() {
            "S" => AmountTier::S,
            "A" => AmountTier::A,
            "B" => AmountTier::B,
            "C" => AmountTier::C,
            "D" => AmountTier::D,
            _ => AmountTier::Unknown,
        })
    }
}

impl std::fmt::Display for AmountTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AmountTier::S => write!(f, "S"),
            AmountTier::A => write!(f, "A"),
            AmountTier::B => write!(f, "B"),
            AmountTier::C => write!(f, "C"),
            AmountTier::D => write!(f, "D"),
            AmountTier::Unknown => write!(f, "?"),
        }
    }
}

/// Five-dimension score written back by the ranker. All sub-scores 0-100;
/// composite is the weighted blend the ranker computes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ScoreBlock {
    pub composite: u32,
    pub amount: u32,
    pub exclusivity: u32,
    pub feasibility: u32,
    pub urgency: u32,
    pub sustainability: u32,
    #[serde(default)]
    pub rationale: String,
}

/// One retrieved funding-program item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProgramRecord {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub publish_date: String,
    #[serde(default)]
    pub summary: String,
    /// Support terms: amounts, ratios, caps.
    #[serde(default)]
    pub support_text: String,
    /// Direct link to the program document, usually a PDF.
    #[serde(default)]
    pub attachment_url: String,
    /// Industries or entity classes the program applies to.
    #[serde(default)]
    pub applicable_scope: String,
    /// Full document text, present only after deep extraction.
    #[serde(default)]
    pub full_text: String,
    /// Retrieval dimension that produced this record.
    #[serde(default)]
    pub topic: String,
    /// Validity window, e.g. "2026-12-31" or "standing".
    #[serde(default)]
    pub validity: String,
    /// Application deadline, if stated.
    #[serde(default)]
    pub deadline: String,
    #[serde(default)]
    pub score: ScoreBlock,
    #[serde(default)]
    pub amount_estimate: String,
    #[serde(default)]
    pub amount_tier: AmountTier,
}

impl ProgramRecord {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    /// Identity key for duplicate detection: trimmed title plus trimmed URL
    /// with any trailing slash stripped. Two records with equal keys denote
    /// the same program.
    pub fn identity_key(&self) -> (String, String) {
        (
            self.title.trim().to_string(),
            self.url.trim().trim_end_matches('/').to_string(),
        )
    }

    /// A record with neither title nor URL. Blank records share a single
    /// identity key and would merge with each other; callers that mind
    /// should filter them out before deduplication.
    pub fn is_blank(&self) -> bool {
        self.title.trim().is_empty() && self.url.trim().is_empty()
    }
}

// --- Executor outcomes ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UsageCounters {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl UsageCounters {
    pub fn absorb(&mut self, other: &UsageCounters) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// What one search call returned.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SearchOutcome {
    #[serde(default)]
    pub records: Vec<ProgramRecord>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub usage: UsageCounters,
}

/// What one deep-extraction call returned.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct DeepFetchOutcome {
    #[serde(default)]
    pub records: Vec<ProgramRecord>,
    #[serde(default)]
    pub usage: UsageCounters,
}

/// Per-task status inside a round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    pub topic: String,
    pub phrase: String,
    pub records_found: usize,
    pub error: Option<String>,
}

impl TaskReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Everything one batch of retrieval tasks produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoundOutcome {
    pub records: Vec<ProgramRecord>,
    pub sources: Vec<String>,
    pub usage: UsageCounters,
    pub reports: Vec<TaskReport>,
    /// Tasks not started because the budget expired mid-batch.
    pub skipped: usize,
}

impl std::fmt::Display for RoundOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let failed = self.reports.iter().filter(|r| !r.succeeded()).count();
        write!(
            f,
            "{} tasks run, {} failed, {} skipped, {} records",
            self.reports.len(),
            failed,
            self.skipped,
            self.records.len(),
        )
    }
}

// --- Review ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum QualityLabel {
    Good,
    Fair,
    Poor,
}

impl std::fmt::Display for QualityLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualityLabel::Good => write!(f, "good"),
            QualityLabel::Fair => write!(f, "fair"),
            QualityLabel::Poor => write!(f, "poor"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CoverageStatus {
    Sufficient,
    Insufficient,
    Missing,
    NotApplicable,
}

impl std::fmt::Display for CoverageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoverageStatus::Sufficient => write!(f, "sufficient"),
            CoverageStatus::Insufficient => write!(f, "insufficient"),
            CoverageStatus::Missing => write!(f, "missing"),
            CoverageStatus::NotApplicable => write!(f, "not_applicable"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CoverageEntry {
    pub status: CoverageStatus,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub note: String,
}

/// Reviewer output for one round.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReviewVerdict {
    pub quality: QualityLabel,
    #[serde(default)]
    pub quality_reason: String,
    /// Per-dimension coverage, keyed by topic.
    #[serde(default)]
    pub coverage: BTreeMap<String, CoverageEntry>,
    #[serde(default)]
    pub needs_more: bool,
    #[serde(default)]
    pub retry_tasks: Vec<RetrievalTask>,
}

impl ReviewVerdict {
    /// Terminal verdict used when the reviewer is unavailable or has
    /// nothing left to propose.
    pub fn stop(reason: impl Into<String>) -> Self {
        Self {
            quality: QualityLabel::Poor,
            quality_reason: reason.into(),
            coverage: BTreeMap::new(),
            needs_more: false,
            retry_tasks: Vec::new(),
        }
    }
}

// --- Escalation and scoring ---

/// A record the escalation judge wants re-fetched through the expensive path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EscalationTarget {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub reason: String,
}

/// One ranker entry. `index` is the 1-based position of the record in the
/// submitted batch; consumers must bounds-check it before applying.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ScoredEntry {
    pub index: usize,
    pub composite: u32,
    #[serde(default)]
    pub amount: u32,
    #[serde(default)]
    pub exclusivity: u32,
    #[serde(default)]
    pub feasibility: u32,
    #[serde(default)]
    pub urgency: u32,
    #[serde(default)]
    pub sustainability: u32,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub validity: String,
    #[serde(default)]
    pub amount_estimate: String,
    #[serde(default)]
    pub amount_tier: AmountTier,
}

// --- Run result ---

/// Final immutable snapshot of one orchestration run.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub org_name: String,
    pub records: Vec<ProgramRecord>,
    pub sources: Vec<String>,
    pub usage: UsageCounters,
    pub elapsed: Duration,
    pub rounds: u32,
    /// Populated only for the fatal taxonomy; budget exhaustion is a normal
    /// terminal state and leaves this empty.
    pub error: Option<FatalError>,
}

impl RunResult {
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn is_fatal(&self) -> bool {
        self.error.is_some()
    }
}
