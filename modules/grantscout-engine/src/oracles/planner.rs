use ai_client::LlmClient;
use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use grantscout_common::{OrgProfile, RetrievalPlan};

use super::render_profile;
use crate::traits::Planner;

const PLAN_SYSTEM: &str = "\
You plan web searches that find government funding and support programs for \
a specific organization. Reverse-engineer the profile into concrete traits \
first — which park or district hosts it, where it sits in its industry \
chain, its ownership identity, workforce dynamics, compliance standing, tax \
posture, and talent needs — then emit one search task per angle worth \
covering.

Task fields: topic is one of facility, industry-chain, identity, workforce, \
compliance, tax, talent; phrase is handed verbatim to a web search engine; \
priority is high, medium, or low; rationale says what the phrase should \
surface; focus_hint optionally tells the search executor what to look for \
in the results.

Phrase rules:
- Every phrase MUST name the organization's region or district. Never emit \
a region-free phrase.
- Keep phrases short — a handful of words, directly pasteable into a search \
engine.
- Park- or district-level programs beat city-wide ones; when the profile \
names a park, search the park's administration and special funds by name.
- Always keep at least one plain 'region + industry + support program' \
baseline phrase; specialist vocabulary supplements it, never replaces it.
- Foreign-owned organizations get an extra foreign-R&D-center phrase; \
university-affiliated ones get an industry-academia collaboration phrase.

Compliance check: if the risk record shows serious dishonesty or active \
sanctions, set veto.passed to false with a risk_level of none, low, medium, \
high, or blocked and explain in detail. A blocked organization gets \
credit-repair search tasks only, all under topic compliance.";

/// Default planner oracle.
pub struct LlmPlanner {
    client: LlmClient,
}

impl LlmPlanner {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    async fn plan(&self, profile: &OrgProfile) -> Result<RetrievalPlan> {
        let user = format!(
            "{}\n\nDerive the retrieval strategy and task list for this organization.",
            render_profile(profile)
        );
        let plan: RetrievalPlan = self.client.extract(PLAN_SYSTEM, user).await?;
        debug!(
            tasks = plan.tasks.len(),
            vetoed = plan.veto.as_ref().map(|v| !v.passed).unwrap_or(false),
            "plan extracted"
        );
        Ok(plan)
    }
}
