use ai_client::util::truncate_to_char_boundary;
use ai_client::LlmClient;
use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use grantscout_common::{OrgProfile, ProgramRecord, ScoredEntry};

use super::{render_profile, today};
use crate::traits::Scorer;

fn build_scoring_system() -> String {
    let today = today();
    format!(
        "You score funding programs for fit against one organization, on \
five dimensions of 0-100 each, then blend them into a composite.

Principles: score every record honestly — no zeros unless a program is \
entirely irrelevant (wrong region, wrong sector); low feasibility is an \
improvement direction for the organization, not a reason to bury the \
record; scoring ranks the list, it does not filter it.

Dimensions and weights:
1. amount (30%) — money on the table. 100: top-tier (millions). 80: large. \
60: mid six figures. 40: five figures. 20: small. Threshold-type programs \
score by the value they unlock; tax reliefs by the tax actually saved.
2. exclusivity (25%) — how thin the competition is. 100: tailored \
(handful of eligible organizations). 80: sector-specific. 60: park-level. \
40: district-level. 20: universal.
3. feasibility (10%) — can the organization qualify today. 100: fully. \
80: one non-critical gap. 60: one or two gaps closable within months. 40: \
a key requirement is six-plus months away. 20: mostly unmet (still show it).
4. urgency (25%) — the hard timeliness check. Current date: {today}. \
100: deadline within 30 days. 80: 30-90 days. 60: within half a year or \
standing. 40: next batch expected. 20: expired but a successor program is \
likely. 5: expired with no successor in sight. A validity date in the past \
caps urgency at 20.
5. sustainability (10%) — repeatability. 100: annual. 80: periodic. 60: \
one-off with a lasting threshold. 40: pure one-off. 20: one-off and small.

composite = amount*0.3 + exclusivity*0.25 + urgency*0.25 + \
feasibility*0.1 + sustainability*0.1, rounded to an integer, minimum 5 \
unless entirely irrelevant.

For each entry also report: validity (a date or 'standing', or 'check the \
source' when undeterminable), amount_estimate (e.g. 'up to 500k'), and \
amount_tier S/A/B/C/D from largest to smallest. index is the record's \
1-based position in the submitted list."
    )
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ScoredBatch {
    #[serde(default)]
    entries: Vec<ScoredEntry>,
}

/// Default ranker oracle.
pub struct LlmScorer {
    client: LlmClient,
}

impl LlmScorer {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

fn render_scoring_records(records: &[ProgramRecord]) -> String {
    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            format!(
                "{}. [{}] {}\n   Summary: {}\n   Support: {}\n   Published: {}\n   Validity: {}\n   Deadline: {}",
                i + 1,
                if record.topic.is_empty() { "?" } else { record.topic.as_str() },
                record.title,
                truncate_to_char_boundary(&record.summary, 100),
                if record.support_text.is_empty() { "none" } else { record.support_text.as_str() },
                if record.publish_date.is_empty() { "unknown" } else { record.publish_date.as_str() },
                if record.validity.is_empty() { "unknown" } else { record.validity.as_str() },
                if record.deadline.is_empty() { "unknown" } else { record.deadline.as_str() },
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl Scorer for LlmScorer {
    async fn score(
        &self,
        profile: &OrgProfile,
        records: &[ProgramRecord],
    ) -> Result<Vec<ScoredEntry>> {
        let user = format!(
            "{}\n\nPrograms to score ({}):\n\n{}",
            render_profile(profile),
            records.len(),
            render_scoring_records(records),
        );
        let batch: ScoredBatch = self.client.extract(build_scoring_system(), user).await?;
        Ok(batch.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::record;
    use grantscout_common::AmountTier;

    #[test]
    fn scored_batch_parses() {
        let json = r#"{
            "entries": [{
                "index": 1,
                "composite": 72,
                "amount": 80,
                "exclusivity": 60,
                "feasibility": 70,
                "urgency": 80,
                "sustainability": 60,
                "rationale": "sector-specific, deadline close",
                "validity": "2026-12-31",
                "amount_estimate": "up to 500k",
                "amount_tier": "A"
            }]
        }"#;
        let batch: ScoredBatch = serde_json::from_str(json).unwrap();
        assert_eq!(batch.entries.len(), 1);
        assert_eq!(batch.entries[0].index, 1);
        assert_eq!(batch.entries[0].amount_tier, AmountTier::A);
    }

    #[test]
    fn scored_batch_tolerates_empty() {
        let batch: ScoredBatch = serde_json::from_str("{}").unwrap();
        assert!(batch.entries.is_empty());
    }

    #[test]
    fn scoring_prompt_injects_current_date() {
        let system = build_scoring_system();
        assert!(system.contains(&today()));
    }

    #[test]
    fn scoring_records_truncate_long_summaries() {
        let mut r = record("A", "u");
        r.summary = "x".repeat(500);
        let rendered = render_scoring_records(&[r]);
        assert!(rendered.len() < 400);
        assert!(rendered.contains("1. [?] A"));
    }
}
