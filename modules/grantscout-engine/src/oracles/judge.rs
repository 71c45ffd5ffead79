use ai_client::LlmClient;
use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::debug;

use grantscout_common::{EscalationTarget, ProgramRecord};

use crate::traits::EscalationJudge;

const SELECT_SYSTEM: &str = "\
You decide which retrieved funding-program records are worth a second, \
expensive pass through a full browser extraction.

Escalate a record when:
- the summary is truncated or under a couple of sentences
- the URL points straight at a PDF
- key facts are missing (support amount, eligibility, deadline)
- it comes from an official government site but the summary is vague, so \
the page likely holds the full program text
- the title looks highly relevant but there is no substance behind it

Do not escalate when the summary already carries the program's terms and \
amounts, when the source is an aggregator likely republishing, or when the \
URL shows signs of being dead.

Report each chosen record's title, exact URL, and the reason it needs deep \
extraction; list one-line skip reasons for notable records you left out.";

#[derive(Debug, Deserialize, JsonSchema)]
struct EscalationFinding {
    /// One-sentence overall assessment of the batch.
    #[serde(default)]
    assessment: String,
    #[serde(default)]
    targets: Vec<EscalationTarget>,
    #[serde(default)]
    skip_reasons: Vec<String>,
}

/// Default escalation judge oracle.
pub struct LlmEscalationJudge {
    client: LlmClient,
}

impl LlmEscalationJudge {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

fn render_record_blocks(records: &[ProgramRecord]) -> String {
    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            format!(
                "{}. Title: {}\n   URL: {}\n   Summary: {}\n   Support: {}\n   Source: {}",
                i + 1,
                record.title,
                record.url,
                if record.summary.is_empty() { "none" } else { record.summary.as_str() },
                if record.support_text.is_empty() { "none" } else { record.support_text.as_str() },
                if record.source.is_empty() { "none" } else { record.source.as_str() },
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl EscalationJudge for LlmEscalationJudge {
    async fn select_targets(&self, records: &[ProgramRecord]) -> Result<Vec<EscalationTarget>> {
        let user = format!(
            "Decide which of these search results need deep extraction:\n\n{}",
            render_record_blocks(records)
        );
        let finding: EscalationFinding = self.client.extract(SELECT_SYSTEM, user).await?;
        debug!(
            assessment = finding.assessment.as_str(),
            targets = finding.targets.len(),
            skipped = finding.skip_reasons.len(),
            "escalation finding extracted"
        );
        Ok(finding.targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::record;

    #[test]
    fn finding_parses_with_defaults() {
        let finding: EscalationFinding = serde_json::from_str("{}").unwrap();
        assert!(finding.targets.is_empty());
        assert!(finding.skip_reasons.is_empty());
        assert!(finding.assessment.is_empty());
    }

    #[test]
    fn finding_parses_targets() {
        let json = r#"{
            "assessment": "two records lack substance",
            "targets": [
                {"title": "Park Grant", "url": "https://gov.example/p1.pdf", "reason": "PDF link"}
            ],
            "skip_reasons": ["record 2 already complete"]
        }"#;
        let finding: EscalationFinding = serde_json::from_str(json).unwrap();
        assert_eq!(finding.targets.len(), 1);
        assert_eq!(finding.targets[0].reason, "PDF link");
    }

    #[test]
    fn record_blocks_are_numbered() {
        let mut a = record("A", "https://gov.example/a");
        a.summary = "short".into();
        let b = record("B", "https://gov.example/b");
        let blocks = render_record_blocks(&[a, b]);
        assert!(blocks.contains("1. Title: A"));
        assert!(blocks.contains("2. Title: B"));
        assert!(blocks.contains("Summary: none"));
    }
}
