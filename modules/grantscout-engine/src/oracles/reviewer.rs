use ai_client::LlmClient;
use anyhow::Result;
use async_trait::async_trait;

use grantscout_common::{ProgramRecord, ReviewVerdict};

use super::{render_profile, today};
use crate::traits::{ReviewContext, Reviewer};

const REVIEW_SYSTEM: &str = "\
You audit the coverage of a funding-program search that just finished a \
round, and decide whether another round is worth running.

Judge coverage per topic (facility, industry-chain, identity, workforce, \
compliance, tax, talent): a topic that applies to the organization is \
sufficient once it has one or two usable records — a record with a URL and \
concrete support content. Zero records for an applicable topic, or records \
with blank summaries, mean insufficient or missing. Mark topics that do not \
apply as not_applicable rather than missing.

Also weigh timeliness: a result set dominated by expired programs with \
nothing from the current year is poor even when every topic has hits.

Set quality to good, fair, or poor, fill the coverage map, and set \
needs_more. When needs_more is true, propose retry_tasks with improved \
phrases: narrower when a phrase returned noise, broader when it returned \
nothing, always carrying the region prefix, preferring park- or \
district-level programs. Never repropose a phrase that was already \
searched — it will be discarded. If the remaining budget is under 30 \
seconds, set needs_more to false regardless of coverage.";

/// Default round reviewer oracle.
pub struct LlmReviewer {
    client: LlmClient,
}

impl LlmReviewer {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

fn record_line(i: usize, record: &ProgramRecord) -> String {
    let date = if record.publish_date.is_empty() {
        "date unknown"
    } else {
        record.publish_date.as_str()
    };
    let mut line = format!("{}. [{}] {} — {}", i + 1, record.topic, record.title, date);
    if !record.validity.is_empty() {
        line.push_str(&format!(" | validity: {}", record.validity));
    }
    if !record.deadline.is_empty() {
        line.push_str(&format!(" | deadline: {}", record.deadline));
    }
    let substance = if !record.support_text.is_empty() {
        record.support_text.as_str()
    } else if !record.summary.is_empty() {
        ai_client::util::truncate_to_char_boundary(&record.summary, 80)
    } else {
        "no summary"
    };
    line.push_str(&format!(" — {substance}"));
    line
}

fn build_user_prompt(ctx: &ReviewContext<'_>) -> String {
    let history = ctx
        .search_history
        .iter()
        .map(|phrase| format!("  - {phrase}"))
        .collect::<Vec<_>>()
        .join("\n");
    let records = ctx
        .records
        .iter()
        .enumerate()
        .map(|(i, record)| record_line(i, record))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{}\n\nCurrent date: {}\nRound just finished: {}\nBudget remaining: {}s\n\n\
         Phrases already searched:\n{}\n\nRecords so far ({}):\n{}\n\n\
         Audit the coverage and decide whether another round is needed.",
        render_profile(ctx.profile),
        today(),
        ctx.round,
        ctx.remaining_budget.as_secs(),
        history,
        ctx.records.len(),
        records,
    )
}

#[async_trait]
impl Reviewer for LlmReviewer {
    async fn review(&self, ctx: ReviewContext<'_>) -> Result<ReviewVerdict> {
        let user = build_user_prompt(&ctx);
        self.client.extract(REVIEW_SYSTEM, user).await
    }
}
