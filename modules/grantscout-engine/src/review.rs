use grantscout_common::ReviewVerdict;
use tracing::{info, warn};

use crate::traits::{ReviewContext, Reviewer};

/// Post-round quality gate.
///
/// Wraps the reviewer oracle and enforces the two loop-breaking rules the
/// oracle cannot be trusted with: a retry phrase that already ran is never
/// reissued, and an empty retry list always means stop. A failed or
/// malformed review also means stop — a broken judge must not keep the
/// loop alive.
pub struct ReviewGate<'a> {
    reviewer: &'a dyn Reviewer,
}

impl<'a> ReviewGate<'a> {
    pub fn new(reviewer: &'a dyn Reviewer) -> Self {
        Self { reviewer }
    }

    pub async fn review(&self, ctx: ReviewContext<'_>) -> ReviewVerdict {
        let mut verdict = match self.reviewer.review(ctx).await {
            Ok(v) => v,
            Err(e) => {
                warn!(round = ctx.round, error = %e, "reviewer unavailable, stopping the round loop");
                return ReviewVerdict::stop(format!("reviewer unavailable: {e}"));
            }
        };

        let proposed = verdict.retry_tasks.len();
        verdict.retry_tasks.retain(|t| {
            let stale = ctx.search_history.iter().any(|h| h == &t.phrase);
            if stale {
                info!(
                    phrase = t.phrase.as_str(),
                    "dropping retry task, phrase already searched"
                );
            }
            !stale
        });

        if verdict.retry_tasks.is_empty() && verdict.needs_more {
            info!(
                proposed,
                "no usable retry tasks left, forcing the loop to stop"
            );
            verdict.needs_more = false;
        }

        verdict
    }
}
