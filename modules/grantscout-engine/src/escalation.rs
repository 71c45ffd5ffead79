use grantscout_common::{EscalationTarget, ProgramRecord};
use tracing::{info, warn};

use crate::traits::EscalationJudge;

/// Picks which records go through the expensive deep-extraction path.
///
/// The choice itself is fully delegated to the judge oracle; this wrapper
/// only avoids a wasted call on an empty record set and degrades a failed
/// call to "escalate nothing". The caller holds the budget gate — the
/// selector must not even be invoked unless a deep-fetch pass still fits
/// in the remaining budget.
pub struct EscalationSelector<'a> {
    judge: &'a dyn EscalationJudge,
}

impl<'a> EscalationSelector<'a> {
    pub fn new(judge: &'a dyn EscalationJudge) -> Self {
        Self { judge }
    }

    pub async fn select(&self, records: &[ProgramRecord]) -> Vec<EscalationTarget> {
        if records.is_empty() {
            return Vec::new();
        }

        match self.judge.select_targets(records).await {
            Ok(targets) => {
                info!(count = targets.len(), "escalation targets selected");
                for target in &targets {
                    info!(
                        title = target.title.as_str(),
                        url = target.url.as_str(),
                        reason = target.reason.as_str(),
                        "escalation target"
                    );
                }
                targets
            }
            Err(e) => {
                warn!(error = %e, "escalation judge failed, skipping deep fetch");
                Vec::new()
            }
        }
    }
}
