use grantscout_common::{RetrievalTask, RoundOutcome, TaskReport};
use tracing::{info, warn};

use crate::budget::BudgetClock;
use crate::traits::SearchExecutor;

/// Runs one batch of retrieval tasks sequentially against the search
/// executor.
///
/// Each task is expiry-checked before it starts; tasks remaining when the
/// budget runs out are counted as skipped. A failed search is recorded in
/// the task's report and never aborts the batch. Between consecutive tasks
/// the executor sleeps the clock's pacing interval to respect upstream rate
/// limits, so batch wall time is bounded by
/// `completed * (search latency + pacing)` and overruns the budget by at
/// most one in-flight call.
pub struct TaskExecutor<'a> {
    search: &'a dyn SearchExecutor,
    clock: &'a BudgetClock,
}

impl<'a> TaskExecutor<'a> {
    pub fn new(search: &'a dyn SearchExecutor, clock: &'a BudgetClock) -> Self {
        Self { search, clock }
    }

    pub async fn run_batch(&self, tasks: &[RetrievalTask]) -> RoundOutcome {
        let mut outcome = RoundOutcome::default();

        for (i, task) in tasks.iter().enumerate() {
            if self.clock.expired() {
                outcome.skipped = tasks.len() - i;
                warn!(
                    elapsed_secs = self.clock.elapsed().as_secs(),
                    skipped = outcome.skipped,
                    "time budget exhausted mid-batch"
                );
                break;
            }

            info!(
                task = i + 1,
                total = tasks.len(),
                topic = task.topic.as_str(),
                phrase = task.phrase.as_str(),
                remaining_secs = self.clock.remaining().as_secs(),
                "search task started"
            );

            match self.search.search(&task.phrase).await {
                Ok(mut found) => {
                    for record in &mut found.records {
                        record.topic = task.topic.clone();
                    }
                    info!(count = found.records.len(), "search task complete");
                    outcome.reports.push(TaskReport {
                        topic: task.topic.clone(),
                        phrase: task.phrase.clone(),
                        records_found: found.records.len(),
                        error: None,
                    });
                    outcome.records.extend(found.records);
                    outcome.sources.extend(found.sources);
                    outcome.usage.absorb(&found.usage);
                }
                Err(e) => {
                    warn!(phrase = task.phrase.as_str(), error = %e, "search task failed");
                    outcome.reports.push(TaskReport {
                        topic: task.topic.clone(),
                        phrase: task.phrase.clone(),
                        records_found: 0,
                        error: Some(e.to_string()),
                    });
                }
            }

            let pacing = self.clock.request_pacing();
            if i + 1 < tasks.len() && !pacing.is_zero() && !self.clock.expired() {
                tokio::time::sleep(pacing).await;
            }
        }

        outcome
    }
}
