use std::time::Duration;

use tokio::time::Instant;

/// Wall-clock budget for one orchestration run.
///
/// Created at run start and shared by reference into every gated component.
/// Every stopping decision in the engine reads this clock and nothing else:
/// a caller that wants early cancellation substitutes a clock with a
/// zero-duration budget.
///
/// Built on `tokio::time::Instant` so tests under a paused runtime can
/// advance time deterministically.
#[derive(Debug, Clone)]
pub struct BudgetClock {
    started_at: Instant,
    total_budget: Duration,
    request_pacing: Duration,
}

impl BudgetClock {
    /// Record t0 and start the clock.
    pub fn start(total_budget: Duration, request_pacing: Duration) -> Self {
        Self {
            started_at: Instant::now(),
            total_budget,
            request_pacing,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Budget left, floored at zero.
    pub fn remaining(&self) -> Duration {
        self.total_budget.saturating_sub(self.elapsed())
    }

    pub fn expired(&self) -> bool {
        self.elapsed() >= self.total_budget
    }

    /// Whether a step with the given minimum viable duration can still
    /// finish inside the budget. Starting a step that cannot finish wastes
    /// the remainder without producing anything.
    pub fn has_time_for(&self, min_step: Duration) -> bool {
        self.remaining() > min_step
    }

    pub fn total_budget(&self) -> Duration {
        self.total_budget
    }

    /// Delay to respect between consecutive upstream requests.
    pub fn request_pacing(&self) -> Duration {
        self.request_pacing
    }
}
