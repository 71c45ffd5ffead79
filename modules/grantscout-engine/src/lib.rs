//! Round-based retrieval orchestration under a wall-clock budget.
//!
//! One [`Orchestrator`] run plans a batch of search tasks for a target
//! organization, executes them, reviews the quality of what came back, and
//! keeps issuing corrective rounds while the budget allows. Selected records
//! are escalated to an expensive deep-extraction path, then everything is
//! merged, deduplicated, and ranked.
//!
//! All reasoning (planning, review, escalation choice, ranking) and all
//! fetching (search, deep extraction) happens behind the traits in
//! [`traits`]; the engine owns only the control loop, the budget, and the
//! merge rules. [`oracles`] provides LLM-backed defaults for the reasoning
//! side.

pub mod budget;
pub mod dedup;
pub mod enrich;
pub mod escalation;
pub mod executor;
pub mod oracles;
pub mod orchestrator;
pub mod ranker;
pub mod review;
pub mod store;
pub mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use budget::BudgetClock;
pub use orchestrator::{EngineConfig, Orchestrator};
pub use store::RecordStore;
