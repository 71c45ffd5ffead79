use serde::Serialize;
use thiserror::Error;

/// Conditions that terminate a run with a populated error field.
///
/// Everything else — a failed search task, a failed escalation target, a
/// ranker that returns garbage — degrades the step it belongs to and is
/// only visible in logs. Budget exhaustion is a normal terminal state,
/// not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FatalError {
    #[error("planner produced no retrieval tasks")]
    NoTasksPlanned,

    #[error("planner call failed: {detail}")]
    PlannerUnavailable { detail: String },

    #[error("organization blocked by compliance veto: {detail}")]
    ComplianceBlocked { detail: String },
}

#[derive(Debug, Error)]
pub enum GrantScoutError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Fatal(#[from] FatalError),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_error_serializes_tagged() {
        let err = FatalError::ComplianceBlocked {
            detail: "unresolved credit sanctions".into(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "compliance_blocked");
        assert_eq!(json["detail"], "unresolved credit sanctions");
    }

    #[test]
    fn fatal_error_displays_detail() {
        let err = FatalError::PlannerUnavailable {
            detail: "timeout".into(),
        };
        assert!(err.to_string().contains("timeout"));
    }
}
