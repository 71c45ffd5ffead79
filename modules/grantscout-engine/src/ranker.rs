use grantscout_common::{AmountTier, OrgProfile, ProgramRecord, ScoreBlock};
use tracing::{debug, info, warn};

use crate::traits::Scorer;

/// Applies the scorer oracle's batch verdict to the merged record set.
///
/// Scoring is best-effort: a failed call leaves the records unscored and
/// unsorted. Entry indexes are 1-based positions in the submitted batch and
/// are bounds-checked before anything is written back.
pub struct Ranker<'a> {
    scorer: &'a dyn Scorer,
}

impl<'a> Ranker<'a> {
    pub fn new(scorer: &'a dyn Scorer) -> Self {
        Self { scorer }
    }

    /// Score and sort in place. Returns whether scores were applied.
    pub async fn rank(&self, profile: &OrgProfile, records: &mut Vec<ProgramRecord>) -> bool {
        if records.is_empty() {
            return false;
        }

        let entries = match self.scorer.score(profile, records).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "scorer failed, returning unscored records");
                return false;
            }
        };

        let mut applied = 0usize;
        for entry in entries {
            if entry.index == 0 || entry.index > records.len() {
                warn!(
                    index = entry.index,
                    batch = records.len(),
                    "scorer index out of bounds, entry ignored"
                );
                continue;
            }
            let record = &mut records[entry.index - 1];
            record.score = ScoreBlock {
                composite: entry.composite,
                amount: entry.amount,
                exclusivity: entry.exclusivity,
                feasibility: entry.feasibility,
                urgency: entry.urgency,
                sustainability: entry.sustainability,
                rationale: entry.rationale,
            };
            if !entry.validity.is_empty() {
                record.validity = entry.validity;
            }
            if !entry.amount_estimate.is_empty() {
                record.amount_estimate = entry.amount_estimate;
            }
            if entry.amount_tier != AmountTier::Unknown {
                record.amount_tier = entry.amount_tier;
            }
            applied += 1;
            debug!(
                title = record.title.as_str(),
                composite = record.score.composite,
                tier = %record.amount_tier,
                "record scored"
            );
        }

        records.sort_by(|a, b| b.score.composite.cmp(&a.score.composite));
        info!(applied, total = records.len(), "records ranked");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{record, sample_profile, scored, MockScorer};

    #[tokio::test]
    async fn scores_apply_and_sort_descending() {
        let profile = sample_profile();
        let scorer = MockScorer::returning(vec![scored(1, 40), scored(2, 90), scored(3, 70)]);
        let ranker = Ranker::new(&scorer);

        let mut records = vec![record("A", "u1"), record("B", "u2"), record("C", "u3")];
        assert!(ranker.rank(&profile, &mut records).await);

        let titles: Vec<_> = records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["B", "C", "A"]);
        assert_eq!(records[0].score.composite, 90);
    }

    #[tokio::test]
    async fn out_of_bounds_indexes_are_ignored() {
        let profile = sample_profile();
        let scorer = MockScorer::returning(vec![scored(0, 99), scored(5, 99), scored(2, 60)]);
        let ranker = Ranker::new(&scorer);

        let mut records = vec![record("A", "u1"), record("B", "u2")];
        assert!(ranker.rank(&profile, &mut records).await);

        // Only the in-bounds entry landed; B sorts first.
        assert_eq!(records[0].title, "B");
        assert_eq!(records[0].score.composite, 60);
        assert_eq!(records[1].score.composite, 0);
    }

    #[tokio::test]
    async fn scorer_failure_leaves_order_untouched() {
        let profile = sample_profile();
        let scorer = MockScorer::failing();
        let ranker = Ranker::new(&scorer);

        let mut records = vec![record("A", "u1"), record("B", "u2")];
        assert!(!ranker.rank(&profile, &mut records).await);

        let titles: Vec<_> = records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B"]);
        assert_eq!(records[0].score.composite, 0);
    }

    #[tokio::test]
    async fn empty_batch_skips_the_oracle() {
        let profile = sample_profile();
        let scorer = MockScorer::returning(vec![]);
        let ranker = Ranker::new(&scorer);

        let mut records = Vec::new();
        assert!(!ranker.rank(&profile, &mut records).await);
        assert_eq!(scorer.call_count(), 0);
    }

    #[tokio::test]
    async fn equal_scores_keep_first_seen_order() {
        let profile = sample_profile();
        let scorer = MockScorer::returning(vec![scored(1, 50), scored(2, 50)]);
        let ranker = Ranker::new(&scorer);

        let mut records = vec![record("First", "u1"), record("Second", "u2")];
        ranker.rank(&profile, &mut records).await;

        assert_eq!(records[0].title, "First");
        assert_eq!(records[1].title, "Second");
    }
}
