use grantscout_common::{OrgProfile, UsageCounters};
use tracing::{info, warn};

use crate::budget::BudgetClock;
use crate::traits::{ProfileAnalyst, SearchExecutor};

/// Raw result blocks kept for fact extraction.
const MAX_FACT_BLOCKS: usize = 10;

/// Pre-planning profile enrichment.
///
/// Before any program search runs, two self-searches about the organization
/// fill in what the registry snapshot cannot: the operating address, core
/// products, certifications already held, founder background, financing.
/// Every failure along the way degrades to the unenriched profile.
pub struct ProfileEnricher<'a> {
    search: &'a dyn SearchExecutor,
    analyst: &'a dyn ProfileAnalyst,
    clock: &'a BudgetClock,
}

impl<'a> ProfileEnricher<'a> {
    pub fn new(
        search: &'a dyn SearchExecutor,
        analyst: &'a dyn ProfileAnalyst,
        clock: &'a BudgetClock,
    ) -> Self {
        Self {
            search,
            analyst,
            clock,
        }
    }

    pub async fn enrich(&self, profile: &OrgProfile) -> (OrgProfile, UsageCounters) {
        let mut usage = UsageCounters::default();
        if profile.name.is_empty() {
            return (profile.clone(), usage);
        }

        let queries = [
            format!(
                "\"{}\" official site products technology financing",
                profile.name
            ),
            format!(
                "\"{}\" certifications designations awards funding",
                profile.name
            ),
        ];

        let mut blocks: Vec<String> = Vec::new();
        for (i, query) in queries.iter().enumerate() {
            if self.clock.expired() {
                break;
            }
            info!(query = query.as_str(), "profile self-search");
            match self.search.search(query).await {
                Ok(outcome) => {
                    usage.absorb(&outcome.usage);
                    for record in &outcome.records {
                        blocks.push(format!(
                            "Title: {}\nSummary: {}\nSource: {}",
                            record.title, record.summary, record.source
                        ));
                    }
                    info!(count = outcome.records.len(), "self-search complete");
                }
                Err(e) => {
                    warn!(query = query.as_str(), error = %e, "self-search failed");
                }
            }

            let pacing = self.clock.request_pacing();
            if i + 1 < queries.len() && !pacing.is_zero() && !self.clock.expired() {
                tokio::time::sleep(pacing).await;
            }
        }

        if blocks.is_empty() {
            info!("no supplemental material found, planning on the base profile");
            return (profile.clone(), usage);
        }
        blocks.truncate(MAX_FACT_BLOCKS);

        match self
            .analyst
            .extract_facts(profile, &blocks.join("\n\n---\n\n"))
            .await
        {
            Ok(facts) => {
                let mut enriched = profile.clone();
                enriched.apply_facts(&facts);
                info!(
                    actual_address = !enriched.actual_address.is_empty(),
                    core_products = !enriched.core_products.is_empty(),
                    certifications = enriched.certifications.len(),
                    "profile enriched"
                );
                (enriched, usage)
            }
            Err(e) => {
                warn!(error = %e, "fact extraction failed, continuing with base profile");
                (profile.clone(), usage)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{record, MockAnalyst, MockSearch};
    use grantscout_common::{ProfileFacts, SearchOutcome};
    use std::time::Duration;

    fn profile() -> OrgProfile {
        OrgProfile::new("Acme Photonics", "photonics", "Riverside")
    }

    fn self_search_outcome() -> SearchOutcome {
        let mut r = record("Acme Photonics raises series B", "https://news.example/acme");
        r.summary = "Acme ships 800G optical modules from its Harbor Rd plant".into();
        SearchOutcome {
            records: vec![r],
            sources: vec![],
            usage: UsageCounters {
                prompt_tokens: 5,
                completion_tokens: 5,
                total_tokens: 10,
            },
        }
    }

    #[tokio::test]
    async fn facts_overlay_the_profile() {
        let search = MockSearch::new().on_search(
            "\"Acme Photonics\" official site products technology financing",
            self_search_outcome(),
        );
        let analyst = MockAnalyst::returning(ProfileFacts {
            core_products: Some("800G optical modules".into()),
            ..ProfileFacts::default()
        });
        let clock = BudgetClock::start(Duration::from_secs(60), Duration::ZERO);
        let enricher = ProfileEnricher::new(&search, &analyst, &clock);

        let (enriched, usage) = enricher.enrich(&profile()).await;
        assert_eq!(enriched.core_products, "800G optical modules");
        assert_eq!(usage.total_tokens, 10);
    }

    #[tokio::test]
    async fn no_material_means_no_analyst_call() {
        let search = MockSearch::new();
        let analyst = MockAnalyst::returning(ProfileFacts::default());
        let clock = BudgetClock::start(Duration::from_secs(60), Duration::ZERO);
        let enricher = ProfileEnricher::new(&search, &analyst, &clock);

        let (enriched, _) = enricher.enrich(&profile()).await;
        assert!(enriched.core_products.is_empty());
        assert_eq!(analyst.call_count(), 0);
        // Both self-searches still ran.
        assert_eq!(search.calls().len(), 2);
    }

    #[tokio::test]
    async fn analyst_failure_keeps_base_profile() {
        let search = MockSearch::new().on_search(
            "\"Acme Photonics\" official site products technology financing",
            self_search_outcome(),
        );
        let analyst = MockAnalyst::failing();
        let clock = BudgetClock::start(Duration::from_secs(60), Duration::ZERO);
        let enricher = ProfileEnricher::new(&search, &analyst, &clock);

        let (enriched, _) = enricher.enrich(&profile()).await;
        assert!(enriched.core_products.is_empty());
        assert!(enriched.actual_address.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_clock_skips_self_searches() {
        let search = MockSearch::new();
        let analyst = MockAnalyst::returning(ProfileFacts::default());
        let clock = BudgetClock::start(Duration::ZERO, Duration::ZERO);
        let enricher = ProfileEnricher::new(&search, &analyst, &clock);

        let (enriched, usage) = enricher.enrich(&profile()).await;
        assert!(search.calls().is_empty());
        assert_eq!(usage, UsageCounters::default());
        assert_eq!(enriched.name, "Acme Photonics");
    }
}
