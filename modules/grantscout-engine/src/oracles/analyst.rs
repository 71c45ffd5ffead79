use ai_client::LlmClient;
use anyhow::Result;
use async_trait::async_trait;

use grantscout_common::{OrgProfile, ProfileFacts};

use crate::traits::ProfileAnalyst;

const EXTRACT_SYSTEM: &str = "\
You extract supplemental facts about an organization from raw search \
results about it. Only report what the results state explicitly — never \
infer or guess; leave a field null when the results say nothing about it.

Fields: actual_address (operating or production address when it differs \
from the registered one), core_products (products or technology direction), \
certifications (designations already held), founder_background (founding \
team credentials), financing (round, valuation), key_findings (anything \
else that helps match funding programs, one or two sentences).";

/// Default profile-fact extraction oracle, used before planning.
pub struct LlmProfileAnalyst {
    client: LlmClient,
}

impl LlmProfileAnalyst {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProfileAnalyst for LlmProfileAnalyst {
    async fn extract_facts(
        &self,
        profile: &OrgProfile,
        search_text: &str,
    ) -> Result<ProfileFacts> {
        let user = format!(
            "Organization: {}\nRegistered address: {}\nIndustry: {}\n\nSearch results:\n{}",
            profile.name,
            if profile.address.is_empty() {
                "unknown"
            } else {
                profile.address.as_str()
            },
            profile.industry,
            search_text,
        );
        self.client.extract(EXTRACT_SYSTEM, user).await
    }
}
