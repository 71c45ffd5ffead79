//! LLM-backed default implementations of the reasoning contracts.
//!
//! Each oracle owns its prompts and its output parsing; the wire transport
//! lives in `ai-client`. Swapping any of these for a different judge means
//! implementing the matching trait in [`crate::traits`] — the engine never
//! sees a prompt.

mod analyst;
mod judge;
mod planner;
mod reviewer;
mod scorer;

pub use analyst::LlmProfileAnalyst;
pub use judge::LlmEscalationJudge;
pub use planner::LlmPlanner;
pub use reviewer::LlmReviewer;
pub use scorer::LlmScorer;

use ai_client::LlmClient;
use grantscout_common::{Config, GrantScoutError, OrgProfile};

/// Build the shared client the default oracles run on.
pub fn client_from_config(config: &Config) -> Result<LlmClient, GrantScoutError> {
    if config.anthropic_api_key.is_empty() {
        return Err(GrantScoutError::Config(
            "anthropic_api_key must not be empty".into(),
        ));
    }
    let mut client = LlmClient::new(&config.anthropic_api_key, &config.model);
    if let Some(ref url) = config.llm_base_url {
        client = client.with_base_url(url);
    }
    Ok(client)
}

/// Render the profile as the labeled block every oracle prompt starts with.
/// Core registry fields always appear; enrichment fields appear only when
/// they were actually found.
pub(crate) fn render_profile(profile: &OrgProfile) -> String {
    let or_unknown = |s: &str| {
        if s.is_empty() {
            "not provided".to_string()
        } else {
            s.to_string()
        }
    };

    let mut lines = vec![
        "Target organization:".to_string(),
        format!("- Name: {}", or_unknown(&profile.name)),
        format!("- Industry: {}", or_unknown(&profile.industry)),
        format!("- Region: {}", or_unknown(&profile.region)),
        format!("- Registered address: {}", or_unknown(&profile.address)),
        format!("- Business scope: {}", or_unknown(&profile.business_scope)),
        format!(
            "- Registered capital: {}",
            or_unknown(&profile.registered_capital)
        ),
        format!("- Founded: {}", or_unknown(&profile.founded)),
        format!("- Headcount: {}", or_unknown(&profile.headcount)),
        format!(
            "- Tags: {}",
            if profile.tags.is_empty() {
                "none".to_string()
            } else {
                profile.tags.join(", ")
            }
        ),
        format!("- Risk record: {}", or_unknown(&profile.risk_info)),
    ];

    if !profile.actual_address.is_empty() {
        lines.push(format!(
            "- Operating address: {} (differs from the registered address; programs from both districts apply)",
            profile.actual_address
        ));
    }
    if !profile.core_products.is_empty() {
        lines.push(format!("- Core products: {}", profile.core_products));
    }
    if !profile.certifications.is_empty() {
        lines.push(format!(
            "- Certifications held: {}",
            profile.certifications.join(", ")
        ));
    }
    if !profile.founder_background.is_empty() {
        lines.push(format!(
            "- Founder background: {}",
            profile.founder_background
        ));
    }
    if !profile.financing.is_empty() {
        lines.push(format!("- Financing: {}", profile.financing));
    }
    if !profile.key_findings.is_empty() {
        lines.push(format!("- Additional findings: {}", profile.key_findings));
    }

    lines.join("\n")
}

pub(crate) fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}
