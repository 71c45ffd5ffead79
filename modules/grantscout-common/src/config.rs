use std::env;

/// Default judge/planner model when GRANTSCOUT_MODEL is unset.
pub const DEFAULT_MODEL: &str = "claude-haiku-4-5-20251001";

/// Credentials and model selection for the LLM-backed oracles, loaded from
/// environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub model: String,
    /// Override for the API endpoint (proxies, test servers).
    pub llm_base_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            anthropic_api_key: required_env("ANTHROPIC_API_KEY"),
            model: env::var("GRANTSCOUT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            llm_base_url: env::var("GRANTSCOUT_LLM_BASE_URL").ok(),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
