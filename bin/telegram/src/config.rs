use serde::{Deserialize, Serialize};

use bella_core::ProviderConfig;
use bella_eventlog::DEFAULT_LOG_CEILING_BYTES;
use bella_ledger::DEFAULT_STARTING_GRANT;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DmPolicy {
    Open,
    Allowlist,
    Disabled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GroupPolicy {
    Mention,
    Always,
    Disabled,
}

/// Bot configuration, loaded from a TOML file or the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub bot_token: String,
    pub dm_policy: DmPolicy,
    pub group_policy: GroupPolicy,
    #[serde(default)]
    pub allow_from: Vec<i64>,
    pub database_url: Option<String>,

    pub provider_base_url: String,
    pub provider_api_key: String,
    pub provider_model: String,

    #[serde(default = "default_starting_grant")]
    pub starting_grant: i64,
    #[serde(default = "default_log_ceiling_bytes")]
    pub log_ceiling_bytes: i64,
}

fn default_starting_grant() -> i64 {
    DEFAULT_STARTING_GRANT
}

fn default_log_ceiling_bytes() -> i64 {
    DEFAULT_LOG_CEILING_BYTES
}

impl BotConfig {
    pub fn from_path(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read bot config {}: {}", path, e))?;
        let config: BotConfig =
            toml::from_str(&contents).map_err(|e| anyhow::anyhow!("Invalid bot config: {}", e))?;
        Ok(config)
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let bot_token = std::env::var("TELEGRAM_BOT_TOKEN")
            .map_err(|_| anyhow::anyhow!("TELEGRAM_BOT_TOKEN environment variable is required"))?;

        let provider_api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENROUTER_API_KEY environment variable is required"))?;

        let dm_policy = std::env::var("TELEGRAM_DM_POLICY")
            .unwrap_or_else(|_| "open".to_string())
            .parse()
            .unwrap_or(DmPolicy::Open);

        let group_policy = std::env::var("TELEGRAM_GROUP_POLICY")
            .unwrap_or_else(|_| "mention".to_string())
            .parse()
            .unwrap_or(GroupPolicy::Mention);

        let allow_from: Vec<i64> = std::env::var("TELEGRAM_ALLOW_FROM")
            .unwrap_or_default()
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();

        Ok(Self {
            bot_token,
            dm_policy,
            group_policy,
            allow_from,
            database_url: std::env::var("DATABASE_URL").ok(),
            provider_base_url: std::env::var("OPENROUTER_BASE_URL")
                .unwrap_or_else(|_| "https://openrouter.ai/api/v1".to_string()),
            provider_api_key,
            provider_model: std::env::var("OPENROUTER_MODEL")
                .unwrap_or_else(|_| "openai/gpt-4o-mini".to_string()),
            starting_grant: std::env::var("STARTING_GRANT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_STARTING_GRANT),
            log_ceiling_bytes: std::env::var("LOG_CEILING_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_LOG_CEILING_BYTES),
        })
    }

    pub fn is_allowlisted(&self, user_id: i64) -> bool {
        self.allow_from.contains(&user_id)
    }

    pub fn provider(&self) -> ProviderConfig {
        ProviderConfig {
            base_url: self.provider_base_url.clone(),
            api_key: self.provider_api_key.clone(),
            model: self.provider_model.clone(),
        }
    }
}

impl std::str::FromStr for DmPolicy {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(DmPolicy::Open),
            "allowlist" => Ok(DmPolicy::Allowlist),
            "disabled" => Ok(DmPolicy::Disabled),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for GroupPolicy {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mention" => Ok(GroupPolicy::Mention),
            "always" => Ok(GroupPolicy::Always),
            "disabled" => Ok(GroupPolicy::Disabled),
            _ => Err(()),
        }
    }
}
