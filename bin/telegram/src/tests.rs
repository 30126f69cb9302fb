use bella_core::{GateError, Outcome, RejectReason};

use crate::config::{BotConfig, DmPolicy, GroupPolicy};
use crate::handlers::{notice_text, FALLBACK_REPLY, REJECT_BUSY, REJECT_NOT_ALLOWED, REJECT_NO_CREDIT};

fn test_config(dm_policy: DmPolicy, group_policy: GroupPolicy, allow_from: Vec<i64>) -> BotConfig {
    BotConfig {
        bot_token: "token".to_string(),
        dm_policy,
        group_policy,
        allow_from,
        database_url: None,
        provider_base_url: "https://openrouter.ai/api/v1".to_string(),
        provider_api_key: "key".to_string(),
        provider_model: "openai/gpt-4o-mini".to_string(),
        starting_grant: 300,
        log_ceiling_bytes: 1024 * 1024,
    }
}

fn dm_policy_allows(config: &BotConfig, user_id: i64) -> bool {
    match config.dm_policy {
        DmPolicy::Disabled => false,
        DmPolicy::Allowlist => config.is_allowlisted(user_id),
        DmPolicy::Open => true,
    }
}

fn group_policy_allows(config: &BotConfig, is_mentioned: bool) -> bool {
    match config.group_policy {
        GroupPolicy::Disabled => false,
        GroupPolicy::Always => true,
        GroupPolicy::Mention => is_mentioned,
    }
}

#[test]
fn dm_policy_open_accepts_any_user() {
    let config = test_config(DmPolicy::Open, GroupPolicy::Disabled, vec![]);
    assert!(dm_policy_allows(&config, 999));
    assert!(dm_policy_allows(&config, -5));
}

#[test]
fn dm_policy_allowlist_accepts_only_listed_users() {
    let config = test_config(DmPolicy::Allowlist, GroupPolicy::Disabled, vec![101, 202]);
    assert!(dm_policy_allows(&config, 101));
    assert!(!dm_policy_allows(&config, 303));
}

#[test]
fn dm_policy_disabled_rejects_all() {
    let config = test_config(DmPolicy::Disabled, GroupPolicy::Disabled, vec![1]);
    assert!(!dm_policy_allows(&config, 1));
    assert!(!dm_policy_allows(&config, 999));
}

#[test]
fn empty_allowlist_blocks_everyone() {
    let config = test_config(DmPolicy::Allowlist, GroupPolicy::Disabled, vec![]);
    assert!(!dm_policy_allows(&config, 1));
}

#[test]
fn group_policy_always_processes_messages() {
    let config = test_config(DmPolicy::Disabled, GroupPolicy::Always, vec![]);
    assert!(group_policy_allows(&config, false));
    assert!(group_policy_allows(&config, true));
}

#[test]
fn group_policy_mention_requires_mention() {
    let config = test_config(DmPolicy::Disabled, GroupPolicy::Mention, vec![]);
    assert!(!group_policy_allows(&config, false));
    assert!(group_policy_allows(&config, true));
}

#[test]
fn group_policy_disabled_rejects_all() {
    let config = test_config(DmPolicy::Disabled, GroupPolicy::Disabled, vec![]);
    assert!(!group_policy_allows(&config, false));
    assert!(!group_policy_allows(&config, true));
}

#[test]
fn policy_strings_parse() {
    assert_eq!("open".parse(), Ok(DmPolicy::Open));
    assert_eq!("ALLOWLIST".parse(), Ok(DmPolicy::Allowlist));
    assert_eq!("mention".parse(), Ok(GroupPolicy::Mention));
    assert_eq!("Always".parse(), Ok(GroupPolicy::Always));
    assert!("whatever".parse::<DmPolicy>().is_err());
}

#[test]
fn config_parses_from_toml_with_defaults() {
    let toml = r#"
        bot_token = "token"
        dm_policy = "open"
        group_policy = "mention"
        provider_base_url = "https://openrouter.ai/api/v1"
        provider_api_key = "key"
        provider_model = "openai/gpt-4o-mini"
    "#;

    let config: BotConfig = toml::from_str(toml).unwrap();
    assert_eq!(config.dm_policy, DmPolicy::Open);
    assert_eq!(config.group_policy, GroupPolicy::Mention);
    assert!(config.allow_from.is_empty());
    assert_eq!(config.database_url, None);
    assert_eq!(config.starting_grant, 300);
    assert_eq!(config.log_ceiling_bytes, 1024 * 1024);
}

#[test]
fn config_toml_overrides_defaults() {
    let toml = r#"
        bot_token = "token"
        dm_policy = "allowlist"
        group_policy = "disabled"
        allow_from = [7, 8]
        database_url = "sqlite://test.db"
        provider_base_url = "http://localhost:9999/v1"
        provider_api_key = "key"
        provider_model = "test/model"
        starting_grant = 5
        log_ceiling_bytes = 4096
    "#;

    let config: BotConfig = toml::from_str(toml).unwrap();
    assert!(config.is_allowlisted(7));
    assert!(!config.is_allowlisted(9));
    assert_eq!(config.database_url.as_deref(), Some("sqlite://test.db"));
    assert_eq!(config.starting_grant, 5);
    assert_eq!(config.log_ceiling_bytes, 4096);

    let provider = config.provider();
    assert_eq!(provider.base_url, "http://localhost:9999/v1");
    assert_eq!(provider.model, "test/model");
}

#[test]
fn rejections_map_to_their_notice() {
    let not_allowed = Ok(Outcome::Rejected(RejectReason::NotAllowed));
    let no_credit = Ok(Outcome::Rejected(RejectReason::InsufficientCredit));
    let busy = Ok(Outcome::Rejected(RejectReason::Busy));

    assert_eq!(notice_text(&not_allowed), Some(REJECT_NOT_ALLOWED));
    assert_eq!(notice_text(&no_credit), Some(REJECT_NO_CREDIT));
    assert_eq!(notice_text(&busy), Some(REJECT_BUSY));
}

#[test]
fn storage_failure_still_notifies_the_user() {
    let result: Result<Outcome, GateError> =
        Err(GateError::Storage(anyhow::anyhow!("pool closed")));
    assert_eq!(notice_text(&result), Some(FALLBACK_REPLY));
}

#[test]
fn provider_failure_notice_is_generic() {
    let result = Ok(Outcome::Errored("upstream 500".to_string()));
    assert_eq!(notice_text(&result), Some(FALLBACK_REPLY));
}

#[test]
fn silent_results_send_nothing() {
    assert_eq!(notice_text(&Ok(Outcome::Replied("hi".to_string()))), None);
    assert_eq!(notice_text(&Ok(Outcome::Ignored)), None);
    assert_eq!(notice_text(&Err(GateError::InvalidMessage)), None);
}
