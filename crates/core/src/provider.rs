//! AI provider boundary.
//!
//! The gate talks to the assistant through [`AssistantProvider`];
//! [`OpenRouterProvider`] is the production implementation, speaking
//! the OpenAI-style chat-completions protocol with the Bella persona
//! and a short rolling per-user context window.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

/// Fixed identity presented in replies.
pub const PERSONA_NAME: &str = "Bella";

const PERSONA_PROMPT: &str = "You are Bella, 22, friendly and very casual. \
You chat like a real person texting a friend: relaxed tone, light slang, \
at most two or three short lines per reply. Stay helpful and warm, and \
never describe yourself as an AI.";

/// How many prior exchanges are replayed as context.
const HISTORY_WINDOW_TURNS: usize = 10;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Request(String),

    #[error("provider returned a malformed response")]
    MalformedResponse,
}

/// Boundary to the external assistant.
#[async_trait]
pub trait AssistantProvider: Send + Sync {
    /// Produce a reply to `text` in the context of `user_id`'s
    /// conversation. May fail or exceed the caller's timeout.
    async fn complete(&self, user_id: &str, text: &str) -> Result<String, ProviderError>;
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL of an OpenAI-compatible API, e.g. `https://openrouter.ai/api/v1`.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

#[derive(Clone)]
struct Turn {
    role: &'static str,
    content: String,
}

/// Chat-completions client with per-user rolling history.
pub struct OpenRouterProvider {
    client: reqwest::Client,
    config: ProviderConfig,
    history: DashMap<String, Vec<Turn>>,
}

impl OpenRouterProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            history: DashMap::new(),
        }
    }

    fn build_messages(&self, user_id: &str, text: &str) -> Vec<Value> {
        let mut messages = vec![json!({"role": "system", "content": PERSONA_PROMPT})];

        if let Some(turns) = self.history.get(user_id) {
            for turn in turns.iter() {
                messages.push(json!({"role": turn.role, "content": turn.content}));
            }
        }

        messages.push(json!({"role": "user", "content": text}));
        messages
    }

    fn remember(&self, user_id: &str, text: &str, reply: &str) {
        let mut turns = self.history.entry(user_id.to_string()).or_default();
        turns.push(Turn {
            role: "user",
            content: text.to_string(),
        });
        turns.push(Turn {
            role: "assistant",
            content: reply.to_string(),
        });

        // Two entries per exchange.
        let cap = HISTORY_WINDOW_TURNS * 2;
        if turns.len() > cap {
            let excess = turns.len() - cap;
            turns.drain(..excess);
        }
    }
}

/// Pull the assistant text out of a chat-completions response body.
fn extract_reply(body: &Value) -> Option<String> {
    let content = body
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()?
        .trim();

    if content.is_empty() {
        None
    } else {
        Some(content.to_string())
    }
}

#[async_trait]
impl AssistantProvider for OpenRouterProvider {
    async fn complete(&self, user_id: &str, text: &str) -> Result<String, ProviderError> {
        let messages = self.build_messages(user_id, text);
        debug!(user_id, context_len = messages.len(), "Calling assistant provider");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&json!({
                "model": self.config.model,
                "messages": messages,
            }))
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::Request(format!(
                "provider returned status {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        let reply = extract_reply(&body).ok_or(ProviderError::MalformedResponse)?;
        self.remember(user_id, text, &reply);

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_provider() -> OpenRouterProvider {
        OpenRouterProvider::new(ProviderConfig {
            base_url: "http://localhost:0".to_string(),
            api_key: "test".to_string(),
            model: "test-model".to_string(),
        })
    }

    #[test]
    fn extract_reply_reads_first_choice() {
        let body = json!({
            "choices": [{"message": {"role": "assistant", "content": " hey! "}}]
        });
        assert_eq!(extract_reply(&body), Some("hey!".to_string()));
    }

    #[test]
    fn extract_reply_rejects_empty_and_malformed() {
        assert_eq!(extract_reply(&json!({})), None);
        assert_eq!(extract_reply(&json!({"choices": []})), None);
        let blank = json!({"choices": [{"message": {"content": "  "}}]});
        assert_eq!(extract_reply(&blank), None);
    }

    #[test]
    fn messages_start_with_persona_and_end_with_user() {
        let provider = test_provider();
        let messages = provider.build_messages("u1", "hi");

        assert_eq!(messages[0]["role"], "system");
        assert!(messages[0]["content"].as_str().unwrap().contains("Bella"));
        assert_eq!(messages.last().unwrap()["role"], "user");
        assert_eq!(messages.last().unwrap()["content"], "hi");
    }

    #[test]
    fn history_is_replayed_and_bounded() {
        let provider = test_provider();

        for i in 0..30 {
            provider.remember("u1", &format!("q{i}"), &format!("a{i}"));
        }

        let messages = provider.build_messages("u1", "latest");
        // persona + capped history + new user message
        assert_eq!(messages.len(), 1 + HISTORY_WINDOW_TURNS * 2 + 1);

        // Oldest exchanges were evicted.
        let serialized = serde_json::to_string(&messages).unwrap();
        assert!(!serialized.contains("q0"));
        assert!(serialized.contains("a29"));
    }

    #[test]
    fn histories_are_per_user() {
        let provider = test_provider();
        provider.remember("u1", "secret", "reply");

        let other = provider.build_messages("u2", "hi");
        let serialized = serde_json::to_string(&other).unwrap();
        assert!(!serialized.contains("secret"));
    }
}
