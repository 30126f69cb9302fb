//! Credit-gated session manager.
//!
//! Orchestrates one inbound message end to end: classification, the
//! ledger lookup and credit gate, the typing slot, the bounded
//! provider call, and the log/ledger side effects.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use bella_eventlog::{BoundedLogSink, EventKind, LogEntry};
use bella_ledger::{ConnectionStatus, DebitOutcome, LedgerStore, MembershipRecord, Tier};

use crate::classify::classify;
use crate::error::GateError;
use crate::provider::AssistantProvider;
use crate::types::{InboundMessage, MessageClass, Outcome, RejectReason};
use crate::typing::TypingController;

/// Maximum time to wait for a provider reply.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(60);

/// Interval at which the typing indicator is refreshed while composing.
pub const DEFAULT_TYPING_INTERVAL: Duration = Duration::from_secs(4);

/// Platform-specific outbound signals (typing indicator).
#[async_trait]
pub trait PlatformActions: Send + Sync {
    /// Surface the `composing` state to the user.
    async fn send_typing(&self, conversation_id: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct GateConfig {
    pub provider_timeout: Duration,
    pub typing_interval: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            typing_interval: DEFAULT_TYPING_INTERVAL,
        }
    }
}

pub struct SessionGate<P> {
    ledger: LedgerStore,
    log: BoundedLogSink,
    provider: Arc<dyn AssistantProvider>,
    typing: TypingController,
    platform: P,
    config: GateConfig,
}

impl<P: PlatformActions> SessionGate<P> {
    pub fn new(
        ledger: LedgerStore,
        log: BoundedLogSink,
        provider: Arc<dyn AssistantProvider>,
        platform: P,
    ) -> Self {
        Self::with_config(ledger, log, provider, platform, GateConfig::default())
    }

    pub fn with_config(
        ledger: LedgerStore,
        log: BoundedLogSink,
        provider: Arc<dyn AssistantProvider>,
        platform: P,
        config: GateConfig,
    ) -> Self {
        Self {
            ledger,
            log,
            provider,
            typing: TypingController::new(),
            platform,
            config,
        }
    }

    /// The ledger behind the gate, for command handlers (membership
    /// status, top-ups) that live outside the credit path.
    pub fn ledger(&self) -> &LedgerStore {
        &self.ledger
    }

    pub fn typing(&self) -> &TypingController {
        &self.typing
    }

    /// Handle one inbound message and produce a terminal outcome.
    ///
    /// Storage failures on the ledger abort the message (`Err`);
    /// everything else (rejections, provider failures) is a normal
    /// [`Outcome`]. Log writes never fail the message.
    pub async fn handle(&self, message: &InboundMessage) -> Result<Outcome, GateError> {
        let user_id = message.user_id.as_str();

        // Classification is pure and precedes any side effect, so a
        // malformed message never creates ledger rows.
        let class = match classify(message) {
            Ok(class) => class,
            Err(e) => {
                self.log
                    .record(LogEntry::new(user_id, EventKind::Rejected, "invalid message"));
                return Err(e);
            }
        };

        let (user, membership) = self.ledger.get_or_create(user_id).await?;
        self.ledger.touch(user_id).await?;

        match class {
            // Media is refused before any other check: no debit, no
            // provider call, no typing signal.
            MessageClass::Media(kind) => {
                info!(user_id, kind = kind.as_str(), "Rejecting media message");
                self.log.record(LogEntry::new(
                    user_id,
                    EventKind::Rejected,
                    &format!("media message ({})", kind.as_str()),
                ));
                Ok(Outcome::Rejected(RejectReason::NotAllowed))
            }

            // Blocked senders get no reply at all.
            _ if user.connection_status == ConnectionStatus::Blocked => {
                debug!(user_id, "Dropping message from blocked user");
                self.log
                    .record(LogEntry::new(user_id, EventKind::Rejected, "blocked user"));
                Ok(Outcome::Ignored)
            }

            // Commands bypass the credit gate; the caller's command
            // handler takes over.
            MessageClass::Command(cmd) => {
                debug!(user_id, command = %cmd.name, "Delegating command");
                Ok(Outcome::Delegated(cmd))
            }

            MessageClass::Text(text) => self.handle_text(user_id, &text, membership).await,
        }
    }

    async fn handle_text(
        &self,
        user_id: &str,
        text: &str,
        membership: MembershipRecord,
    ) -> Result<Outcome, GateError> {
        let unlimited = membership.tier == Tier::Unlimited;

        if !unlimited && membership.credit_balance <= 0 {
            info!(user_id, "Rejecting text message, balance exhausted");
            self.log.record(LogEntry::new(
                user_id,
                EventKind::Rejected,
                "insufficient credit",
            ));
            return Ok(Outcome::Rejected(RejectReason::InsufficientCredit));
        }

        // At most one in-flight provider call per conversation.
        let Some(_typing_guard) = self.typing.begin(user_id) else {
            debug!(user_id, "Reply already in flight, rejecting as busy");
            self.log
                .record(LogEntry::new(user_id, EventKind::Rejected, "busy"));
            return Ok(Outcome::Rejected(RejectReason::Busy));
        };

        self.log
            .record(LogEntry::new(user_id, EventKind::MessageIn, text));

        let reply = match self.complete_with_typing(user_id, text).await {
            Ok(reply) => reply,
            Err(detail) => {
                warn!(user_id, detail, "Provider call failed, no credit debited");
                self.log
                    .record(LogEntry::new(user_id, EventKind::Error, &detail));
                return Ok(Outcome::Errored(detail));
            }
        };

        if !unlimited {
            match self.ledger.debit(user_id, 1).await? {
                DebitOutcome::Debited(balance) => {
                    debug!(user_id, balance, "Debited one credit");
                }
                DebitOutcome::Insufficient => {
                    // A concurrent message took the last credit between
                    // our balance check and this debit. The reply is
                    // discarded; nothing was charged.
                    info!(user_id, "Lost the debit race, discarding reply");
                    self.log.record(LogEntry::new(
                        user_id,
                        EventKind::Rejected,
                        "insufficient credit",
                    ));
                    return Ok(Outcome::Rejected(RejectReason::InsufficientCredit));
                }
            }
        }

        self.log
            .record(LogEntry::new(user_id, EventKind::MessageOut, &reply));
        Ok(Outcome::Replied(reply))
    }

    /// Run the provider call under the configured timeout, refreshing
    /// the typing indicator until it resolves either way.
    async fn complete_with_typing(&self, user_id: &str, text: &str) -> Result<String, String> {
        let _ = self.platform.send_typing(user_id).await;

        let call = self.provider.complete(user_id, text);
        tokio::pin!(call);

        let deadline = tokio::time::sleep(self.config.provider_timeout);
        tokio::pin!(deadline);

        let mut refresh = tokio::time::interval(self.config.typing_interval);
        refresh.tick().await; // the first tick fires immediately

        loop {
            tokio::select! {
                result = &mut call => {
                    return result.map_err(|e| e.to_string());
                }
                _ = &mut deadline => {
                    return Err(format!(
                        "provider timed out after {:?}",
                        self.config.provider_timeout
                    ));
                }
                _ = refresh.tick() => {
                    let _ = self.platform.send_typing(user_id).await;
                }
            }
        }
    }
}
