//! Webhook handler: dedupe each inbound message, ask the model, send the reply.
//!
//! Failures never escape: every message ends in a [`MessageOutcome`] and the caller always
//! acknowledges the delivery with 200, so WhatsApp never redelivers because of our errors.

use crate::channels::{parse_webhook, DeliveryReceipt, InboundMessage, MessageDelivery};
use crate::dedupe::DedupeCache;
use crate::error::GatewayError;
use crate::llm::InferenceGateway;
use std::sync::Arc;

/// Why a message was skipped without calling any gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    MissingSender,
    EmptyText,
}

/// Result of handling one inbound message.
#[derive(Debug)]
pub enum MessageOutcome {
    /// Seen within the dedupe window; nothing was called.
    Duplicate,
    Ignored(IgnoreReason),
    Replied(DeliveryReceipt),
    /// Inference failed; delivery was not attempted.
    InferenceFailed(GatewayError),
    DeliveryFailed(GatewayError),
}

impl MessageOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            MessageOutcome::InferenceFailed(_) | MessageOutcome::DeliveryFailed(_)
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            MessageOutcome::Duplicate => "duplicate",
            MessageOutcome::Ignored(_) => "ignored",
            MessageOutcome::Replied(_) => "replied",
            MessageOutcome::InferenceFailed(_) => "inference_failed",
            MessageOutcome::DeliveryFailed(_) => "delivery_failed",
        }
    }
}

/// Outcomes for one webhook delivery, in message order. Empty when the payload held no message.
#[derive(Debug, Default)]
pub struct WebhookReport {
    pub outcomes: Vec<(Option<String>, MessageOutcome)>,
}

impl WebhookReport {
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_failure()).count()
    }

    /// e.g. "replied=1 duplicate=1"
    pub fn summary(&self) -> String {
        let mut counts: Vec<(&'static str, usize)> = Vec::new();
        for (_, o) in &self.outcomes {
            match counts.iter_mut().find(|(l, _)| *l == o.label()) {
                Some((_, n)) => *n += 1,
                None => counts.push((o.label(), 1)),
            }
        }
        counts
            .iter()
            .map(|(l, n)| format!("{}={}", l, n))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Orchestrates one webhook delivery. Shared by all requests; the dedupe cache is the only mutable state.
pub struct WebhookHandler {
    dedupe: Arc<DedupeCache>,
    inference: Arc<dyn InferenceGateway>,
    delivery: Arc<dyn MessageDelivery>,
    /// Prompt for non-text messages; `{kind}` is replaced by the message type.
    unsupported_notice: String,
}

impl WebhookHandler {
    pub fn new(
        dedupe: Arc<DedupeCache>,
        inference: Arc<dyn InferenceGateway>,
        delivery: Arc<dyn MessageDelivery>,
        unsupported_notice: impl Into<String>,
    ) -> Self {
        Self {
            dedupe,
            inference,
            delivery,
            unsupported_notice: unsupported_notice.into(),
        }
    }

    pub fn dedupe(&self) -> &DedupeCache {
        &self.dedupe
    }

    /// Handle a raw webhook body. Malformed bodies produce an empty report.
    pub async fn handle_body(&self, body: &[u8]) -> WebhookReport {
        self.handle_messages(parse_webhook(body)).await
    }

    /// Handle every message of a delivery sequentially.
    pub async fn handle_messages(&self, messages: Vec<InboundMessage>) -> WebhookReport {
        let mut report = WebhookReport::default();
        for msg in messages {
            let outcome = self.handle_message(&msg).await;
            report.outcomes.push((msg.id, outcome));
        }
        report
    }

    /// Dedupe, then infer, then deliver. Delivery only starts after inference succeeded.
    pub async fn handle_message(&self, msg: &InboundMessage) -> MessageOutcome {
        let id = msg.id.as_deref();
        if self.dedupe.is_duplicate(id) {
            log::debug!("webhook: duplicate message {}", id.unwrap_or("-"));
            return MessageOutcome::Duplicate;
        }
        let prompt = msg.prompt_text(&self.unsupported_notice);
        let Some(from) = msg.sender_id.as_deref() else {
            return MessageOutcome::Ignored(IgnoreReason::MissingSender);
        };
        if prompt.trim().is_empty() {
            return MessageOutcome::Ignored(IgnoreReason::EmptyText);
        }

        let reply = match self.inference.generate_reply(&prompt).await {
            Ok(r) => r,
            Err(e) => {
                log_failure("inference", id, &e);
                return MessageOutcome::InferenceFailed(e);
            }
        };
        match self.delivery.send_text(from, &reply).await {
            Ok(receipt) => {
                log::info!("webhook: replied to message {}", id.unwrap_or("-"));
                MessageOutcome::Replied(receipt)
            }
            Err(e) => {
                log_failure("delivery", id, &e);
                MessageOutcome::DeliveryFailed(e)
            }
        }
    }
}

fn log_failure(stage: &str, id: Option<&str>, e: &GatewayError) {
    let id = id.unwrap_or("-");
    if e.is_configuration() {
        log::error!("webhook: {} failed for message {}: {}", stage, id, e);
    } else {
        log::warn!("webhook: {} failed for message {}: {}", stage, id, e);
    }
}
