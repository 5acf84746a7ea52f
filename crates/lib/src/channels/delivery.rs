//! Outbound delivery: send one text message to one recipient.

use crate::error::GatewayError;
use async_trait::async_trait;
use serde::Deserialize;

/// Ids the platform assigned to a sent message (may be empty).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub message_ids: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

impl DeliveryReceipt {
    /// Parse a Graph API send response (`{"messages":[{"id":..}]}`). Anything else gives an empty receipt.
    pub fn from_response_body(body: &str) -> Self {
        let parsed: SendResponse = serde_json::from_str(body).unwrap_or_default();
        Self {
            message_ids: parsed.messages.into_iter().map(|m| m.id).collect(),
        }
    }
}

/// Sends text to a chat. No retry and no batching: one message per call.
#[async_trait]
pub trait MessageDelivery: Send + Sync {
    async fn send_text(&self, recipient_id: &str, body: &str)
        -> Result<DeliveryReceipt, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipt_reads_message_ids() {
        let r = DeliveryReceipt::from_response_body(
            r#"{"messaging_product":"whatsapp","contacts":[{"input":"62811","wa_id":"62811"}],"messages":[{"id":"wamid.out"}]}"#,
        );
        assert_eq!(r.message_ids, vec!["wamid.out".to_string()]);
    }

    #[test]
    fn receipt_tolerates_unexpected_bodies() {
        assert_eq!(DeliveryReceipt::from_response_body(""), DeliveryReceipt::default());
        assert_eq!(DeliveryReceipt::from_response_body("{}"), DeliveryReceipt::default());
        assert_eq!(DeliveryReceipt::from_response_body("[1,2]"), DeliveryReceipt::default());
    }
}
