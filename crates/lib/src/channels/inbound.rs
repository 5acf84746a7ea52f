//! Inbound messages parsed from a WhatsApp webhook delivery.
//!
//! Envelope shape: `{entry: [{changes: [{value: {messages: [{id, from, type, text?: {body}}]}}]}]}`.
//! Every level is optional; status-only callbacks simply carry no messages.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
pub struct WhatsAppMessage {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default, rename = "type")]
    pub typ: Option<String>,
    #[serde(default)]
    pub text: Option<TextBody>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TextBody {
    #[serde(default)]
    pub body: Option<String>,
}

/// Message objects in delivery order, across every entry and change.
/// Levels that are missing or not arrays contribute nothing.
fn message_values(root: &Value) -> impl Iterator<Item = &Value> {
    root.get("entry")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|e| e.get("changes").and_then(Value::as_array))
        .flatten()
        .filter_map(|c| c.get("value"))
        .filter_map(|v| v.get("messages").and_then(Value::as_array))
        .flatten()
}

/// Kind of an inbound message. Only text is answered as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    /// Any other WhatsApp type (image, audio, sticker, ...), by name.
    Other(String),
}

impl MessageKind {
    fn from_type(typ: Option<&str>) -> Self {
        match typ.map(str::trim).filter(|t| !t.is_empty()) {
            Some("text") => MessageKind::Text,
            Some(other) => MessageKind::Other(other.to_string()),
            None => MessageKind::Other("unknown".to_string()),
        }
    }
}

/// One message from the webhook, ready for dedupe and reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub id: Option<String>,
    pub sender_id: Option<String>,
    pub kind: MessageKind,
    pub text_body: Option<String>,
}

impl From<WhatsAppMessage> for InboundMessage {
    fn from(m: WhatsAppMessage) -> Self {
        let kind = MessageKind::from_type(m.typ.as_deref());
        let text_body = match kind {
            MessageKind::Text => m.text.and_then(|t| t.body),
            MessageKind::Other(_) => None,
        };
        Self {
            id: m.id,
            sender_id: m.from.filter(|f| !f.trim().is_empty()),
            kind,
            text_body,
        }
    }
}

impl InboundMessage {
    /// Text to send to the model: the body for text messages, otherwise `notice_template`
    /// with `{kind}` replaced by the message type.
    pub fn prompt_text(&self, notice_template: &str) -> String {
        match &self.kind {
            MessageKind::Text => self.text_body.clone().unwrap_or_default(),
            MessageKind::Other(kind) => notice_template.replace("{kind}", kind),
        }
    }
}

/// Parse a webhook body into its messages. A body that is not JSON yields no messages;
/// a badly shaped message is skipped without affecting its siblings.
pub fn parse_webhook(body: &[u8]) -> Vec<InboundMessage> {
    let root: Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            log::debug!("webhook: malformed payload ignored: {}", e);
            return Vec::new();
        }
    };
    message_values(&root)
        .filter_map(|v| match WhatsAppMessage::deserialize(v) {
            Ok(m) => Some(InboundMessage::from(m)),
            Err(e) => {
                log::debug!("webhook: skipping malformed message: {}", e);
                None
            }
        })
        .collect()
}
