//! Messaging channel: WhatsApp Cloud API webhook payloads and outbound delivery.
//!
//! Inbound webhook bodies are parsed into [`InboundMessage`]s; replies go out through a
//! [`MessageDelivery`] implementation ([`WhatsAppClient`] in production).

mod delivery;
mod inbound;
mod whatsapp;

pub use delivery::{DeliveryReceipt, MessageDelivery};
pub use inbound::{parse_webhook, InboundMessage, MessageKind};
pub use whatsapp::{verify_subscription, WhatsAppClient, WhatsAppSettings, SUBSCRIBE_MODE};
