//! WhatsApp Cloud API channel: webhook subscription handshake and text sends via the Graph API.

use crate::channels::delivery::{DeliveryReceipt, MessageDelivery};
use crate::config::{self, Config};
use crate::error::GatewayError;
use async_trait::async_trait;
use reqwest::Url;

/// `hub.mode` value Meta sends when subscribing a webhook.
pub const SUBSCRIBE_MODE: &str = "subscribe";

/// Webhook verification handshake. Returns the challenge to echo back, or None to reject.
/// Succeeds only for the subscribe mode and a non-empty token equal to the configured secret.
pub fn verify_subscription<'a>(
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&'a str>,
    expected_token: Option<&str>,
) -> Option<&'a str> {
    let expected = expected_token.filter(|t| !t.is_empty())?;
    let token = token.filter(|t| !t.is_empty())?;
    if mode == Some(SUBSCRIBE_MODE) && token == expected {
        Some(challenge.unwrap_or(""))
    } else {
        None
    }
}

/// Resolved Graph API settings (config merged with env).
#[derive(Debug, Clone)]
pub struct WhatsAppSettings {
    pub phone_number_id: Option<String>,
    pub access_token: Option<String>,
    pub graph_api_version: String,
    pub graph_api_base: String,
}

impl WhatsAppSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            phone_number_id: config::resolve_phone_number_id(config),
            access_token: config::resolve_access_token(config),
            graph_api_version: config::resolve_graph_api_version(config),
            graph_api_base: config
                .whatsapp
                .graph_api_base
                .trim_end_matches('/')
                .to_string(),
        }
    }
}

/// Graph API client for sending WhatsApp text messages.
#[derive(Clone)]
pub struct WhatsAppClient {
    settings: WhatsAppSettings,
    client: reqwest::Client,
}

impl WhatsAppClient {
    pub fn new(settings: WhatsAppSettings, client: reqwest::Client) -> Self {
        Self { settings, client }
    }

    /// `{base}/{version}/{phone_number_id}/messages`
    fn messages_url(&self, phone_number_id: &str) -> Result<Url, GatewayError> {
        let mut url = Url::parse(&self.settings.graph_api_base).map_err(|e| {
            GatewayError::Configuration(format!(
                "invalid graph api base {}: {}",
                self.settings.graph_api_base, e
            ))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                GatewayError::Configuration(format!(
                    "graph api base cannot have a path: {}",
                    self.settings.graph_api_base
                ))
            })?
            .pop_if_empty()
            .extend([
                self.settings.graph_api_version.as_str(),
                phone_number_id,
                "messages",
            ]);
        Ok(url)
    }

    /// Send a text message to a WhatsApp user (by wa_id / phone number).
    pub async fn send_message(
        &self,
        to: &str,
        text: &str,
    ) -> Result<DeliveryReceipt, GatewayError> {
        let phone_number_id = self
            .settings
            .phone_number_id
            .as_deref()
            .ok_or_else(|| GatewayError::missing("WA_PHONE_NUMBER_ID"))?;
        let token = self
            .settings
            .access_token
            .as_deref()
            .ok_or_else(|| GatewayError::missing("WA_ACCESS_TOKEN"))?;
        let url = self.messages_url(phone_number_id)?;
        let body = serde_json::json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "text",
            "text": { "body": text }
        });
        let res = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(GatewayError::from_response(res).await);
        }
        let raw = res.text().await.unwrap_or_default();
        Ok(DeliveryReceipt::from_response_body(&raw))
    }
}

#[async_trait]
impl MessageDelivery for WhatsAppClient {
    async fn send_text(
        &self,
        recipient_id: &str,
        body: &str,
    ) -> Result<DeliveryReceipt, GatewayError> {
        self.send_message(recipient_id, body).await
    }
}
