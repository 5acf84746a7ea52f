//! Gemini API client (https://generativelanguage.googleapis.com by default).
//! Non-streaming `generateContent` only; one user turn per call, no history.

use super::InferenceGateway;
use crate::config::{self, Config};
use crate::error::GatewayError;
use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Resolved Gemini settings (config merged with env).
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub base_url: String,
    pub fallback_reply: String,
}

impl GeminiSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            api_key: config::resolve_gemini_api_key(config),
            model: config::resolve_gemini_model(config),
            temperature: config.gemini.temperature,
            max_output_tokens: config.gemini.max_output_tokens,
            base_url: config.gemini.base_url.trim_end_matches('/').to_string(),
            fallback_reply: config.gemini.fallback_reply.clone(),
        }
    }
}

/// Client for the Gemini HTTP API.
#[derive(Clone)]
pub struct GeminiClient {
    settings: GeminiSettings,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(settings: GeminiSettings, client: reqwest::Client) -> Self {
        Self { settings, client }
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    /// `{base}/v1beta/models/{model}:generateContent`
    fn endpoint(&self) -> Result<Url, GatewayError> {
        let mut url = Url::parse(&self.settings.base_url).map_err(|e| {
            GatewayError::Configuration(format!(
                "invalid gemini base url {}: {}",
                self.settings.base_url, e
            ))
        })?;
        let action = format!("{}:generateContent", self.settings.model);
        url.path_segments_mut()
            .map_err(|_| {
                GatewayError::Configuration(format!(
                    "gemini base url cannot have a path: {}",
                    self.settings.base_url
                ))
            })?
            .pop_if_empty()
            .extend(["v1beta", "models", action.as_str()]);
        Ok(url)
    }

    /// POST generateContent — returns the concatenated reply text, or the fallback reply when empty.
    pub async fn generate(&self, prompt: &str) -> Result<String, GatewayError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or_else(|| GatewayError::missing("GEMINI_API_KEY"))?;
        let url = self.endpoint()?;
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.settings.temperature,
                max_output_tokens: self.settings.max_output_tokens,
            },
        };
        let res = self
            .client
            .post(url)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(GatewayError::from_response(res).await);
        }
        let raw = res.text().await?;
        let reply = match serde_json::from_str::<GenerateContentResponse>(&raw) {
            Ok(data) => data.reply_text(),
            Err(e) => {
                log::warn!("gemini: unparseable response: {}", e);
                None
            }
        };
        Ok(reply.unwrap_or_else(|| {
            log::debug!("gemini: empty reply, using fallback");
            self.settings.fallback_reply.clone()
        }))
    }
}

#[async_trait]
impl InferenceGateway for GeminiClient {
    async fn generate_reply(&self, prompt: &str) -> Result<String, GatewayError> {
        self.generate(prompt).await
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

/// generateContent response; only the fields we read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Text parts of the first candidate joined and trimmed. None when nothing usable came back.
    pub fn reply_text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let joined: String = parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .filter(|t| !t.is_empty())
            .collect();
        let trimmed = joined.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}
