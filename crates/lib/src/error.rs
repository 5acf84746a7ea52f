//! Errors shared by the outbound gateways (Gemini and the WhatsApp Graph API).

/// Failure of an outbound gateway call.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// A required credential or setting is absent. A deployment defect, not a transient failure.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The remote API answered with a non-success status.
    #[error("upstream error {status}: {body}")]
    Upstream { status: u16, body: String },
    /// Transport failure. The URL is stripped: Gemini carries its API key in the query string.
    #[error("request failed: {0}")]
    Request(reqwest::Error),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        GatewayError::Request(e.without_url())
    }
}

impl GatewayError {
    pub fn missing(name: &str) -> Self {
        GatewayError::Configuration(format!("missing {}", name))
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, GatewayError::Configuration(_))
    }

    /// Read status and body from a non-success response.
    pub(crate) async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let body = res.text().await.unwrap_or_default();
        GatewayError::Upstream { status, body }
    }
}
