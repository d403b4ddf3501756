//! Gemini text exchange client over the `generateContent` REST API.

use async_trait::async_trait;

use super::config::GeminiConfig;
use super::messages::{GenerateContentRequest, GenerateContentResponse};
use crate::core::conversation::ProviderRequest;
use crate::core::provider::base::{
    EMPTY_REPLY_FALLBACK, ProviderError, ProviderResult, TextExchange,
};

/// Stateless-per-call text client for the Gemini `generateContent` endpoint.
///
/// Explicitly constructed and injectable; hold one instance for the process
/// and share it behind an `Arc<dyn TextExchange>`.
pub struct GeminiTextClient {
    config: GeminiConfig,
    client: reqwest::Client,
    endpoint: String,
}

impl GeminiTextClient {
    /// Create a new client. Fails if the API key is missing.
    pub fn new(config: GeminiConfig) -> ProviderResult<Self> {
        if config.api_key.is_empty() {
            return Err(ProviderError::AuthenticationFailed(
                "API key is required".to_string(),
            ));
        }
        let endpoint = config.generate_content_url();
        Ok(Self {
            config,
            client: reqwest::Client::new(),
            endpoint,
        })
    }

    /// Override the endpoint URL. Used by tests to point at a local server.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl TextExchange for GeminiTextClient {
    async fn exchange(
        &self,
        request: &ProviderRequest,
        instruction: &str,
    ) -> ProviderResult<String> {
        let body = GenerateContentRequest::from_provider_request(
            request,
            instruction,
            self.config.thinking_budget,
        );

        tracing::debug!(
            turns = request.turns.len(),
            model = %self.config.text_model,
            "sending text exchange"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.config.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::error!(%status, "text exchange failed: {}", detail);
            return Err(ProviderError::Provider(format!("{status}: {detail}")));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Serialization(e.to_string()))?;

        let text = parsed.text();
        if text.is_empty() {
            tracing::warn!("provider returned an empty reply, substituting fallback");
            return Ok(EMPTY_REPLY_FALLBACK.to_string());
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_api_key() {
        let result = GeminiTextClient::new(GeminiConfig::default());
        match result {
            Err(ProviderError::AuthenticationFailed(_)) => {}
            _ => panic!("expected AuthenticationFailed"),
        }
    }

    #[test]
    fn test_endpoint_from_config() {
        let client = GeminiTextClient::new(GeminiConfig {
            api_key: "k".to_string(),
            text_model: "gemini-test".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert!(client.endpoint.contains("models/gemini-test:generateContent"));
    }
}
