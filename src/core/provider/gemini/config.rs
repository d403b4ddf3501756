//! Gemini provider configuration and endpoint constants.

use serde::{Deserialize, Serialize};

/// REST endpoint base for `generateContent`.
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// WebSocket endpoint for the bidirectional live API.
pub const GEMINI_LIVE_URL: &str = "wss://generativelanguage.googleapis.com/ws/\
     google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Default text model for tutoring exchanges.
pub const DEFAULT_TEXT_MODEL: &str = "gemini-3-pro-preview";

/// Default native-audio model for live voice sessions.
pub const DEFAULT_LIVE_MODEL: &str = "gemini-2.5-flash-native-audio-preview-09-2025";

/// Default prebuilt voice for spoken replies.
pub const DEFAULT_VOICE: &str = "Zephyr";

/// Default thinking budget (tokens) for complex reasoning on text exchanges.
pub const DEFAULT_THINKING_BUDGET: i32 = 32_768;

/// Default bounded wait for the live channel to signal ready (seconds).
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 15;

/// Configuration for the Gemini text and live clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API key for authentication
    pub api_key: String,

    /// Model for text exchanges
    #[serde(default = "default_text_model")]
    pub text_model: String,

    /// Model for live audio sessions
    #[serde(default = "default_live_model")]
    pub live_model: String,

    /// Prebuilt voice name for spoken replies
    #[serde(default = "default_voice")]
    pub voice: String,

    /// Thinking budget in tokens for text exchanges
    #[serde(default = "default_thinking_budget")]
    pub thinking_budget: i32,

    /// Bounded wait for live channel readiness (seconds)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_text_model() -> String {
    DEFAULT_TEXT_MODEL.to_string()
}

fn default_live_model() -> String {
    DEFAULT_LIVE_MODEL.to_string()
}

fn default_voice() -> String {
    DEFAULT_VOICE.to_string()
}

fn default_thinking_budget() -> i32 {
    DEFAULT_THINKING_BUDGET
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            text_model: default_text_model(),
            live_model: default_live_model(),
            voice: default_voice(),
            thinking_budget: default_thinking_budget(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl GeminiConfig {
    /// Build a config from the environment, honoring a `.env` file.
    ///
    /// Reads `GEMINI_API_KEY` (required) and optional overrides
    /// `TUTOR_TEXT_MODEL`, `TUTOR_LIVE_MODEL`, `TUTOR_VOICE`.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut config = Self {
            api_key: std::env::var("GEMINI_API_KEY").unwrap_or_default(),
            ..Default::default()
        };
        if let Ok(model) = std::env::var("TUTOR_TEXT_MODEL") {
            config.text_model = model;
        }
        if let Ok(model) = std::env::var("TUTOR_LIVE_MODEL") {
            config.live_model = model;
        }
        if let Ok(voice) = std::env::var("TUTOR_VOICE") {
            config.voice = voice;
        }
        config
    }

    /// REST URL for a `generateContent` call against the configured text model.
    pub fn generate_content_url(&self) -> String {
        format!("{}/models/{}:generateContent", GEMINI_API_BASE, self.text_model)
    }

    /// WebSocket URL for the live API, with the key as a query parameter.
    pub fn live_url(&self) -> String {
        format!("{}?key={}", GEMINI_LIVE_URL, self.api_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GeminiConfig::default();
        assert!(config.api_key.is_empty());
        assert_eq!(config.text_model, DEFAULT_TEXT_MODEL);
        assert_eq!(config.live_model, DEFAULT_LIVE_MODEL);
        assert_eq!(config.voice, "Zephyr");
        assert_eq!(config.thinking_budget, 32_768);
    }

    #[test]
    fn test_generate_content_url() {
        let config = GeminiConfig {
            text_model: "gemini-test".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.generate_content_url(),
            format!("{GEMINI_API_BASE}/models/gemini-test:generateContent")
        );
    }

    #[test]
    fn test_live_url_carries_key() {
        let config = GeminiConfig {
            api_key: "k-123".to_string(),
            ..Default::default()
        };
        assert!(config.live_url().ends_with("?key=k-123"));
        assert!(config.live_url().starts_with("wss://"));
    }
}
