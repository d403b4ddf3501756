//! Gemini provider adapters.
//!
//! Concrete implementations of the provider boundary against Google's
//! Generative Language API: [`GeminiTextClient`] for request/response text
//! exchanges and [`GeminiLiveConnector`] for bidirectional audio streaming.

pub mod config;
pub mod live;
pub mod messages;
pub mod text;

pub use config::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_LIVE_MODEL, DEFAULT_TEXT_MODEL, DEFAULT_THINKING_BUDGET,
    DEFAULT_VOICE, GEMINI_API_BASE, GEMINI_LIVE_URL, GeminiConfig,
};
pub use live::GeminiLiveConnector;
pub use text::GeminiTextClient;
