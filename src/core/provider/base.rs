//! Base traits and types for remote model providers.
//!
//! Two capabilities are abstracted here, matching what the rest of the crate
//! needs from any vendor:
//!
//! - request-in/text-out exchange ([`TextExchange`])
//! - a duplex audio channel ([`LiveConnector`] / [`LiveHandle`])
//!
//! Concrete adapters live in submodules ([`super::gemini`]); everything above
//! this boundary depends only on these traits so providers can be substituted
//! or mocked in tests.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::core::conversation::ProviderRequest;

/// Errors that can occur talking to a remote provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Connection to the provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Provider-reported error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Operation timed out
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Not connected
    #[error("Not connected")]
    NotConnected,
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Fallback reply substituted when the provider succeeds but returns no text.
pub const EMPTY_REPLY_FALLBACK: &str =
    "I'm having trouble thinking about that right now. Could you try rephrasing?";

/// Model-role message the UI appends when an exchange fails. The user's own
/// outbound message stays in history; no rollback is performed.
pub const ERROR_REPLY: &str =
    "I'm sorry, I ran into a problem answering that. Your message is still here, \
     so please try again in a moment.";

/// Request-in/text-out capability of a remote model.
///
/// # Contract
///
/// Transport and provider failures propagate to the caller unchanged: no
/// retry, no silent fallback. A successful exchange with an empty textual
/// answer returns [`EMPTY_REPLY_FALLBACK`] instead of an empty string.
#[async_trait]
pub trait TextExchange: Send + Sync {
    /// Send an assembled request plus composed instruction, returning the
    /// model's textual reply.
    async fn exchange(
        &self,
        request: &ProviderRequest,
        instruction: &str,
    ) -> ProviderResult<String>;
}

/// Inbound server event from a live duplex channel.
#[derive(Debug, Clone)]
pub enum LiveEvent {
    /// Transport-encoded audio payload from the model's spoken turn
    Audio(String),
    /// The model's turn was cut off by new user speech (barge-in)
    Interrupted,
    /// The channel closed or errored; no further events will arrive
    Closed { reason: Option<String> },
}

/// Outbound half of an open duplex channel.
#[async_trait]
pub trait LiveHandle: Send + Sync {
    /// Send one transport-encoded realtime audio input chunk.
    ///
    /// Fire-and-forget per block: back-pressure is the transport's concern
    /// and no local queue of un-sent blocks is kept above this call.
    async fn send_audio_chunk(&self, encoded: String) -> ProviderResult<()>;

    /// Close the channel. Idempotent.
    async fn close(&self);
}

/// Boxed trait object for the outbound channel half.
pub type BoxedLiveHandle = Box<dyn LiveHandle>;

/// Capability to open a duplex audio channel to a remote model.
#[async_trait]
pub trait LiveConnector: Send + Sync {
    /// Open a duplex channel with `instruction` as the session's fixed system
    /// behavior. Resolves once the remote side signals ready; inbound events
    /// arrive on the returned receiver until a [`LiveEvent::Closed`].
    ///
    /// The instruction is not updatable for the channel's lifetime; changing
    /// it requires tearing down and reconnecting.
    async fn connect(
        &self,
        instruction: &str,
    ) -> ProviderResult<(BoxedLiveHandle, mpsc::Receiver<LiveEvent>)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProviderError::ConnectionFailed("refused".to_string());
        assert!(err.to_string().contains("Connection failed"));

        let err = ProviderError::NotConnected;
        assert_eq!(err.to_string(), "Not connected");
    }

    #[test]
    fn test_fixed_reply_strings_non_empty() {
        assert!(!EMPTY_REPLY_FALLBACK.is_empty());
        assert!(!ERROR_REPLY.is_empty());
        assert_ne!(EMPTY_REPLY_FALLBACK, ERROR_REPLY);
    }
}
