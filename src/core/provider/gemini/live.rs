//! Gemini live duplex channel over the `BidiGenerateContent` WebSocket API.
//!
//! Connection sequence: open the WebSocket, send the `setup` frame carrying
//! the session's fixed system instruction, then wait (bounded) for the
//! server's `setupComplete`. After that the channel is ready: microphone
//! chunks go out as `realtimeInput` frames and server events are surfaced as
//! [`LiveEvent`]s on an mpsc receiver until the channel closes.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use super::config::GeminiConfig;
use super::messages::{RealtimeInputMessage, ServerMessage, SetupMessage};
use crate::core::audio::INPUT_AUDIO_MIME;
use crate::core::provider::base::{
    BoxedLiveHandle, LiveConnector, LiveEvent, LiveHandle, ProviderError, ProviderResult,
};

/// Channel capacity for outbound audio frames and inbound events.
const CHANNEL_CAPACITY: usize = 256;

/// Outbound instruction for the channel task.
enum OutboundFrame {
    Audio(String),
    Close,
}

/// Connector for Gemini live audio sessions.
pub struct GeminiLiveConnector {
    config: GeminiConfig,
    url: String,
}

impl GeminiLiveConnector {
    /// Create a new connector. Fails if the API key is missing.
    pub fn new(config: GeminiConfig) -> ProviderResult<Self> {
        if config.api_key.is_empty() {
            return Err(ProviderError::AuthenticationFailed(
                "API key is required".to_string(),
            ));
        }
        let url = config.live_url();
        Ok(Self { config, url })
    }

    /// Override the WebSocket URL. Used by tests to point at a local server.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

/// Outbound half of an open Gemini live channel.
struct GeminiLiveHandle {
    tx: mpsc::Sender<OutboundFrame>,
}

#[async_trait]
impl LiveHandle for GeminiLiveHandle {
    async fn send_audio_chunk(&self, encoded: String) -> ProviderResult<()> {
        self.tx
            .send(OutboundFrame::Audio(encoded))
            .await
            .map_err(|_| ProviderError::NotConnected)
    }

    async fn close(&self) {
        // A send failure means the channel task already ended.
        let _ = self.tx.send(OutboundFrame::Close).await;
    }
}

#[async_trait]
impl LiveConnector for GeminiLiveConnector {
    async fn connect(
        &self,
        instruction: &str,
    ) -> ProviderResult<(BoxedLiveHandle, mpsc::Receiver<LiveEvent>)> {
        let url = url::Url::parse(&self.url)
            .map_err(|e| ProviderError::ConnectionFailed(format!("invalid endpoint: {e}")))?;
        let timeout = Duration::from_secs(self.config.connect_timeout_secs);
        let setup = SetupMessage::new(&self.config.live_model, &self.config.voice, instruction);

        // Bounded wait covers the socket open, the setup frame, and the
        // server's ready signal. A hung attempt becomes a Timeout error.
        let ws_stream = tokio::time::timeout(timeout, async {
            let (mut ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
                .await
                .map_err(|e| ProviderError::ConnectionFailed(e.to_string()))?;

            let json = serde_json::to_string(&setup)
                .map_err(|e| ProviderError::Serialization(e.to_string()))?;
            ws_stream
                .send(Message::Text(json.into()))
                .await
                .map_err(|e| ProviderError::WebSocket(e.to_string()))?;

            // Drain frames until setupComplete.
            loop {
                match ws_stream.next().await {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ServerMessage>(&text) {
                            Ok(message) if message.setup_complete.is_some() => {
                                return Ok(ws_stream);
                            }
                            Ok(_) => continue,
                            Err(e) => {
                                tracing::warn!("unparseable frame during setup: {}", e);
                                continue;
                            }
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        return Err(ProviderError::ConnectionFailed(format!(
                            "channel closed during setup: {frame:?}"
                        )));
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        return Err(ProviderError::WebSocket(e.to_string()));
                    }
                    None => {
                        return Err(ProviderError::ConnectionFailed(
                            "channel ended during setup".to_string(),
                        ));
                    }
                }
            }
        })
        .await
        .map_err(|_| {
            ProviderError::Timeout(format!(
                "live channel not ready within {}s",
                self.config.connect_timeout_secs
            ))
        })??;

        tracing::info!(model = %self.config.live_model, "live channel ready");

        let (mut ws_sink, mut ws_stream) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::channel::<OutboundFrame>(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel::<LiveEvent>(CHANNEL_CAPACITY);

        tokio::spawn(async move {
            let close_reason: Option<String> = loop {
                tokio::select! {
                    Some(frame) = out_rx.recv() => {
                        match frame {
                            OutboundFrame::Audio(encoded) => {
                                let message =
                                    RealtimeInputMessage::audio_chunk(INPUT_AUDIO_MIME, encoded);
                                let json = match serde_json::to_string(&message) {
                                    Ok(j) => j,
                                    Err(e) => {
                                        tracing::error!("failed to serialize audio frame: {}", e);
                                        continue;
                                    }
                                };
                                if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                                    break Some(e.to_string());
                                }
                            }
                            OutboundFrame::Close => {
                                let _ = ws_sink.send(Message::Close(None)).await;
                                break None;
                            }
                        }
                    }

                    Some(msg) = ws_stream.next() => {
                        match msg {
                            Ok(Message::Text(text)) => {
                                let message = match serde_json::from_str::<ServerMessage>(&text) {
                                    Ok(m) => m,
                                    Err(e) => {
                                        tracing::warn!("unparseable server frame: {}", e);
                                        continue;
                                    }
                                };
                                if let Some(content) = message.server_content {
                                    // Audio before interruption: a frame that
                                    // carries both must net out to silence, so
                                    // the barge-in stop covers its own payload.
                                    if let Some(audio) = content.audio_payload()
                                        && event_tx
                                            .send(LiveEvent::Audio(audio.to_string()))
                                            .await
                                            .is_err()
                                    {
                                        break None;
                                    }
                                    if content.is_interrupted()
                                        && event_tx.send(LiveEvent::Interrupted).await.is_err()
                                    {
                                        break None;
                                    }
                                }
                            }
                            Ok(Message::Close(frame)) => {
                                tracing::info!("live channel closed by server");
                                break frame.map(|f| f.reason.to_string());
                            }
                            Ok(Message::Ping(data)) => {
                                if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                    break Some(e.to_string());
                                }
                            }
                            Ok(_) => {}
                            Err(e) => {
                                tracing::error!("live channel error: {}", e);
                                break Some(e.to_string());
                            }
                        }
                    }

                    else => break None,
                }
            };

            let _ = event_tx
                .send(LiveEvent::Closed {
                    reason: close_reason,
                })
                .await;
            tracing::debug!("live channel task ended");
        });

        Ok((Box::new(GeminiLiveHandle { tx: out_tx }), event_rx))
    }
}
