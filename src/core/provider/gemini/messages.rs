//! Gemini wire message types.
//!
//! All payloads are JSON with camelCase field names.
//!
//! # Protocol Overview
//!
//! REST (`generateContent`):
//! - request: `contents` (ordered role-tagged turns), `systemInstruction`,
//!   `generationConfig.thinkingConfig.thinkingBudget`
//! - response: `candidates[0].content.parts[].text`
//!
//! Live (`BidiGenerateContent` over WebSocket):
//! - client `setup` - model, AUDIO response modality, voice, system instruction
//! - client `realtimeInput.mediaChunks` - base64 PCM microphone chunks
//! - server `setupComplete` - channel is ready
//! - server `serverContent.modelTurn.parts[0].inlineData.data` - audio payload
//! - server `serverContent.interrupted` - barge-in signal

use serde::{Deserialize, Serialize};

use crate::core::conversation::{Part, ProviderRequest};

// =============================================================================
// Shared content structures
// =============================================================================

/// Inline binary payload: base64 data tagged with a MIME type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// One part of a content turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WirePart {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl WirePart {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }
}

impl From<&Part> for WirePart {
    fn from(part: &Part) -> Self {
        match part {
            Part::Text(text) => WirePart::text(text.clone()),
            Part::InlineData { mime_type, data } => WirePart {
                text: None,
                inline_data: Some(InlineData {
                    mime_type: mime_type.clone(),
                    data: data.clone(),
                }),
            },
        }
    }
}

/// One role-tagged content turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Content {
    pub role: String,
    pub parts: Vec<WirePart>,
}

/// System instruction wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInstruction {
    pub parts: Vec<WirePart>,
}

impl SystemInstruction {
    pub fn from_text(text: &str) -> Self {
        Self {
            parts: vec![WirePart::text(text)],
        }
    }
}

// =============================================================================
// generateContent request/response
// =============================================================================

/// Thinking (reasoning effort) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingConfig {
    pub thinking_budget: i32,
}

/// Generation configuration for text exchanges.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_config: Option<ThinkingConfig>,
}

/// Request body for `generateContent`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub system_instruction: SystemInstruction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

impl GenerateContentRequest {
    /// Build a request body from an assembled provider request.
    pub fn from_provider_request(
        request: &ProviderRequest,
        instruction: &str,
        thinking_budget: i32,
    ) -> Self {
        let contents = request
            .turns
            .iter()
            .map(|turn| Content {
                role: turn.role.as_str().to_string(),
                parts: turn.parts.iter().map(WirePart::from).collect(),
            })
            .collect();

        Self {
            contents,
            system_instruction: SystemInstruction::from_text(instruction),
            generation_config: Some(GenerationConfig {
                thinking_config: Some(ThinkingConfig {
                    thinking_budget,
                }),
            }),
        }
    }
}

/// Response body for `generateContent`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<WirePart>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, if any.
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .concat()
            })
            .unwrap_or_default()
    }
}

// =============================================================================
// Live channel messages
// =============================================================================

/// Client setup frame: first message on a live channel.
#[derive(Debug, Clone, Serialize)]
pub struct SetupMessage {
    pub setup: SetupPayload,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupPayload {
    /// Fully qualified model name, e.g. "models/gemini-..."
    pub model: String,
    pub generation_config: LiveGenerationConfig,
    pub system_instruction: SystemInstruction,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveGenerationConfig {
    pub response_modalities: Vec<String>,
    pub speech_config: SpeechConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

impl SetupMessage {
    pub fn new(model: &str, voice: &str, instruction: &str) -> Self {
        Self {
            setup: SetupPayload {
                model: format!("models/{model}"),
                generation_config: LiveGenerationConfig {
                    response_modalities: vec!["AUDIO".to_string()],
                    speech_config: SpeechConfig {
                        voice_config: VoiceConfig {
                            prebuilt_voice_config: PrebuiltVoiceConfig {
                                voice_name: voice.to_string(),
                            },
                        },
                    },
                },
                system_instruction: SystemInstruction::from_text(instruction),
            },
        }
    }
}

/// Client realtime input frame carrying microphone audio.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInputMessage {
    pub realtime_input: RealtimeInput,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    pub media_chunks: Vec<InlineData>,
}

impl RealtimeInputMessage {
    pub fn audio_chunk(mime_type: &str, data: String) -> Self {
        Self {
            realtime_input: RealtimeInput {
                media_chunks: vec![InlineData {
                    mime_type: mime_type.to_string(),
                    data,
                }],
            },
        }
    }
}

/// Server frame on a live channel.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default)]
    pub setup_complete: Option<serde_json::Value>,
    #[serde(default)]
    pub server_content: Option<ServerContent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default)]
    pub model_turn: Option<ModelTurn>,
    #[serde(default)]
    pub interrupted: Option<bool>,
    #[serde(default)]
    pub turn_complete: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelTurn {
    #[serde(default)]
    pub parts: Vec<WirePart>,
}

impl ServerContent {
    /// The audio payload embedded at its fixed location in the event
    /// structure, if present.
    pub fn audio_payload(&self) -> Option<&str> {
        self.model_turn
            .as_ref()
            .and_then(|turn| turn.parts.first())
            .and_then(|part| part.inline_data.as_ref())
            .map(|inline| inline.data.as_str())
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::conversation::{Role, Turn};

    #[test]
    fn test_generate_content_request_serialization() {
        let request = ProviderRequest {
            turns: vec![Turn {
                role: Role::User,
                parts: vec![
                    Part::InlineData {
                        mime_type: "image/png".into(),
                        data: "QUJD".into(),
                    },
                    Part::Text("what is this?".into()),
                ],
            }],
        };

        let body = GenerateContentRequest::from_provider_request(&request, "be brief", 32_768);
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(
            json["contents"][0]["parts"][0]["inlineData"]["mimeType"],
            "image/png"
        );
        assert_eq!(json["contents"][0]["parts"][1]["text"], "what is this?");
        assert_eq!(
            json["systemInstruction"]["parts"][0]["text"],
            "be brief"
        );
        assert_eq!(
            json["generationConfig"]["thinkingConfig"]["thinkingBudget"],
            32_768
        );
    }

    #[test]
    fn test_response_text_extraction() {
        let json = r#"{
            "candidates": [
                { "content": { "parts": [ { "text": "Step " }, { "text": "one." } ] } }
            ]
        }"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.text(), "Step one.");
    }

    #[test]
    fn test_response_without_candidates_is_empty() {
        let response: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert!(response.text().is_empty());
    }

    #[test]
    fn test_setup_message_shape() {
        let setup = SetupMessage::new("gemini-live-test", "Zephyr", "tutor kindly");
        let json = serde_json::to_value(&setup).unwrap();

        assert_eq!(json["setup"]["model"], "models/gemini-live-test");
        assert_eq!(
            json["setup"]["generationConfig"]["responseModalities"][0],
            "AUDIO"
        );
        assert_eq!(
            json["setup"]["generationConfig"]["speechConfig"]["voiceConfig"]
                ["prebuiltVoiceConfig"]["voiceName"],
            "Zephyr"
        );
        assert_eq!(
            json["setup"]["systemInstruction"]["parts"][0]["text"],
            "tutor kindly"
        );
    }

    #[test]
    fn test_realtime_input_shape() {
        let frame = RealtimeInputMessage::audio_chunk("audio/pcm;rate=16000", "AAAA".into());
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            json["realtimeInput"]["mediaChunks"][0]["mimeType"],
            "audio/pcm;rate=16000"
        );
        assert_eq!(json["realtimeInput"]["mediaChunks"][0]["data"], "AAAA");
    }

    #[test]
    fn test_server_message_audio_extraction() {
        let json = r#"{
            "serverContent": {
                "modelTurn": { "parts": [ { "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": "UENN" } } ] }
            }
        }"#;
        let message: ServerMessage = serde_json::from_str(json).unwrap();
        let content = message.server_content.unwrap();
        assert_eq!(content.audio_payload(), Some("UENN"));
        assert!(!content.is_interrupted());
    }

    #[test]
    fn test_server_message_interrupted() {
        let json = r#"{ "serverContent": { "interrupted": true } }"#;
        let message: ServerMessage = serde_json::from_str(json).unwrap();
        let content = message.server_content.unwrap();
        assert!(content.is_interrupted());
        assert!(content.audio_payload().is_none());
    }

    #[test]
    fn test_setup_complete_frame() {
        let message: ServerMessage = serde_json::from_str(r#"{ "setupComplete": {} }"#).unwrap();
        assert!(message.setup_complete.is_some());
        assert!(message.server_content.is_none());
    }
}
