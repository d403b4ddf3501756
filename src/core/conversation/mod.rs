//! Conversation domain types and provider-agnostic request assembly.
//!
//! A conversation is an append-only ordered sequence of [`Message`] values.
//! [`assemble_request`] turns that history plus a new user input into a
//! [`ProviderRequest`]: ordered role-tagged turns whose parts follow the
//! binary-before-text ordering some providers require.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Model,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::User => write!(f, "user"),
            Sender::Model => write!(f, "model"),
        }
    }
}

/// An image carried with a message.
///
/// The payload is the canonical attachment wire format throughout the crate:
/// portable base64 text tagged with its image MIME type (a data URI with the
/// prefix stripped). Attachments are immutable and never shared across
/// messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Image format, e.g. "image/png"
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    /// Base64-encoded image bytes
    pub data: String,
}

/// One immutable entry in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Opaque unique id
    pub id: String,
    pub sender: Sender,
    /// May be empty for attachment-only messages
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
    pub timestamp: DateTime<Utc>,
    /// UI hint that this entry is a placeholder while the model thinks
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub thinking: bool,
}

impl Message {
    /// Create a message with a fresh id and the current timestamp.
    pub fn new(sender: Sender, text: impl Into<String>, attachment: Option<Attachment>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender,
            text: text.into(),
            attachment,
            timestamp: Utc::now(),
            thinking: false,
        }
    }
}

/// Role tag on a request turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl From<Sender> for Role {
    fn from(sender: Sender) -> Self {
        match sender {
            Sender::User => Role::User,
            Sender::Model => Role::Model,
        }
    }
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// One part of a turn: inline binary data or text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    /// Binary payload carried as base64 with its MIME type
    InlineData { mime_type: String, data: String },
    Text(String),
}

/// One role-tagged unit of conversation content submitted to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<Part>,
}

/// Provider-agnostic structured request payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderRequest {
    pub turns: Vec<Turn>,
}

/// Assemble a provider request from history plus a new user input.
///
/// Transformation rules:
/// 1. Every prior message becomes one turn in input order, attachment part
///    before text part. A historical message with empty text emits no text
///    part (an empty text part is invalid for most provider protocols).
/// 2. A final `user` turn carries the new attachment (first, if present)
///    followed by the new text. The new text part is always emitted, even
///    when empty: the caller guarantees at least one of text/attachment is
///    non-empty before invoking this function.
/// 3. History is never reordered or dropped.
pub fn assemble_request(
    history: &[Message],
    new_text: &str,
    new_attachment: Option<&Attachment>,
) -> ProviderRequest {
    let mut turns = Vec::with_capacity(history.len() + 1);

    for message in history {
        let mut parts = Vec::new();
        if let Some(attachment) = &message.attachment {
            parts.push(Part::InlineData {
                mime_type: attachment.mime_type.clone(),
                data: attachment.data.clone(),
            });
        }
        if !message.text.is_empty() {
            parts.push(Part::Text(message.text.clone()));
        }
        turns.push(Turn {
            role: message.sender.into(),
            parts,
        });
    }

    let mut new_parts = Vec::new();
    if let Some(attachment) = new_attachment {
        new_parts.push(Part::InlineData {
            mime_type: attachment.mime_type.clone(),
            data: attachment.data.clone(),
        });
    }
    new_parts.push(Part::Text(new_text.to_string()));
    turns.push(Turn {
        role: Role::User,
        parts: new_parts,
    });

    ProviderRequest { turns }
}
