pub mod core;

// Re-export commonly used items for convenience
pub use core::audio::{decode_from_transport, encode_for_transport};
pub use core::conversation::{Attachment, Message, ProviderRequest, Sender, assemble_request};
pub use core::history::HistoryStore;
pub use core::persona::{ComplexityLevel, InteractionMode, compose_instruction};
pub use core::provider::gemini::{GeminiConfig, GeminiLiveConnector, GeminiTextClient};
pub use core::provider::{LiveConnector, LiveEvent, ProviderError, TextExchange};
pub use core::session::{CpalDeviceFactory, LiveAudioSession, SessionError, SessionState};
