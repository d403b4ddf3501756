pub mod audio;
pub mod conversation;
pub mod history;
pub mod persona;
pub mod provider;
pub mod session;

// Re-export commonly used types for convenience
pub use audio::{
    AudioCodecError, AudioCodecResult, CAPTURE_BLOCK_SIZE, CAPTURE_SAMPLE_RATE, INPUT_AUDIO_MIME,
    PLAYBACK_SAMPLE_RATE, decode_from_transport, encode_for_transport, playback_duration_secs,
};

pub use conversation::{
    Attachment, Message, Part, ProviderRequest, Role, Sender, Turn, assemble_request,
};

pub use history::{HistoryError, HistoryResult, HistoryStore, WELCOME_MESSAGE};

pub use persona::{BASE_PERSONA, ComplexityLevel, InteractionMode, compose_instruction};

pub use provider::{
    BoxedLiveHandle, EMPTY_REPLY_FALLBACK, ERROR_REPLY, LiveConnector, LiveEvent, LiveHandle,
    ProviderError, ProviderResult, TextExchange,
};

pub use session::{
    CaptureDevice, CpalDeviceFactory, DeviceError, DeviceFactory, DeviceResult, DisconnectCallback,
    LiveAudioSession, PlaybackDevice, PlaybackScheduler, SessionError, SessionResult, SessionState,
};
