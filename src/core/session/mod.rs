//! Real-time voice session engine.
//!
//! Composes the pieces of a live conversation: microphone capture through
//! [`device`], transport framing through [`crate::core::audio`], the duplex
//! channel behind [`crate::core::provider::LiveConnector`], and gapless timed
//! output through [`playback`]. [`LiveAudioSession`] is the entry point.

pub mod device;
pub mod live;
pub mod playback;

pub use device::{
    CaptureDevice, CpalCapture, CpalDeviceFactory, CpalPlayback, DeviceError, DeviceFactory,
    DeviceResult, MockCapture, MockDeviceFactory, MockPlayback, MockPlaybackState, PlaybackDevice,
    PlayedUnit,
};
pub use live::{DisconnectCallback, LiveAudioSession, SessionError, SessionResult, SessionState};
pub use playback::{PlaybackScheduler, ScheduledUnit};
