//! Live audio session state machine.
//!
//! A [`LiveAudioSession`] bridges microphone capture, the duplex channel to
//! the remote model, and timed speaker playback. Lifecycle:
//!
//! ```text
//! Idle -> Connecting -> Open -> Closed (terminal)
//! ```
//!
//! While `Open`, two tasks run continuously: the capture loop (block ->
//! encode -> send) and the inbound loop (decode -> schedule, or silence on
//! barge-in). `disconnect()` is idempotent from any state and always leaves
//! the session fully silent with all devices released.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::device::{DeviceError, DeviceFactory, PlaybackDevice};
use super::playback::PlaybackScheduler;
use crate::core::audio;
use crate::core::provider::{LiveConnector, LiveEvent, LiveHandle, ProviderError};

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Open,
    /// Terminal
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Connecting => write!(f, "Connecting"),
            SessionState::Open => write!(f, "Open"),
            SessionState::Closed => write!(f, "Closed"),
        }
    }
}

/// Errors from driving a live session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Operation not valid in the current state
    #[error("Invalid session state: {0}")]
    InvalidState(SessionState),

    /// Device acquisition or stream failure
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Duplex channel failure
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Callback invoked exactly once when the session ends for a reason other
/// than a local `disconnect()` call: remote close, channel error, device
/// denial, or a protocol-level decode failure.
pub type DisconnectCallback =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Stateful controller for one real-time voice session.
///
/// Exactly one instance should be active per UI surface; the embedder holds
/// the session for its lifetime and calls [`disconnect`](Self::disconnect)
/// on user action or after the disconnect callback fires.
pub struct LiveAudioSession {
    connector: Arc<dyn LiveConnector>,
    devices: Arc<dyn DeviceFactory>,
    /// Fixed system behavior for the whole session; changing mode or
    /// complexity requires tearing down and reconnecting.
    instruction: String,
    state: Arc<Mutex<SessionState>>,
    scheduler: Arc<Mutex<PlaybackScheduler>>,
    playback: Arc<Mutex<Option<Box<dyn PlaybackDevice>>>>,
    handle: Option<Arc<dyn LiveHandle>>,
    capture_task: Option<JoinHandle<()>>,
    inbound_task: Option<JoinHandle<()>>,
    shutdown: CancellationToken,
    on_disconnect: DisconnectCallback,
    callback_fired: Arc<AtomicBool>,
    intentional_disconnect: Arc<AtomicBool>,
}

impl LiveAudioSession {
    /// Create a session in the `Idle` state. Nothing is acquired until
    /// [`connect`](Self::connect).
    pub fn new(
        connector: Arc<dyn LiveConnector>,
        devices: Arc<dyn DeviceFactory>,
        instruction: impl Into<String>,
        on_disconnect: DisconnectCallback,
    ) -> Self {
        Self {
            connector,
            devices,
            instruction: instruction.into(),
            state: Arc::new(Mutex::new(SessionState::Idle)),
            scheduler: Arc::new(Mutex::new(PlaybackScheduler::new())),
            playback: Arc::new(Mutex::new(None)),
            handle: None,
            capture_task: None,
            inbound_task: None,
            shutdown: CancellationToken::new(),
            on_disconnect,
            callback_fired: Arc::new(AtomicBool::new(false)),
            intentional_disconnect: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Seconds at which the next playback unit would schedule at clock zero.
    /// Exposed for tests and diagnostics.
    pub fn next_start_time(&self) -> f64 {
        self.scheduler.lock().next_start_time()
    }

    /// Number of scheduled-but-unfinished playback units.
    pub fn active_playback_units(&self) -> usize {
        self.scheduler.lock().active_count()
    }

    /// Acquire devices, open the duplex channel, and start streaming.
    ///
    /// Valid only from `Idle`. Microphone denial is fatal to this session
    /// and propagates as [`DeviceError::PermissionDenied`]; any failure
    /// before the channel is ready fires the disconnect callback, leaves the
    /// session `Closed`, and never reaches `Open`. Capture starts only after
    /// the channel signals ready, so no audio block can race the handshake.
    pub async fn connect(&mut self) -> SessionResult<()> {
        {
            let mut state = self.state.lock();
            if *state != SessionState::Idle {
                return Err(SessionError::InvalidState(*state));
            }
            *state = SessionState::Connecting;
        }
        tracing::info!("live session connecting");

        let playback = match self.devices.open_playback() {
            Ok(playback) => playback,
            Err(e) => {
                tracing::error!("playback acquisition failed: {}", e);
                self.abort_connect().await;
                return Err(e.into());
            }
        };

        let (handle, events) = match self.connector.connect(&self.instruction).await {
            Ok(connected) => connected,
            Err(e) => {
                tracing::error!("live channel open failed: {}", e);
                self.abort_connect().await;
                return Err(e.into());
            }
        };
        let handle: Arc<dyn LiveHandle> = Arc::from(handle);

        // The microphone is acquired only once the channel is ready, so no
        // captured block can predate the handshake.
        let capture = match self.devices.open_capture() {
            Ok(capture) => capture,
            Err(e) => {
                tracing::error!("microphone acquisition failed: {}", e);
                handle.close().await;
                self.abort_connect().await;
                return Err(e.into());
            }
        };

        *self.playback.lock() = Some(playback);
        self.handle = Some(handle.clone());
        *self.state.lock() = SessionState::Open;
        tracing::info!("live session open");

        self.capture_task = Some(spawn_capture_loop(
            capture,
            handle,
            self.shutdown.clone(),
        ));
        self.inbound_task = Some(spawn_inbound_loop(
            events,
            self.scheduler.clone(),
            self.playback.clone(),
            self.intentional_disconnect.clone(),
            self.callback_fired.clone(),
            self.on_disconnect.clone(),
        ));

        Ok(())
    }

    /// Tear everything down. Idempotent; safe from any state, including when
    /// `connect()` never completed. Awaits the channel close, stops and
    /// releases the microphone, closes both device contexts, and force-stops
    /// any still-scheduled playback.
    pub async fn disconnect(&mut self) {
        self.intentional_disconnect.store(true, Ordering::SeqCst);
        *self.state.lock() = SessionState::Closed;

        if let Some(handle) = self.handle.take() {
            handle.close().await;
        }

        self.shutdown.cancel();
        if let Some(task) = self.capture_task.take() {
            let _ = task.await;
        }
        if let Some(task) = self.inbound_task.take() {
            task.abort();
        }

        self.scheduler.lock().interrupt();
        if let Some(mut playback) = self.playback.lock().take() {
            playback.stop_all();
            playback.close();
        }
        tracing::info!("live session disconnected");
    }

    /// Connect-path failure: close out and notify, without ever reaching
    /// `Open`.
    async fn abort_connect(&mut self) {
        *self.state.lock() = SessionState::Closed;
        if let Some(mut playback) = self.playback.lock().take() {
            playback.stop_all();
            playback.close();
        }
        fire_disconnect(&self.callback_fired, &self.on_disconnect).await;
    }
}

async fn fire_disconnect(fired: &AtomicBool, callback: &DisconnectCallback) {
    if !fired.swap(true, Ordering::SeqCst) {
        callback().await;
    }
}

/// Capture loop: fixed-size block -> transport encoding -> duplex channel,
/// fire-and-forget per block. No local queue of un-sent blocks.
fn spawn_capture_loop(
    mut capture: Box<dyn super::device::CaptureDevice>,
    handle: Arc<dyn LiveHandle>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    capture.stop();
                    break;
                }
                block = capture.next_block() => {
                    match block {
                        Some(samples) => {
                            let encoded = audio::encode_for_transport(&samples);
                            if let Err(e) = handle.send_audio_chunk(encoded).await {
                                tracing::debug!("capture block dropped: {}", e);
                            }
                        }
                        None => break,
                    }
                }
            }
        }
        tracing::debug!("capture loop ended");
    })
}

/// Inbound loop: schedule audio payloads gaplessly, silence on barge-in,
/// surface remote close/error through the disconnect callback.
fn spawn_inbound_loop(
    mut events: tokio::sync::mpsc::Receiver<LiveEvent>,
    scheduler: Arc<Mutex<PlaybackScheduler>>,
    playback: Arc<Mutex<Option<Box<dyn PlaybackDevice>>>>,
    intentional: Arc<AtomicBool>,
    callback_fired: Arc<AtomicBool>,
    on_disconnect: DisconnectCallback,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                LiveEvent::Audio(payload) => {
                    let samples = match audio::decode_from_transport(&payload) {
                        Ok(samples) => samples,
                        Err(e) => {
                            // Protocol mismatch, not a transient condition.
                            tracing::error!("audio payload decode failed: {}", e);
                            fire_disconnect(&callback_fired, &on_disconnect).await;
                            break;
                        }
                    };
                    if samples.is_empty() {
                        continue;
                    }
                    let duration = audio::playback_duration_secs(samples.len());

                    let mut playback_guard = playback.lock();
                    if let Some(device) = playback_guard.as_mut() {
                        let mut scheduler = scheduler.lock();
                        for id in device.take_finished() {
                            scheduler.finish(id);
                        }
                        let unit = scheduler.schedule(duration, device.current_time());
                        device.play_at(unit.id, samples, unit.start_time);
                        tracing::trace!(
                            id = unit.id,
                            start = unit.start_time,
                            duration,
                            "scheduled playback unit"
                        );
                    }
                }

                LiveEvent::Interrupted => {
                    tracing::debug!("barge-in: silencing model output");
                    let mut playback_guard = playback.lock();
                    scheduler.lock().interrupt();
                    if let Some(device) = playback_guard.as_mut() {
                        device.stop_all();
                    }
                }

                LiveEvent::Closed { reason } => {
                    if !intentional.load(Ordering::SeqCst) {
                        tracing::warn!(?reason, "live channel closed remotely");
                        fire_disconnect(&callback_fired, &on_disconnect).await;
                    }
                    break;
                }
            }
        }
        tracing::debug!("inbound loop ended");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::provider::{BoxedLiveHandle, ProviderResult};
    use crate::core::session::device::{MockCapture, MockDeviceFactory, MockPlayback};
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    struct RefusingConnector;

    #[async_trait]
    impl LiveConnector for RefusingConnector {
        async fn connect(
            &self,
            _instruction: &str,
        ) -> ProviderResult<(BoxedLiveHandle, mpsc::Receiver<LiveEvent>)> {
            Err(ProviderError::ConnectionFailed("refused".to_string()))
        }
    }

    fn noop_callback() -> (DisconnectCallback, Arc<AtomicBool>) {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let callback: DisconnectCallback = Arc::new(move || {
            let flag = flag.clone();
            Box::pin(async move {
                flag.store(true, Ordering::SeqCst);
            })
        });
        (callback, fired)
    }

    fn mock_factory() -> Arc<MockDeviceFactory> {
        let (capture, _tx) = MockCapture::new();
        let (playback, _state) = MockPlayback::new();
        Arc::new(MockDeviceFactory::new(Box::new(capture), Box::new(playback)))
    }

    #[tokio::test]
    async fn test_starts_idle() {
        let (callback, _) = noop_callback();
        let session = LiveAudioSession::new(
            Arc::new(RefusingConnector),
            mock_factory(),
            "instruction",
            callback,
        );
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_permission_denied_is_fatal_and_fires_callback() {
        let (callback, fired) = noop_callback();
        let mut session = LiveAudioSession::new(
            Arc::new(RefusingConnector),
            Arc::new(MockDeviceFactory::denied()),
            "instruction",
            callback,
        );

        match session.connect().await {
            Err(SessionError::Device(DeviceError::PermissionDenied(_))) => {}
            other => panic!("expected PermissionDenied, got {:?}", other.map(|_| ())),
        }
        assert_eq!(session.state(), SessionState::Closed);
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_channel_open_failure_never_reaches_open() {
        let (callback, fired) = noop_callback();
        let mut session = LiveAudioSession::new(
            Arc::new(RefusingConnector),
            mock_factory(),
            "instruction",
            callback,
        );

        assert!(matches!(
            session.connect().await,
            Err(SessionError::Provider(ProviderError::ConnectionFailed(_)))
        ));
        assert_eq!(session.state(), SessionState::Closed);
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_connect_invalid_after_close() {
        let (callback, _) = noop_callback();
        let mut session = LiveAudioSession::new(
            Arc::new(RefusingConnector),
            mock_factory(),
            "instruction",
            callback,
        );
        session.disconnect().await;

        match session.connect().await {
            Err(SessionError::InvalidState(SessionState::Closed)) => {}
            other => panic!("expected InvalidState, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_disconnect_without_connect_is_safe_and_idempotent() {
        let (callback, fired) = noop_callback();
        let mut session = LiveAudioSession::new(
            Arc::new(RefusingConnector),
            mock_factory(),
            "instruction",
            callback,
        );

        session.disconnect().await;
        session.disconnect().await;

        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.active_playback_units(), 0);
        // A local disconnect is not a remote close; no callback.
        assert!(!fired.load(Ordering::SeqCst));
    }
}
