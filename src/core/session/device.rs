//! Audio device contexts for live sessions.
//!
//! A session owns two independent device contexts: one tuned for the capture
//! sample rate and one for the playback sample rate. Both sit behind traits
//! so tests can substitute scripted doubles for real hardware.
//!
//! cpal streams are not `Send`, so each production device parks its stream on
//! a dedicated thread and exposes only channel ends and shared state to the
//! async side.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::mpsc as std_mpsc;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::core::audio::{CAPTURE_BLOCK_SIZE, CAPTURE_SAMPLE_RATE, CHANNELS, PLAYBACK_SAMPLE_RATE};

/// Capacity of the capture block channel. Blocks are dropped, not queued,
/// when the consumer falls behind; back-pressure belongs to the transport.
const CAPTURE_CHANNEL_CAPACITY: usize = 32;

/// Errors from acquiring or driving audio devices.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Microphone or output access denied, or no device present. Fatal to
    /// the session; never retried.
    #[error("Audio device access denied: {0}")]
    PermissionDenied(String),

    /// Device exists but the stream could not be built or started
    #[error("Audio stream error: {0}")]
    Stream(String),
}

/// Result type for device operations.
pub type DeviceResult<T> = Result<T, DeviceError>;

// =============================================================================
// Traits
// =============================================================================

/// Produces fixed-size blocks of captured microphone samples.
#[async_trait]
pub trait CaptureDevice: Send {
    /// The next captured block of [`CAPTURE_BLOCK_SIZE`] samples, or `None`
    /// once capture has stopped.
    async fn next_block(&mut self) -> Option<Vec<f32>>;

    /// Stop capturing and release the microphone. Idempotent.
    fn stop(&mut self);
}

/// Schedules decoded audio for timed playback on the output clock.
pub trait PlaybackDevice: Send {
    /// Current playback-clock time in seconds.
    fn current_time(&self) -> f64;

    /// Begin playing `samples` at `start_time` seconds on the playback clock.
    fn play_at(&mut self, id: u64, samples: Vec<f32>, start_time: f64);

    /// Ids of units that finished playing naturally since the last call.
    fn take_finished(&mut self) -> Vec<u64>;

    /// Immediately silence every playing and pending unit.
    fn stop_all(&mut self);

    /// Release the output device context. Idempotent.
    fn close(&mut self);
}

/// Opens device contexts for a session.
///
/// Acquisition happens inside `connect()`, not at session construction, so
/// the factory is what a session holds up front.
pub trait DeviceFactory: Send + Sync {
    fn open_capture(&self) -> DeviceResult<Box<dyn CaptureDevice>>;
    fn open_playback(&self) -> DeviceResult<Box<dyn PlaybackDevice>>;
}

// =============================================================================
// cpal capture
// =============================================================================

/// Microphone capture at the fixed 16kHz mono protocol rate.
pub struct CpalCapture {
    blocks: mpsc::Receiver<Vec<f32>>,
    stop_tx: Option<std_mpsc::Sender<()>>,
}

impl CpalCapture {
    /// Acquire the default input device and start capturing.
    pub fn open() -> DeviceResult<Self> {
        let (ready_tx, ready_rx) = std_mpsc::channel::<DeviceResult<()>>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let (block_tx, block_rx) = mpsc::channel::<Vec<f32>>(CAPTURE_CHANNEL_CAPACITY);

        std::thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || {
                let stream = match build_input_stream(block_tx) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(DeviceError::Stream(e.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                // Keep the stream alive until stop is signalled or the
                // capture handle is dropped.
                let _ = stop_rx.recv();
                drop(stream);
                tracing::debug!("microphone capture thread ended");
            })
            .map_err(|e| DeviceError::Stream(e.to_string()))?;

        ready_rx
            .recv()
            .map_err(|_| DeviceError::Stream("capture thread exited during setup".to_string()))??;

        tracing::info!(rate = CAPTURE_SAMPLE_RATE, "microphone capture started");
        Ok(Self {
            blocks: block_rx,
            stop_tx: Some(stop_tx),
        })
    }
}

fn build_input_stream(block_tx: mpsc::Sender<Vec<f32>>) -> DeviceResult<cpal::Stream> {
    let host = cpal::default_host();
    let device = host.default_input_device().ok_or_else(|| {
        DeviceError::PermissionDenied("no input device available".to_string())
    })?;

    let config = cpal::StreamConfig {
        channels: CHANNELS,
        sample_rate: cpal::SampleRate(CAPTURE_SAMPLE_RATE),
        buffer_size: cpal::BufferSize::Default,
    };

    let mut pending: Vec<f32> = Vec::with_capacity(CAPTURE_BLOCK_SIZE * 2);
    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _| {
                pending.extend_from_slice(data);
                while pending.len() >= CAPTURE_BLOCK_SIZE {
                    let block: Vec<f32> = pending.drain(..CAPTURE_BLOCK_SIZE).collect();
                    // Drop the block if the consumer is behind.
                    let _ = block_tx.try_send(block);
                }
            },
            |e| tracing::error!("capture stream error: {}", e),
            None,
        )
        .map_err(|e| match e {
            cpal::BuildStreamError::DeviceNotAvailable => {
                DeviceError::PermissionDenied(e.to_string())
            }
            other => DeviceError::Stream(other.to_string()),
        })?;

    Ok(stream)
}

#[async_trait]
impl CaptureDevice for CpalCapture {
    async fn next_block(&mut self) -> Option<Vec<f32>> {
        self.blocks.recv().await
    }

    fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        self.blocks.close();
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

// =============================================================================
// cpal playback
// =============================================================================

/// One queued output segment on the playback timeline.
struct Segment {
    id: u64,
    start_sample: u64,
    samples: Vec<f32>,
}

#[derive(Default)]
struct PlaybackShared {
    segments: Vec<Segment>,
    clock_samples: u64,
    finished: Vec<u64>,
}

/// Speaker output at the fixed 24kHz mono protocol rate.
///
/// The output callback mixes every segment whose start position has been
/// reached; the clock advances one sample per emitted frame, so
/// `current_time` is exact against what has actually been played.
pub struct CpalPlayback {
    shared: Arc<Mutex<PlaybackShared>>,
    stop_tx: Option<std_mpsc::Sender<()>>,
}

impl CpalPlayback {
    /// Acquire the default output device and start the output stream.
    pub fn open() -> DeviceResult<Self> {
        let shared = Arc::new(Mutex::new(PlaybackShared::default()));
        let (ready_tx, ready_rx) = std_mpsc::channel::<DeviceResult<()>>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

        let thread_shared = shared.clone();
        std::thread::Builder::new()
            .name("speaker-playback".to_string())
            .spawn(move || {
                let stream = match build_output_stream(thread_shared) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(DeviceError::Stream(e.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                let _ = stop_rx.recv();
                drop(stream);
                tracing::debug!("speaker playback thread ended");
            })
            .map_err(|e| DeviceError::Stream(e.to_string()))?;

        ready_rx
            .recv()
            .map_err(|_| DeviceError::Stream("playback thread exited during setup".to_string()))??;

        tracing::info!(rate = PLAYBACK_SAMPLE_RATE, "speaker playback started");
        Ok(Self {
            shared,
            stop_tx: Some(stop_tx),
        })
    }
}

fn build_output_stream(shared: Arc<Mutex<PlaybackShared>>) -> DeviceResult<cpal::Stream> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or_else(|| {
        DeviceError::PermissionDenied("no output device available".to_string())
    })?;

    let config = cpal::StreamConfig {
        channels: CHANNELS,
        sample_rate: cpal::SampleRate(PLAYBACK_SAMPLE_RATE),
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = device
        .build_output_stream(
            &config,
            move |out: &mut [f32], _| {
                let mut state = shared.lock();
                let base = state.clock_samples;
                for (i, frame) in out.iter_mut().enumerate() {
                    let position = base + i as u64;
                    let mut mixed = 0.0f32;
                    for segment in &state.segments {
                        if position >= segment.start_sample {
                            let index = (position - segment.start_sample) as usize;
                            if index < segment.samples.len() {
                                mixed += segment.samples[index];
                            }
                        }
                    }
                    *frame = mixed.clamp(-1.0, 1.0);
                }
                state.clock_samples += out.len() as u64;

                // Retire segments the clock has passed.
                let clock = state.clock_samples;
                let mut finished = Vec::new();
                state.segments.retain(|segment| {
                    let done = segment.start_sample + segment.samples.len() as u64 <= clock;
                    if done {
                        finished.push(segment.id);
                    }
                    !done
                });
                state.finished.extend(finished);
            },
            |e| tracing::error!("playback stream error: {}", e),
            None,
        )
        .map_err(|e| match e {
            cpal::BuildStreamError::DeviceNotAvailable => {
                DeviceError::PermissionDenied(e.to_string())
            }
            other => DeviceError::Stream(other.to_string()),
        })?;

    Ok(stream)
}

impl PlaybackDevice for CpalPlayback {
    fn current_time(&self) -> f64 {
        self.shared.lock().clock_samples as f64 / PLAYBACK_SAMPLE_RATE as f64
    }

    fn play_at(&mut self, id: u64, samples: Vec<f32>, start_time: f64) {
        let start_sample = (start_time * PLAYBACK_SAMPLE_RATE as f64).round() as u64;
        self.shared.lock().segments.push(Segment {
            id,
            start_sample,
            samples,
        });
    }

    fn take_finished(&mut self) -> Vec<u64> {
        std::mem::take(&mut self.shared.lock().finished)
    }

    fn stop_all(&mut self) {
        self.shared.lock().segments.clear();
    }

    fn close(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }
}

impl Drop for CpalPlayback {
    fn drop(&mut self) {
        self.close();
    }
}

/// Production factory backed by the system's default cpal devices.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalDeviceFactory;

impl DeviceFactory for CpalDeviceFactory {
    fn open_capture(&self) -> DeviceResult<Box<dyn CaptureDevice>> {
        Ok(Box::new(CpalCapture::open()?))
    }

    fn open_playback(&self) -> DeviceResult<Box<dyn PlaybackDevice>> {
        Ok(Box::new(CpalPlayback::open()?))
    }
}

// =============================================================================
// Test doubles
// =============================================================================

/// Scripted capture device for tests: yields the blocks pushed on its sender.
pub struct MockCapture {
    blocks: mpsc::Receiver<Vec<f32>>,
    stopped: bool,
}

impl MockCapture {
    /// Create a mock and the sender tests use to feed it blocks. Dropping
    /// the sender ends capture.
    pub fn new() -> (Self, mpsc::Sender<Vec<f32>>) {
        let (tx, rx) = mpsc::channel(CAPTURE_CHANNEL_CAPACITY);
        (
            Self {
                blocks: rx,
                stopped: false,
            },
            tx,
        )
    }
}

#[async_trait]
impl CaptureDevice for MockCapture {
    async fn next_block(&mut self) -> Option<Vec<f32>> {
        if self.stopped {
            return None;
        }
        self.blocks.recv().await
    }

    fn stop(&mut self) {
        self.stopped = true;
        self.blocks.close();
    }
}

/// Recorded playback call.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayedUnit {
    pub id: u64,
    pub sample_count: usize,
    pub start_time: f64,
}

/// Shared, inspectable state of a [`MockPlayback`].
#[derive(Default)]
pub struct MockPlaybackState {
    pub clock: f64,
    pub played: Vec<PlayedUnit>,
    pub finished_queue: VecDeque<u64>,
    pub stop_all_calls: usize,
    pub closed: bool,
}

/// Manual-clock playback device for tests.
pub struct MockPlayback {
    state: Arc<Mutex<MockPlaybackState>>,
}

impl MockPlayback {
    pub fn new() -> (Self, Arc<Mutex<MockPlaybackState>>) {
        let state = Arc::new(Mutex::new(MockPlaybackState::default()));
        (
            Self {
                state: state.clone(),
            },
            state,
        )
    }
}

impl PlaybackDevice for MockPlayback {
    fn current_time(&self) -> f64 {
        self.state.lock().clock
    }

    fn play_at(&mut self, id: u64, samples: Vec<f32>, start_time: f64) {
        self.state.lock().played.push(PlayedUnit {
            id,
            sample_count: samples.len(),
            start_time,
        });
    }

    fn take_finished(&mut self) -> Vec<u64> {
        self.state.lock().finished_queue.drain(..).collect()
    }

    fn stop_all(&mut self) {
        self.state.lock().stop_all_calls += 1;
    }

    fn close(&mut self) {
        self.state.lock().closed = true;
    }
}

/// Factory handing out prepared mock devices, or denying access.
#[derive(Default)]
pub struct MockDeviceFactory {
    capture: Mutex<Option<Box<dyn CaptureDevice>>>,
    playback: Mutex<Option<Box<dyn PlaybackDevice>>>,
    deny_access: bool,
}

impl MockDeviceFactory {
    pub fn new(capture: Box<dyn CaptureDevice>, playback: Box<dyn PlaybackDevice>) -> Self {
        Self {
            capture: Mutex::new(Some(capture)),
            playback: Mutex::new(Some(playback)),
            deny_access: false,
        }
    }

    /// A factory that refuses device access, as a denied microphone would.
    pub fn denied() -> Self {
        Self {
            deny_access: true,
            ..Default::default()
        }
    }
}

impl DeviceFactory for MockDeviceFactory {
    fn open_capture(&self) -> DeviceResult<Box<dyn CaptureDevice>> {
        if self.deny_access {
            return Err(DeviceError::PermissionDenied("denied by test".to_string()));
        }
        self.capture
            .lock()
            .take()
            .ok_or_else(|| DeviceError::Stream("capture already taken".to_string()))
    }

    fn open_playback(&self) -> DeviceResult<Box<dyn PlaybackDevice>> {
        if self.deny_access {
            return Err(DeviceError::PermissionDenied("denied by test".to_string()));
        }
        self.playback
            .lock()
            .take()
            .ok_or_else(|| DeviceError::Stream("playback already taken".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_capture_yields_pushed_blocks() {
        let (mut capture, tx) = MockCapture::new();
        tx.send(vec![0.1; CAPTURE_BLOCK_SIZE]).await.unwrap();
        let block = capture.next_block().await.unwrap();
        assert_eq!(block.len(), CAPTURE_BLOCK_SIZE);

        capture.stop();
        assert!(capture.next_block().await.is_none());
    }

    #[tokio::test]
    async fn test_mock_capture_ends_when_sender_dropped() {
        let (mut capture, tx) = MockCapture::new();
        drop(tx);
        assert!(capture.next_block().await.is_none());
    }

    #[test]
    fn test_mock_playback_records_calls() {
        let (mut playback, state) = MockPlayback::new();
        playback.play_at(7, vec![0.0; 2400], 1.5);
        playback.stop_all();
        playback.close();

        let state = state.lock();
        assert_eq!(
            state.played,
            vec![PlayedUnit {
                id: 7,
                sample_count: 2400,
                start_time: 1.5
            }]
        );
        assert_eq!(state.stop_all_calls, 1);
        assert!(state.closed);
    }
}
